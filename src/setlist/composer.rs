use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::contains_ignore_case;
use crate::models::{SetlistSong, SongSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

/// One editing step on a composer, as sent by a setlist editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ComposerOp {
    Toggle { song_id: i64 },
    Move { index: usize, direction: Direction },
    Remove { song_id: i64 },
    Offering { song_id: i64 },
}

/// A submitted selection that cannot be stored exactly as sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("La canción {0} no existe")]
    UnknownSong(i64),
    #[error("La canción {0} está repetida en la lista")]
    RepeatedSong(i64),
    #[error("La canción de ofrenda {0} no está en la lista")]
    OfferingNotSelected(i64),
}

impl SelectionError {
    pub fn field(&self) -> &'static str {
        match self {
            SelectionError::UnknownSong(_) | SelectionError::RepeatedSong(_) => "song_ids",
            SelectionError::OfferingNotSelected(_) => "offering_song_ids",
        }
    }
}

/// Ordered, duplicate-free selection of songs for one setlist, drawn from a
/// candidate pool.
#[derive(Debug, Clone, Default)]
pub struct SetlistComposer {
    candidates: Vec<SongSummary>,
    selected: Vec<i64>,
    offering: HashSet<i64>,
    search_term: String,
}

impl SetlistComposer {
    pub fn new(candidates: Vec<SongSummary>) -> Self {
        Self {
            candidates,
            ..Self::default()
        }
    }

    /// Restores a saved order. Ids outside the pool and repeated ids are dropped,
    /// which only happens when songs were removed after the order was saved.
    pub fn with_selection(
        candidates: Vec<SongSummary>,
        selected: impl IntoIterator<Item = i64>,
        offering: impl IntoIterator<Item = i64>,
    ) -> Self {
        let mut composer = Self::new(candidates);

        for song_id in selected {
            composer.select(song_id);
        }

        for song_id in offering {
            composer.set_offering(song_id, true);
        }

        composer
    }

    /// Takes a client-submitted selection verbatim, or reports the first id
    /// that would have to be dropped to store it.
    pub fn from_submission(
        candidates: Vec<SongSummary>,
        selected: &[i64],
        offering: &[i64],
    ) -> Result<Self, SelectionError> {
        let mut composer = Self::new(candidates);

        for &song_id in selected {
            if !composer.is_candidate(song_id) {
                return Err(SelectionError::UnknownSong(song_id));
            }
            if composer.is_selected(song_id) {
                return Err(SelectionError::RepeatedSong(song_id));
            }
            composer.selected.push(song_id);
        }

        for &song_id in offering {
            if !composer.is_selected(song_id) {
                return Err(SelectionError::OfferingNotSelected(song_id));
            }
            composer.offering.insert(song_id);
        }

        Ok(composer)
    }

    pub fn apply(&mut self, op: ComposerOp) {
        match op {
            ComposerOp::Toggle { song_id } => self.toggle_selection(song_id),
            ComposerOp::Move { index, direction } => self.move_song(index, direction),
            ComposerOp::Remove { song_id } => self.remove(song_id),
            ComposerOp::Offering { song_id } => self.toggle_offering(song_id),
        }
    }

    fn is_candidate(&self, song_id: i64) -> bool {
        self.candidates.iter().any(|song| song.id == song_id)
    }

    pub fn is_selected(&self, song_id: i64) -> bool {
        self.selected.contains(&song_id)
    }

    fn select(&mut self, song_id: i64) {
        if self.is_candidate(song_id) && !self.is_selected(song_id) {
            self.selected.push(song_id);
        }
    }

    /// Removes the song when selected, otherwise appends it to the end.
    /// Ids outside the candidate pool are ignored.
    pub fn toggle_selection(&mut self, song_id: i64) {
        if self.is_selected(song_id) {
            self.remove(song_id);
        } else {
            self.select(song_id);
        }
    }

    /// Swaps the entry at `index` with its neighbour. Out-of-range and
    /// boundary moves leave the order untouched.
    pub fn move_song(&mut self, index: usize, direction: Direction) {
        let target = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => index.checked_add(1),
        };

        match target {
            Some(target) if index < self.selected.len() && target < self.selected.len() => {
                self.selected.swap(index, target);
            }
            _ => {}
        }
    }

    pub fn remove(&mut self, song_id: i64) {
        self.selected.retain(|id| *id != song_id);
        self.offering.remove(&song_id);
    }

    /// Tags a selected song as the offering song. Unselected songs cannot be tagged.
    pub fn set_offering(&mut self, song_id: i64, is_offering: bool) {
        if is_offering && self.is_selected(song_id) {
            self.offering.insert(song_id);
        } else if !is_offering {
            self.offering.remove(&song_id);
        }
    }

    pub fn toggle_offering(&mut self, song_id: i64) {
        let tagged = self.offering.contains(&song_id);
        self.set_offering(song_id, !tagged);
    }

    pub fn is_offering(&self, song_id: i64) -> bool {
        self.offering.contains(&song_id)
    }

    pub fn set_search_term(&mut self, term: &str) {
        self.search_term = term.to_string();
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn selected_ids(&self) -> &[i64] {
        &self.selected
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Selected songs in their current order.
    pub fn selected_songs(&self) -> Vec<&SongSummary> {
        self.selected
            .iter()
            .filter_map(|id| self.candidates.iter().find(|song| song.id == *id))
            .collect()
    }

    /// Candidate pool minus everything already selected.
    pub fn available_songs(&self) -> Vec<&SongSummary> {
        self.candidates
            .iter()
            .filter(|song| !self.is_selected(song.id))
            .collect()
    }

    /// Available songs whose name or artist contains the search term.
    pub fn filtered_songs(&self) -> Vec<&SongSummary> {
        let term = self.search_term.trim();
        self.available_songs()
            .into_iter()
            .filter(|song| {
                term.is_empty()
                    || contains_ignore_case(&song.name, term)
                    || contains_ignore_case(&song.artist, term)
            })
            .collect()
    }

    /// Rows to persist for `setlist_id`, numbered `1..=N` in the current order.
    pub fn serialize(&self, setlist_id: i64) -> Vec<SetlistSong> {
        self.selected
            .iter()
            .enumerate()
            .map(|(index, song_id)| SetlistSong {
                setlist_id,
                song_id: *song_id,
                position: index as i64 + 1,
                is_offering: self.offering.contains(song_id),
            })
            .collect()
    }
}

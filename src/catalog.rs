use anyhow::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Song;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum MusicalKey {
    #[default]
    C,
    CSharp,
    DFlat,
    D,
    DSharp,
    EFlat,
    E,
    F,
    FSharp,
    GFlat,
    G,
    GSharp,
    AFlat,
    A,
    ASharp,
    BFlat,
    B,
    CMinor,
    CSharpMinor,
    DMinor,
    DSharpMinor,
    EMinor,
    FMinor,
    FSharpMinor,
    GMinor,
    GSharpMinor,
    AMinor,
    ASharpMinor,
    BMinor,
}

impl MusicalKey {
    pub const ALL: [MusicalKey; 29] = [
        MusicalKey::C,
        MusicalKey::CSharp,
        MusicalKey::DFlat,
        MusicalKey::D,
        MusicalKey::DSharp,
        MusicalKey::EFlat,
        MusicalKey::E,
        MusicalKey::F,
        MusicalKey::FSharp,
        MusicalKey::GFlat,
        MusicalKey::G,
        MusicalKey::GSharp,
        MusicalKey::AFlat,
        MusicalKey::A,
        MusicalKey::ASharp,
        MusicalKey::BFlat,
        MusicalKey::B,
        MusicalKey::CMinor,
        MusicalKey::CSharpMinor,
        MusicalKey::DMinor,
        MusicalKey::DSharpMinor,
        MusicalKey::EMinor,
        MusicalKey::FMinor,
        MusicalKey::FSharpMinor,
        MusicalKey::GMinor,
        MusicalKey::GSharpMinor,
        MusicalKey::AMinor,
        MusicalKey::ASharpMinor,
        MusicalKey::BMinor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MusicalKey::C => "C",
            MusicalKey::CSharp => "C#",
            MusicalKey::DFlat => "Db",
            MusicalKey::D => "D",
            MusicalKey::DSharp => "D#",
            MusicalKey::EFlat => "Eb",
            MusicalKey::E => "E",
            MusicalKey::F => "F",
            MusicalKey::FSharp => "F#",
            MusicalKey::GFlat => "Gb",
            MusicalKey::G => "G",
            MusicalKey::GSharp => "G#",
            MusicalKey::AFlat => "Ab",
            MusicalKey::A => "A",
            MusicalKey::ASharp => "A#",
            MusicalKey::BFlat => "Bb",
            MusicalKey::B => "B",
            MusicalKey::CMinor => "Cm",
            MusicalKey::CSharpMinor => "C#m",
            MusicalKey::DMinor => "Dm",
            MusicalKey::DSharpMinor => "D#m",
            MusicalKey::EMinor => "Em",
            MusicalKey::FMinor => "Fm",
            MusicalKey::FSharpMinor => "F#m",
            MusicalKey::GMinor => "Gm",
            MusicalKey::GSharpMinor => "G#m",
            MusicalKey::AMinor => "Am",
            MusicalKey::ASharpMinor => "A#m",
            MusicalKey::BMinor => "Bm",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        MusicalKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::msg(format!("Unknown key: {}", s)))
    }
}

impl TryFrom<String> for MusicalKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MusicalKey::from_str(&value)
    }
}

impl From<MusicalKey> for &'static str {
    fn from(key: MusicalKey) -> Self {
        key.as_str()
    }
}

impl fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Meeting a setlist is prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    #[serde(rename = "Miércoles")]
    Wednesday,
    #[serde(rename = "Domingo AM")]
    SundayMorning,
    #[serde(rename = "Domingo PM")]
    SundayEvening,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Wednesday => "Miércoles",
            ServiceType::SundayMorning => "Domingo AM",
            ServiceType::SundayEvening => "Domingo PM",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "Miércoles" => Ok(ServiceType::Wednesday),
            "Domingo AM" => Ok(ServiceType::SundayMorning),
            "Domingo PM" => Ok(ServiceType::SundayEvening),
            _ => Err(Error::msg(format!("Unknown service type: {}", s))),
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// In-memory filter over the song catalog. Every unset criterion matches.
#[derive(Debug, Default, Clone)]
pub struct SongFilter {
    /// Substring searched in name, artist and lyrics.
    pub search: Option<String>,
    pub song_type_id: Option<i64>,
    pub key: Option<MusicalKey>,
    pub leader_id: Option<i64>,
}

impl SongFilter {
    pub fn matches(&self, song: &Song) -> bool {
        if let Some(term) = self.search.as_deref().filter(|t| !t.is_empty()) {
            let found = contains_ignore_case(&song.name, term)
                || contains_ignore_case(&song.artist, term)
                || contains_ignore_case(&song.lyrics, term);
            if !found {
                return false;
            }
        }

        if let Some(song_type_id) = self.song_type_id {
            if song.song_type_id != Some(song_type_id) {
                return false;
            }
        }

        if let Some(key) = self.key {
            if song.key != key {
                return false;
            }
        }

        if let Some(leader_id) = self.leader_id {
            if song.created_by != leader_id {
                return false;
            }
        }

        true
    }

    pub fn apply(&self, songs: Vec<Song>) -> Vec<Song> {
        songs.into_iter().filter(|song| self.matches(song)).collect()
    }
}

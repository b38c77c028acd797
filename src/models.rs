use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::to_utc;
use crate::catalog::{MusicalKey, ServiceType};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Creator {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Song {
    pub id: i64,
    pub name: String,
    pub artist: String,
    pub key: MusicalKey,
    pub lyrics: String,
    pub youtube_link: Option<String>,
    pub multitrack_link: Option<String>,
    pub chord_chart_link: Option<String>,
    pub song_type_id: Option<i64>,
    pub song_type_name: Option<String>,
    pub created_by: i64,
    pub creator: Option<Creator>, // Filled by a secondary profile lookup
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Debug)]
pub struct DbSong {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub key: Option<String>,
    pub lyrics: Option<String>,
    pub youtube_link: Option<String>,
    pub multitrack_link: Option<String>,
    pub chord_chart_link: Option<String>,
    pub song_type_id: Option<i64>,
    pub song_type_name: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbSong> for Song {
    fn from(song: DbSong) -> Self {
        Self {
            id: song.id.unwrap_or_default(),
            name: song.name.unwrap_or_default(),
            artist: song.artist.unwrap_or_default(),
            key: song
                .key
                .as_deref()
                .and_then(|k| MusicalKey::from_str(k).ok())
                .unwrap_or_default(),
            lyrics: song.lyrics.unwrap_or_default(),
            youtube_link: song.youtube_link,
            multitrack_link: song.multitrack_link,
            chord_chart_link: song.chord_chart_link,
            song_type_id: song.song_type_id,
            song_type_name: song.song_type_name,
            created_by: song.created_by.unwrap_or_default(),
            creator: None,
            created_at: to_utc(song.created_at),
            updated_at: to_utc(song.updated_at),
        }
    }
}

/// Mutable song fields. `created_by` is set once on insert and never appears here.
#[derive(Debug, Clone)]
pub struct SongFields {
    pub name: String,
    pub artist: String,
    pub key: MusicalKey,
    pub lyrics: String,
    pub youtube_link: Option<String>,
    pub multitrack_link: Option<String>,
    pub chord_chart_link: Option<String>,
    pub song_type_id: Option<i64>,
}

/// The slice of a song the setlist composer works with.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SongSummary {
    pub id: i64,
    pub name: String,
    pub artist: String,
}

impl From<&Song> for SongSummary {
    fn from(song: &Song) -> Self {
        Self {
            id: song.id,
            name: song.name.clone(),
            artist: song.artist.clone(),
        }
    }
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSongSummary {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub artist: Option<String>,
}

impl From<DbSongSummary> for SongSummary {
    fn from(song: DbSongSummary) -> Self {
        Self {
            id: song.id.unwrap_or_default(),
            name: song.name.unwrap_or_default(),
            artist: song.artist.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SongType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSongType {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbSongType> for SongType {
    fn from(song_type: DbSongType) -> Self {
        Self {
            id: song_type.id.unwrap_or_default(),
            name: song_type.name.unwrap_or_default(),
            description: song_type.description,
            created_at: to_utc(song_type.created_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Setlist {
    pub id: i64,
    pub name: String,
    pub leader_id: i64,
    pub leader: Option<Creator>,
    pub date: NaiveDate,
    pub service_type: ServiceType,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSetlist {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub leader_id: Option<i64>,
    pub leader_first_name: Option<String>,
    pub leader_last_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub service_type: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbSetlist> for Setlist {
    fn from(setlist: DbSetlist) -> Self {
        let leader = match (setlist.leader_first_name, setlist.leader_last_name) {
            (None, None) => None,
            (first_name, last_name) => Some(Creator {
                first_name: first_name.unwrap_or_default(),
                last_name: last_name.unwrap_or_default(),
            }),
        };

        Self {
            id: setlist.id.unwrap_or_default(),
            name: setlist.name.unwrap_or_default(),
            leader_id: setlist.leader_id.unwrap_or_default(),
            leader,
            date: setlist.date.unwrap_or_default(),
            service_type: setlist
                .service_type
                .as_deref()
                .and_then(|s| ServiceType::from_str(s).ok())
                .unwrap_or(ServiceType::SundayMorning),
            notes: setlist.notes,
            created_at: to_utc(setlist.created_at),
            updated_at: to_utc(setlist.updated_at),
        }
    }
}

/// Mutable setlist fields, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetlistFields {
    pub name: String,
    pub date: NaiveDate,
    pub service_type: ServiceType,
    pub notes: Option<String>,
}

/// One persisted `setlist_songs` row.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SetlistSong {
    pub setlist_id: i64,
    pub song_id: i64,
    pub position: i64,
    pub is_offering: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSetlistSong {
    pub setlist_id: Option<i64>,
    pub song_id: Option<i64>,
    pub position: Option<i64>,
    pub is_offering: Option<bool>,
}

impl From<DbSetlistSong> for SetlistSong {
    fn from(row: DbSetlistSong) -> Self {
        Self {
            setlist_id: row.setlist_id.unwrap_or_default(),
            song_id: row.song_id.unwrap_or_default(),
            position: row.position.unwrap_or_default(),
            is_offering: row.is_offering.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SetlistEntry {
    pub position: i64,
    pub is_offering: bool,
    pub song: Song,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SetlistDetail {
    pub setlist: Setlist,
    pub songs: Vec<SetlistEntry>,
}

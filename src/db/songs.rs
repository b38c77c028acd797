use chrono::Utc;
use rocket::futures::future::join_all;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{DbSong, DbSongSummary, Song, SongFields, SongSummary};

use super::get_creator;

pub(super) const SONG_SELECT: &str = "SELECT s.id, s.name, s.artist, s.key, s.lyrics, s.youtube_link,
        s.multitrack_link, s.chord_chart_link, s.song_type_id, st.name AS song_type_name,
        s.created_by, s.created_at, s.updated_at
     FROM songs s
     LEFT JOIN song_types st ON st.id = s.song_type_id";

#[instrument(skip(pool))]
pub async fn get_all_songs(pool: &Pool<Sqlite>) -> Result<Vec<Song>, AppError> {
    info!("Getting all songs");
    let rows = sqlx::query_as::<_, DbSong>(&format!(
        "{} ORDER BY s.created_at DESC, s.id DESC",
        SONG_SELECT
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Song::from).collect())
}

/// Fills in each song's creator with one profile lookup per song, issued
/// concurrently. A failed lookup leaves that creator empty.
#[instrument(skip_all, fields(songs = songs.len()))]
pub async fn attach_creators(pool: &Pool<Sqlite>, songs: Vec<Song>) -> Vec<Song> {
    let lookups = songs.iter().map(|song| get_creator(pool, song.created_by));
    let creators = join_all(lookups).await;

    songs
        .into_iter()
        .zip(creators)
        .map(|(mut song, creator)| {
            song.creator = match creator {
                Ok(creator) => creator,
                Err(e) => {
                    warn!(song_id = song.id, error = %e, "Failed to load song creator");
                    None
                }
            };
            song
        })
        .collect()
}

#[instrument(skip(pool))]
pub async fn get_song(pool: &Pool<Sqlite>, id: i64) -> Result<Song, AppError> {
    info!("Getting song");
    let row = sqlx::query_as::<_, DbSong>(&format!("{} WHERE s.id = ?", SONG_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(song) => Ok(Song::from(song)),
        _ => Err(AppError::NotFound(format!("Song with id {} not found", id))),
    }
}

/// Candidate pool for the setlist composer, by name.
#[instrument(skip(pool))]
pub async fn get_song_summaries(pool: &Pool<Sqlite>) -> Result<Vec<SongSummary>, AppError> {
    let rows = sqlx::query_as::<_, DbSongSummary>("SELECT id, name, artist FROM songs ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(SongSummary::from).collect())
}

#[instrument(skip(pool, song), fields(name = %song.name))]
pub async fn create_song(
    pool: &Pool<Sqlite>,
    song: &SongFields,
    created_by: i64,
) -> Result<i64, AppError> {
    info!("Creating song");
    let res = sqlx::query(
        "INSERT INTO songs
         (name, artist, key, lyrics, youtube_link, multitrack_link, chord_chart_link, song_type_id, created_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&song.name)
    .bind(&song.artist)
    .bind(song.key.as_str())
    .bind(&song.lyrics)
    .bind(&song.youtube_link)
    .bind(&song.multitrack_link)
    .bind(&song.chord_chart_link)
    .bind(song.song_type_id)
    .bind(created_by)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

/// Leaves `created_by` untouched.
#[instrument(skip(pool, song), fields(name = %song.name))]
pub async fn update_song(
    pool: &Pool<Sqlite>,
    id: i64,
    song: &SongFields,
) -> Result<(), AppError> {
    info!("Updating song");
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "UPDATE songs
         SET name = ?, artist = ?, key = ?, lyrics = ?, youtube_link = ?,
             multitrack_link = ?, chord_chart_link = ?, song_type_id = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&song.name)
    .bind(&song.artist)
    .bind(song.key.as_str())
    .bind(&song.lyrics)
    .bind(&song.youtube_link)
    .bind(&song.multitrack_link)
    .bind(&song.chord_chart_link)
    .bind(song.song_type_id)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Song with id {} not found", id)));
    }

    Ok(())
}

/// Deletes the song and closes the gap it leaves in every setlist that used it,
/// so positions stay contiguous.
#[instrument(skip(pool))]
pub async fn delete_song(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting song");
    let mut tx = pool.begin().await?;

    let placements: Vec<(i64, i64)> =
        sqlx::query_as("SELECT setlist_id, position FROM setlist_songs WHERE song_id = ?")
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;

    sqlx::query("DELETE FROM setlist_songs WHERE song_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    for (setlist_id, removed_position) in placements {
        let followers: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT song_id, position FROM setlist_songs
             WHERE setlist_id = ? AND position > ?
             ORDER BY position",
        )
        .bind(setlist_id)
        .bind(removed_position)
        .fetch_all(&mut *tx)
        .await?;

        // Ascending order keeps (setlist_id, position) unique at every step.
        for (song_id, position) in followers {
            sqlx::query(
                "UPDATE setlist_songs SET position = ? WHERE setlist_id = ? AND song_id = ?",
            )
            .bind(position - 1)
            .bind(setlist_id)
            .bind(song_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    let res = sqlx::query("DELETE FROM songs WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if res.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(AppError::NotFound(format!("Song with id {} not found", id)));
    }

    tx.commit().await?;
    Ok(())
}

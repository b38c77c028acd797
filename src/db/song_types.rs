use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbSongType, SongType};

pub const SONG_TYPE_IN_USE: &str =
    "No se puede eliminar el tipo de canción porque tiene canciones asociadas";

#[instrument(skip(pool))]
pub async fn get_all_song_types(pool: &Pool<Sqlite>) -> Result<Vec<SongType>, AppError> {
    info!("Getting all song types");
    let rows = sqlx::query_as::<_, DbSongType>(
        "SELECT id, name, description, created_at FROM song_types ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SongType::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_song_type(pool: &Pool<Sqlite>, id: i64) -> Result<SongType, AppError> {
    let row = sqlx::query_as::<_, DbSongType>(
        "SELECT id, name, description, created_at FROM song_types WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(song_type) => Ok(SongType::from(song_type)),
        _ => Err(AppError::NotFound(format!(
            "Song type with id {} not found",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn create_song_type(
    pool: &Pool<Sqlite>,
    name: &str,
    description: Option<&str>,
) -> Result<i64, AppError> {
    info!("Creating song type");
    let res = sqlx::query("INSERT INTO song_types (name, description) VALUES (?, ?)")
        .bind(name)
        .bind(description)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn update_song_type(
    pool: &Pool<Sqlite>,
    id: i64,
    name: &str,
    description: Option<&str>,
) -> Result<(), AppError> {
    info!("Updating song type");
    let res = sqlx::query("UPDATE song_types SET name = ?, description = ? WHERE id = ?")
        .bind(name)
        .bind(description)
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Song type with id {} not found",
            id
        )));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn song_type_in_use(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM songs WHERE song_type_id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

/// Refuses while any song still references the category.
#[instrument(skip(pool))]
pub async fn delete_song_type(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting song type");

    if song_type_in_use(pool, id).await? {
        return Err(AppError::Conflict(SONG_TYPE_IN_USE.to_string()));
    }

    let res = sqlx::query("DELETE FROM song_types WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Song type with id {} not found",
            id
        )));
    }

    Ok(())
}

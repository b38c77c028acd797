use chrono::{NaiveDate, Utc};
use sqlx::{Pool, QueryBuilder, Sqlite, Transaction};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    DbSetlist, DbSetlistSong, DbSong, Setlist, SetlistDetail, SetlistEntry, SetlistFields,
    SetlistSong, Song,
};
use crate::setlist::{SetlistComposer, SetlistStore};

use super::SONG_SELECT;

const SETLIST_SELECT: &str = "SELECT sl.id, sl.name, sl.leader_id,
        p.first_name AS leader_first_name, p.last_name AS leader_last_name,
        sl.date, sl.service_type, sl.notes, sl.created_at, sl.updated_at
     FROM setlists sl
     LEFT JOIN profiles p ON p.id = sl.leader_id";

#[derive(sqlx::FromRow)]
struct DbSetlistEntry {
    position: Option<i64>,
    is_offering: Option<bool>,
    #[sqlx(flatten)]
    song: DbSong,
}

/// Setlists dated `today` or later, soonest first.
#[instrument(skip(pool))]
pub async fn get_upcoming_setlists(
    pool: &Pool<Sqlite>,
    today: NaiveDate,
) -> Result<Vec<Setlist>, AppError> {
    info!("Getting upcoming setlists");
    let rows = sqlx::query_as::<_, DbSetlist>(&format!(
        "{} WHERE sl.date >= ? ORDER BY sl.date ASC, sl.id ASC",
        SETLIST_SELECT
    ))
    .bind(today)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Setlist::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_setlist(pool: &Pool<Sqlite>, id: i64) -> Result<Setlist, AppError> {
    info!("Getting setlist");
    let row = sqlx::query_as::<_, DbSetlist>(&format!("{} WHERE sl.id = ?", SETLIST_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(setlist) => Ok(Setlist::from(setlist)),
        _ => Err(AppError::NotFound(format!(
            "Setlist with id {} not found",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn get_setlist_songs(
    pool: &Pool<Sqlite>,
    setlist_id: i64,
) -> Result<Vec<SetlistSong>, AppError> {
    let rows = sqlx::query_as::<_, DbSetlistSong>(
        "SELECT setlist_id, song_id, position, is_offering
         FROM setlist_songs
         WHERE setlist_id = ?
         ORDER BY position",
    )
    .bind(setlist_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(SetlistSong::from).collect())
}

#[instrument(skip(pool))]
pub async fn get_setlist_detail(
    pool: &Pool<Sqlite>,
    setlist_id: i64,
) -> Result<SetlistDetail, AppError> {
    let setlist = get_setlist(pool, setlist_id).await?;

    let song_select = SONG_SELECT.replacen(
        "SELECT ",
        "SELECT ss.position, ss.is_offering, ",
        1,
    );
    let rows = sqlx::query_as::<_, DbSetlistEntry>(&format!(
        "{} JOIN setlist_songs ss ON ss.song_id = s.id
         WHERE ss.setlist_id = ?
         ORDER BY ss.position",
        song_select
    ))
    .bind(setlist_id)
    .fetch_all(pool)
    .await?;

    let songs = rows
        .into_iter()
        .map(|row| SetlistEntry {
            position: row.position.unwrap_or_default(),
            is_offering: row.is_offering.unwrap_or_default(),
            song: Song::from(row.song),
        })
        .collect();

    Ok(SetlistDetail { setlist, songs })
}

async fn insert_setlist_songs(
    tx: &mut Transaction<'_, Sqlite>,
    rows: &[SetlistSong],
) -> Result<(), AppError> {
    if rows.is_empty() {
        return Ok(());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO setlist_songs (setlist_id, song_id, position, is_offering) ");
    builder.push_values(rows, |mut b, row| {
        b.push_bind(row.setlist_id)
            .push_bind(row.song_id)
            .push_bind(row.position)
            .push_bind(row.is_offering);
    });
    builder.build().execute(&mut **tx).await?;

    Ok(())
}

/// Inserts the setlist and its songs in one transaction.
#[instrument(skip(pool, setlist, composer), fields(name = %setlist.name, songs = composer.len()))]
pub async fn create_setlist_with_songs(
    pool: &Pool<Sqlite>,
    leader_id: i64,
    setlist: &SetlistFields,
    composer: &SetlistComposer,
) -> Result<i64, AppError> {
    info!("Creating setlist");
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "INSERT INTO setlists (name, leader_id, date, service_type, notes) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&setlist.name)
    .bind(leader_id)
    .bind(setlist.date)
    .bind(setlist.service_type.as_str())
    .bind(&setlist.notes)
    .execute(&mut *tx)
    .await?;
    let setlist_id = res.last_insert_rowid();

    insert_setlist_songs(&mut tx, &composer.serialize(setlist_id)).await?;

    tx.commit().await?;
    Ok(setlist_id)
}

/// Updates the setlist and swaps its whole song list in one transaction, so
/// readers never see it half-written.
#[instrument(skip(pool, setlist, composer), fields(name = %setlist.name, songs = composer.len()))]
pub async fn update_setlist_with_songs(
    pool: &Pool<Sqlite>,
    setlist_id: i64,
    setlist: &SetlistFields,
    composer: &SetlistComposer,
) -> Result<(), AppError> {
    info!("Updating setlist");
    let now = Utc::now().naive_utc();
    let mut tx = pool.begin().await?;

    let res = sqlx::query(
        "UPDATE setlists
         SET name = ?, date = ?, service_type = ?, notes = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&setlist.name)
    .bind(setlist.date)
    .bind(setlist.service_type.as_str())
    .bind(&setlist.notes)
    .bind(now)
    .bind(setlist_id)
    .execute(&mut *tx)
    .await?;

    if res.rows_affected() == 0 {
        tx.rollback().await?;
        return Err(AppError::NotFound(format!(
            "Setlist with id {} not found",
            setlist_id
        )));
    }

    sqlx::query("DELETE FROM setlist_songs WHERE setlist_id = ?")
        .bind(setlist_id)
        .execute(&mut *tx)
        .await?;

    insert_setlist_songs(&mut tx, &composer.serialize(setlist_id)).await?;

    tx.commit().await?;
    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_setlist(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting setlist");
    let res = sqlx::query("DELETE FROM setlists WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Setlist with id {} not found",
            id
        )));
    }

    Ok(())
}

#[rocket::async_trait]
impl SetlistStore for Pool<Sqlite> {
    async fn create_setlist(
        &self,
        leader_id: i64,
        fields: &SetlistFields,
        composer: &SetlistComposer,
    ) -> Result<i64, AppError> {
        create_setlist_with_songs(self, leader_id, fields, composer).await
    }

    async fn update_setlist(
        &self,
        setlist_id: i64,
        fields: &SetlistFields,
        composer: &SetlistComposer,
    ) -> Result<(), AppError> {
        update_setlist_with_songs(self, setlist_id, fields, composer).await
    }
}

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, Role, RoleScheme, User};
use crate::error::AppError;
use crate::models::Creator;

const PROFILE_COLUMNS: &str =
    "id, user_id, first_name, last_name, email, role, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
}

#[instrument(skip(pool))]
pub async fn get_profile(
    pool: &Pool<Sqlite>,
    scheme: RoleScheme,
    id: i64,
) -> Result<User, AppError> {
    info!("Fetching profile by ID");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM profiles WHERE id = ?",
        PROFILE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => user.into_user(scheme),
        _ => Err(AppError::NotFound(format!(
            "Profile with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_profile_by_user_id(
    pool: &Pool<Sqlite>,
    scheme: RoleScheme,
    user_id: i64,
) -> Result<Option<User>, AppError> {
    info!("Fetching profile by account");
    let row = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM profiles WHERE user_id = ?",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|user| user.into_user(scheme)).transpose()
}

#[instrument(skip(pool))]
pub async fn get_all_profiles(
    pool: &Pool<Sqlite>,
    scheme: RoleScheme,
) -> Result<Vec<User>, AppError> {
    info!("Getting all profiles");
    let rows = sqlx::query_as::<_, DbUser>(&format!(
        "SELECT {} FROM profiles ORDER BY created_at DESC, id DESC",
        PROFILE_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|row| row.into_user(scheme)).collect()
}

#[instrument(skip(pool))]
pub async fn count_profiles(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM profiles")
        .fetch_one(pool)
        .await?;

    Ok(count)
}

#[instrument(skip(pool), fields(user_id = profile.user_id, role = %profile.role))]
pub async fn create_profile(pool: &Pool<Sqlite>, profile: &NewProfile) -> Result<i64, AppError> {
    info!("Creating profile");

    let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM profiles WHERE user_id = ?")
        .bind(profile.user_id)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(
            "Ya existe un usuario con este correo electrónico y perfil creado".to_string(),
        ));
    }

    let res = sqlx::query(
        "INSERT INTO profiles (user_id, first_name, last_name, email, role)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(profile.user_id)
    .bind(&profile.first_name)
    .bind(&profile.last_name)
    .bind(&profile.email)
    .bind(profile.role.as_str())
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, update))]
pub async fn update_profile(
    pool: &Pool<Sqlite>,
    id: i64,
    update: &ProfileUpdate,
) -> Result<(), AppError> {
    info!("Updating profile");
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "UPDATE profiles
         SET first_name = ?, last_name = ?, email = ?, role = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(&update.email)
    .bind(update.role.as_str())
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Profile with id {} not found", id)));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn delete_profile(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting profile");
    sqlx::query("DELETE FROM profiles WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn profile_owns_songs(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM songs WHERE created_by = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

#[instrument(skip(pool))]
pub async fn profile_leads_setlists(pool: &Pool<Sqlite>, id: i64) -> Result<bool, AppError> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM setlists WHERE leader_id = ? LIMIT 1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row.is_some())
}

#[instrument(skip(pool))]
pub async fn get_creator(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Creator>, AppError> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT first_name, last_name FROM profiles WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(first_name, last_name)| Creator {
        first_name,
        last_name,
    }))
}

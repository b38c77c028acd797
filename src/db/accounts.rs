use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{Account, DbUserSession, UserSession, to_utc};
use crate::error::AppError;

#[derive(sqlx::FromRow, Clone)]
pub struct DbAccount {
    pub id: Option<i64>,
    pub email: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbAccount> for Account {
    fn from(account: DbAccount) -> Self {
        Self {
            id: account.id.unwrap_or_default(),
            email: account.email.unwrap_or_default(),
            created_at: to_utc(account.created_at),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[instrument(skip_all, fields(email))]
pub async fn create_account(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<i64, AppError> {
    info!("Creating identity account");
    let email = normalize_email(email);

    if find_account_by_email(pool, &email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "An account for '{}' already exists",
            email
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO accounts (email, password) VALUES (?, ?)")
        .bind(&email)
        .bind(hashed_password)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_account(pool: &Pool<Sqlite>, id: i64) -> Result<Account, AppError> {
    let row = sqlx::query_as::<_, DbAccount>(
        "SELECT id, email, created_at FROM accounts WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(account) => Ok(Account::from(account)),
        _ => Err(AppError::NotFound(format!("Account with id {} not found", id))),
    }
}

#[instrument(skip(pool))]
pub async fn find_account_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<Account>, AppError> {
    let row = sqlx::query_as::<_, DbAccount>(
        "SELECT id, email, created_at FROM accounts WHERE email = ?",
    )
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Account::from))
}

#[instrument(skip_all, fields(email))]
pub async fn verify_account_password(
    pool: &Pool<Sqlite>,
    email: &str,
    password: &str,
) -> Result<Option<i64>, AppError> {
    info!("Verifying account credentials");
    let row: Option<(i64, String)> =
        sqlx::query_as("SELECT id, password FROM accounts WHERE email = ?")
            .bind(normalize_email(email))
            .fetch_optional(pool)
            .await?;

    match row {
        Some((id, hashed)) => match bcrypt::verify(password, &hashed) {
            Ok(true) => Ok(Some(id)),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

#[instrument(skip_all, fields(account_id))]
pub async fn update_account_password(
    pool: &Pool<Sqlite>,
    account_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating account password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("UPDATE accounts SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(account_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Account with id {} not found",
            account_id
        )));
    }

    Ok(())
}

#[instrument(skip(pool))]
pub async fn update_account_email(
    pool: &Pool<Sqlite>,
    account_id: i64,
    email: &str,
) -> Result<(), AppError> {
    info!("Updating account email");
    let email = normalize_email(email);

    let taken: Option<(i64,)> = sqlx::query_as("SELECT id FROM accounts WHERE email = ? AND id != ?")
        .bind(&email)
        .bind(account_id)
        .fetch_optional(pool)
        .await?;

    if taken.is_some() {
        return Err(AppError::Conflict(format!(
            "An account for '{}' already exists",
            email
        )));
    }

    sqlx::query("UPDATE accounts SET email = ? WHERE id = ?")
        .bind(email)
        .bind(account_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Sessions, resets and the attached profile go with the account.
#[instrument(skip(pool))]
pub async fn delete_account(pool: &Pool<Sqlite>, account_id: i64) -> Result<(), AppError> {
    info!("Deleting identity account");
    sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(account_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool, token))]
pub async fn create_session(
    pool: &Pool<Sqlite>,
    account_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO sessions (account_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(account_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT account_id, token, expires_at FROM sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn invalidate_account_sessions(
    pool: &Pool<Sqlite>,
    account_id: i64,
) -> Result<u64, AppError> {
    info!("Invalidating every session of account");

    let res = sqlx::query("DELETE FROM sessions WHERE account_id = ?")
        .bind(account_id)
        .execute(pool)
        .await?;

    Ok(res.rows_affected())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    sqlx::query("DELETE FROM password_resets WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[instrument(skip(pool, token))]
pub async fn create_password_reset(
    pool: &Pool<Sqlite>,
    account_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<(), AppError> {
    info!("Storing password reset token");

    sqlx::query("INSERT INTO password_resets (account_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(account_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(())
}

/// Deletes the reset token and returns its account when it was still valid.
#[instrument(skip(pool, token))]
pub async fn consume_password_reset(pool: &Pool<Sqlite>, token: &str) -> Result<i64, AppError> {
    info!("Consuming password reset token");
    let now = Utc::now().naive_utc();

    let row: Option<(i64, NaiveDateTime)> =
        sqlx::query_as("SELECT account_id, expires_at FROM password_resets WHERE token = ?")
            .bind(token)
            .fetch_optional(pool)
            .await?;

    sqlx::query("DELETE FROM password_resets WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    match row {
        Some((account_id, expires_at)) if expires_at > now => Ok(account_id),
        _ => Err(AppError::Authentication(
            "Invalid or expired reset token".to_string(),
        )),
    }
}

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::db;
use crate::error::AppError;

use super::UserSession;

/// Identity-provider account. Holds credentials only; everything the
/// application knows about a person lives on the profile.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct AccountUpdate {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Boundary to whatever system owns credentials and sessions. Callers only
/// propagate its results; they never look behind it.
#[rocket::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Option<UserSession>, AppError>;

    async fn sign_out(&self, token: &str) -> Result<(), AppError>;

    async fn get_session(&self, token: &str) -> Result<UserSession, AppError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AppError>;

    async fn complete_password_reset(&self, token: &str, new_password: &str)
    -> Result<(), AppError>;

    async fn update_password(&self, account_id: i64, new_password: &str) -> Result<(), AppError>;

    async fn create_user(&self, email: &str, password: &str) -> Result<Account, AppError>;

    async fn delete_user(&self, account_id: i64) -> Result<(), AppError>;

    async fn update_user_by_id(&self, account_id: i64, update: &AccountUpdate)
    -> Result<(), AppError>;
}

pub type Identity = Arc<dyn IdentityProvider>;

/// Identity provider backed by the application's own SQLite database.
pub struct LocalIdentity {
    pool: Pool<Sqlite>,
    session_ttl: Duration,
}

impl LocalIdentity {
    pub fn new(pool: Pool<Sqlite>, session_ttl: Duration) -> Self {
        Self { pool, session_ttl }
    }

    pub fn shared(pool: Pool<Sqlite>, session_ttl: Duration) -> Identity {
        Arc::new(Self::new(pool, session_ttl))
    }
}

#[rocket::async_trait]
impl IdentityProvider for LocalIdentity {
    #[instrument(skip_all, fields(email))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<Option<UserSession>, AppError> {
        let Some(account_id) = db::verify_account_password(&self.pool, email, password).await?
        else {
            return Ok(None);
        };

        let token = UserSession::generate_token();
        let expires_at = (Utc::now() + self.session_ttl).naive_utc();
        db::create_session(&self.pool, account_id, &token, expires_at).await?;

        let session = db::get_session_by_token(&self.pool, &token).await?;
        Ok(Some(session))
    }

    async fn sign_out(&self, token: &str) -> Result<(), AppError> {
        db::invalidate_session(&self.pool, token).await
    }

    async fn get_session(&self, token: &str) -> Result<UserSession, AppError> {
        let session = db::get_session_by_token(&self.pool, token).await?;

        if !session.is_valid() {
            return Err(AppError::Authentication("Session expired".to_string()));
        }

        Ok(session)
    }

    #[instrument(skip_all, fields(email))]
    async fn send_password_reset(&self, email: &str) -> Result<(), AppError> {
        let Some(account) = db::find_account_by_email(&self.pool, email).await? else {
            warn!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = Uuid::new_v4().to_string();
        let expires_at = (Utc::now() + Duration::hours(1)).naive_utc();
        db::create_password_reset(&self.pool, account.id, &token, expires_at).await?;

        info!(account_id = %account.id, "Password reset issued");
        debug!(reset_path = %format!("/auth/reset-password?token={}", token), "Password reset link");

        Ok(())
    }

    #[instrument(skip_all)]
    async fn complete_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let account_id = db::consume_password_reset(&self.pool, token).await?;
        db::update_account_password(&self.pool, account_id, new_password).await?;
        db::invalidate_account_sessions(&self.pool, account_id).await?;
        Ok(())
    }

    async fn update_password(&self, account_id: i64, new_password: &str) -> Result<(), AppError> {
        db::update_account_password(&self.pool, account_id, new_password).await
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let id = db::create_account(&self.pool, email, password).await?;
        db::get_account(&self.pool, id).await
    }

    async fn delete_user(&self, account_id: i64) -> Result<(), AppError> {
        db::delete_account(&self.pool, account_id).await
    }

    async fn update_user_by_id(
        &self,
        account_id: i64,
        update: &AccountUpdate,
    ) -> Result<(), AppError> {
        if let Some(email) = &update.email {
            db::update_account_email(&self.pool, account_id, email).await?;
        }

        if let Some(password) = &update.password {
            db::update_account_password(&self.pool, account_id, password).await?;
        }

        Ok(())
    }
}

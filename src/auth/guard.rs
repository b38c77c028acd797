use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::db::{NewProfile, create_profile, find_profile_by_user_id, get_account};
use crate::error::AppError;

use super::{Identity, User};

pub const SESSION_COOKIE: &str = "session_token";

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("user_auth_guard");
        let _guard = auth_span.enter();

        let Some(token) = request
            .cookies()
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string())
        else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let rocket = request.rocket();
        let (Some(db), Some(identity), Some(config)) = (
            rocket.state::<SqlitePool>(),
            rocket.state::<Identity>(),
            rocket.state::<AppConfig>(),
        ) else {
            tracing::error!("Managed state missing for authentication");
            return Outcome::Error((Status::InternalServerError, ()));
        };

        let session = match identity.get_session(&token).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %err, "Rejected session token");
                return Outcome::Error((Status::Unauthorized, ()));
            }
        };

        match resolve_profile(db, config, session.account_id).await {
            Ok(user) => {
                tracing::info!(email = %user.email, role = %user.role.as_str(), "User authenticated via session token");
                Outcome::Success(user)
            }
            Err(err) => {
                tracing::error!(account_id = %session.account_id, error = ?err, "Failed to resolve profile for valid session");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

/// Profile attached to `account_id`. Accounts that sign in without one get a
/// profile with the configured default role.
pub async fn resolve_profile(
    db: &SqlitePool,
    config: &AppConfig,
    account_id: i64,
) -> Result<User, AppError> {
    if let Some(user) = find_profile_by_user_id(db, config.role_scheme, account_id).await? {
        return Ok(user);
    }

    let account = get_account(db, account_id).await?;
    let role = config.provisioning_role();
    tracing::info!(account_id, role = %role, "Provisioning profile for account");

    create_profile(
        db,
        &NewProfile {
            user_id: account_id,
            first_name: String::new(),
            last_name: String::new(),
            email: account.email,
            role,
        },
    )
    .await?;

    find_profile_by_user_id(db, config.role_scheme, account_id)
        .await?
        .ok_or_else(|| AppError::Internal("Provisioned profile vanished".to_string()))
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    let error_json = json!({
        "error": "Unauthorized",
        "message": "Authentication required"
    });

    Custom(Status::Unauthorized, Json(error_json))
}

#[catch(403)]
pub fn forbidden_api(_req: &Request) -> Custom<Json<Value>> {
    tracing::warn!("Forbidden access attempt");
    Custom(
        Status::Forbidden,
        Json(json!({
            "error": "Forbidden",
            "message": "No tienes permiso para realizar esta acción"
        })),
    )
}

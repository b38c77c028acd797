#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod catalog;
mod config;
mod db;
mod error;
mod models;
mod setlist;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::str::FromStr;

use api::{
    api_change_password, api_create_setlist, api_create_song, api_create_song_type,
    api_create_user, api_delete_setlist, api_delete_song, api_delete_song_type, api_delete_user,
    api_edit_setlist_composer, api_get_setlist, api_get_setlists, api_get_song,
    api_get_song_types, api_get_songs, api_get_users, api_login, api_logout, api_me,
    api_me_unauthorized, api_new_setlist_composer, api_password_reset,
    api_password_reset_complete, api_setlist_composer, api_update_setlist, api_update_song,
    api_update_song_type, api_update_user, health,
};
use auth::{Identity, IdentityProvider, LocalIdentity, Role, forbidden_api, unauthorized_api};
use config::{AppConfig, load_environment};
use db::{NewProfile, clean_expired_sessions, count_profiles, create_profile, find_account_by_email};
use error::AppError;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket};
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use telemetry::{TelemetryFairing, init_tracing, shutdown_telemetry};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Figment(rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Application error: {0}")]
    App(#[from] AppError),
}

impl From<rocket::figment::Error> for Error {
    fn from(value: rocket::figment::Error) -> Self {
        Error::Figment(value)
    }
}

#[launch]
async fn rocket() -> _ {
    if let Err(e) = load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    init_tracing();

    match prepare().await {
        Ok(rocket) => rocket,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn prepare() -> Result<Rocket<Build>, Error> {
    let config = AppConfig::from_env()?;
    info!(role_scheme = %config.role_scheme, "Loaded configuration");

    let database_url = dotenvy::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://repertoire.db?mode=rwc".to_string());

    let options = SqliteConnectOptions::from_str(&database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(options).await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(AppError::from)?;
    info!("Migrations completed successfully");

    bootstrap_admin(&pool, &config).await?;

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    Ok(init_rocket(pool, config).await)
}

/// Seeds the first administrator on an empty database when credentials are configured.
async fn bootstrap_admin(pool: &SqlitePool, config: &AppConfig) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (
        config.bootstrap_admin_email.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    if count_profiles(pool).await? > 0 {
        return Ok(());
    }

    warn!(email, "No profiles found, creating bootstrap administrator");

    let identity = LocalIdentity::new(pool.clone(), config.session_ttl());
    let account_id = match find_account_by_email(pool, email).await? {
        Some(account) => account.id,
        None => identity.create_user(email, password).await?.id,
    };

    create_profile(
        pool,
        &NewProfile {
            user_id: account_id,
            first_name: "Administrador".to_string(),
            last_name: String::new(),
            email: email.trim().to_lowercase(),
            role: Role::Admin,
        },
    )
    .await?;

    Ok(())
}

pub async fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting church repertoire");

    let identity: Identity = LocalIdentity::shared(pool.clone(), config.session_ttl());

    rocket::build()
        .manage(pool)
        .manage(identity)
        .manage(config)
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_me,
                api_me_unauthorized,
                api_password_reset,
                api_password_reset_complete,
                api_change_password,
                api_get_users,
                api_create_user,
                api_update_user,
                api_delete_user,
                api_get_song_types,
                api_create_song_type,
                api_update_song_type,
                api_delete_song_type,
                api_get_songs,
                api_get_song,
                api_create_song,
                api_update_song,
                api_delete_song,
                api_get_setlists,
                api_get_setlist,
                api_new_setlist_composer,
                api_setlist_composer,
                api_edit_setlist_composer,
                api_create_setlist,
                api_update_setlist,
                api_delete_setlist,
            ],
        )
        .register("/api", catchers![unauthorized_api, forbidden_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
        .attach(AdHoc::on_shutdown("Telemetry shutdown", |_| {
            Box::pin(async { shutdown_telemetry() })
        }))
}

use std::path::Path;

use rocket::figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{Role, RoleScheme};

pub fn load_environment() -> Result<(), Box<dyn std::error::Error>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

/// Deployment settings, read from `REPERTOIRE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub role_scheme: RoleScheme,
    /// Role given to profiles provisioned on first sign-in. Falls back to the
    /// scheme's least privileged role when unset or outside the scheme.
    pub default_role: Option<String>,
    /// How long clients should keep a success notice on screen before navigating.
    pub redirect_delay_ms: u64,
    pub session_hours: i64,
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            role_scheme: RoleScheme::default(),
            default_role: None,
            redirect_delay_ms: 2000,
            session_hours: 1,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        }
    }
}

impl AppConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Env::prefixed("REPERTOIRE_"))
    }

    pub fn from_env() -> Result<Self, rocket::figment::Error> {
        Self::figment().extract()
    }

    pub fn provisioning_role(&self) -> Role {
        self.default_role
            .as_deref()
            .and_then(|role| self.role_scheme.parse_role(role).ok())
            .unwrap_or_else(|| self.role_scheme.default_role())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_hours.max(1))
    }
}

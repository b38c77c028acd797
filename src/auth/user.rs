use chrono::{DateTime, NaiveDateTime, Utc};
use rocket::http::Status;
use serde::Serialize;

use crate::error::AppError;

use super::{Capabilities, Permission, Role, RoleScheme};

/// Application-level user record, distinct from the identity account it is
/// attached to through `user_id`.
#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub scheme: RoleScheme,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Debug)]
pub struct DbUser {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl DbUser {
    /// Roles are parsed without the scheme so that profiles written under the
    /// other scheme still load; they simply hold no permissions.
    pub fn into_user(self, scheme: RoleScheme) -> Result<User, AppError> {
        let raw_role = self.role.unwrap_or_default();
        let role = Role::from_str(&raw_role).map_err(|e| {
            AppError::Internal(format!(
                "Profile {} has an unreadable role: {}",
                self.id.unwrap_or_default(),
                e
            ))
        })?;

        Ok(User {
            id: self.id.unwrap_or_default(),
            user_id: self.user_id.unwrap_or_default(),
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            role,
            scheme,
            created_at: to_utc(self.created_at),
            updated_at: to_utc(self.updated_at),
        })
    }
}

pub fn to_utc(value: Option<NaiveDateTime>) -> DateTime<Utc> {
    value
        .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.scheme.has_permission(self.role, permission)
    }

    pub fn capabilities(&self) -> Capabilities {
        self.scheme.capabilities(self.role)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), Status> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(Status::Forbidden)
        }
    }
}

//! Persisted user model and table schema.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use userdesk_core::DatabasePool;

/// DDL for the `users` table
///
/// `email` and `username` are UNIQUE so concurrent writers that both pass
/// the service's existence checks still cannot store a duplicate.
pub const USERS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email TEXT NOT NULL UNIQUE,
    username TEXT NOT NULL UNIQUE,
    hashed_password TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS ix_users_email ON users (email);
CREATE INDEX IF NOT EXISTS ix_users_username ON users (username);
";

/// Create the schema if it does not exist yet
///
/// # Errors
///
/// Returns the database error if a statement fails.
pub async fn init_schema(pool: &DatabasePool) -> userdesk_core::Result<()> {
    pool.execute_batch(USERS_SCHEMA).await?;
    tracing::debug!("users schema ready");
    Ok(())
}

/// Row of the `users` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    /// Server-generated primary key
    pub id: i64,
    /// Unique email address
    pub email: String,
    /// Unique display handle
    pub username: String,
    /// Argon2 PHC string, never the plaintext
    #[serde(skip_serializing)]
    pub hashed_password: String,
    /// Inactive users cannot obtain tokens
    pub is_active: bool,
    /// Set once on insert
    pub created_at: DateTime<Utc>,
}

/// Insert payload; the password is already hashed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Email address
    pub email: String,
    /// Display handle
    pub username: String,
    /// Argon2 PHC string
    pub hashed_password: String,
    /// Active flag
    pub is_active: bool,
}

/// Fields to copy onto an existing row; `None` leaves the column alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    /// New email
    pub email: Option<String>,
    /// New username
    pub username: Option<String>,
    /// New Argon2 PHC string
    pub hashed_password: Option<String>,
    /// New active flag
    pub is_active: Option<bool>,
}

impl UserChanges {
    /// True when no field would change
    pub const fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.username.is_none()
            && self.hashed_password.is_none()
            && self.is_active.is_none()
    }

    /// Copy the supplied fields onto `user`
    pub fn apply_to(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(hashed_password) = self.hashed_password {
            user.hashed_password = hashed_password;
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
    }
}

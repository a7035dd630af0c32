//! # User repository
//!
//! Storage port for users and its SQLite adapter. The adapter owns the
//! request's [`Session`]: every query runs inside the session's
//! transaction and nothing persists until [`UserRepository::commit`].

use crate::error::RepositoryError;
use crate::models::{NewUser, User, UserChanges};
use async_trait::async_trait;
use chrono::Utc;
use tracing::instrument;
use userdesk_core::Session;

/// Result alias for repository calls
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Port for reading and writing users
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send {
    /// User by primary key
    async fn get_by_id(&mut self, id: i64) -> RepositoryResult<Option<User>>;

    /// User by exact email
    async fn get_by_email(&mut self, email: &str) -> RepositoryResult<Option<User>>;

    /// User by exact username
    async fn get_by_username(&mut self, username: &str) -> RepositoryResult<Option<User>>;

    /// Page of users ordered by id
    async fn list(&mut self, skip: i64, limit: i64) -> RepositoryResult<Vec<User>>;

    /// Insert and return the stored row
    async fn create(&mut self, user: NewUser) -> RepositoryResult<User>;

    /// Copy `changes` onto row `id`; `None` when it does not exist
    async fn update(&mut self, id: i64, changes: UserChanges) -> RepositoryResult<Option<User>>;

    /// Delete row `id`; false when it did not exist
    async fn delete(&mut self, id: i64) -> RepositoryResult<bool>;

    /// Persist everything done so far
    async fn commit(&mut self) -> RepositoryResult<()>;
}

const SELECT_USER: &str =
    "SELECT id, email, username, hashed_password, is_active, created_at FROM users";

/// [`UserRepository`] over a SQLite session
#[derive(Debug)]
pub struct SqliteUserRepository {
    session: Session,
}

impl SqliteUserRepository {
    /// Repository working inside `session`
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    #[instrument(skip(self))]
    async fn get_by_id(&mut self, id: i64) -> RepositoryResult<Option<User>> {
        let conn = self.session.connection().await?;
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_by_email(&mut self, email: &str) -> RepositoryResult<Option<User>> {
        let conn = self.session.connection().await?;
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE email = ?"))
            .bind(email)
            .fetch_optional(conn)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn get_by_username(&mut self, username: &str) -> RepositoryResult<Option<User>> {
        let conn = self.session.connection().await?;
        let user = sqlx::query_as::<_, User>(&format!("{SELECT_USER} WHERE username = ?"))
            .bind(username)
            .fetch_optional(conn)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn list(&mut self, skip: i64, limit: i64) -> RepositoryResult<Vec<User>> {
        let conn = self.session.connection().await?;
        let users = sqlx::query_as::<_, User>(&format!(
            "{SELECT_USER} ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(conn)
        .await?;
        Ok(users)
    }

    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn create(&mut self, user: NewUser) -> RepositoryResult<User> {
        let conn = self.session.connection().await?;
        let created = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, username, hashed_password, is_active, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, email, username, hashed_password, is_active, created_at",
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.hashed_password)
        .bind(user.is_active)
        .bind(Utc::now())
        .fetch_one(conn)
        .await?;
        Ok(created)
    }

    #[instrument(skip(self, changes))]
    async fn update(&mut self, id: i64, changes: UserChanges) -> RepositoryResult<Option<User>> {
        let Some(mut user) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(user));
        }
        changes.apply_to(&mut user);

        let conn = self.session.connection().await?;
        sqlx::query(
            "UPDATE users SET email = ?, username = ?, hashed_password = ?, is_active = ?
             WHERE id = ?",
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.hashed_password)
        .bind(user.is_active)
        .bind(id)
        .execute(conn)
        .await?;
        Ok(Some(user))
    }

    #[instrument(skip(self))]
    async fn delete(&mut self, id: i64) -> RepositoryResult<bool> {
        let conn = self.session.connection().await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(&mut self) -> RepositoryResult<()> {
        self.session.commit().await?;
        Ok(())
    }
}

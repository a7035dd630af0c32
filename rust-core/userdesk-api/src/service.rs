//! # User service
//!
//! Business rules between handlers and the repository: validation,
//! uniqueness checks, password hashing, existence checks and commits.
//! Every write is committed here, once the whole operation succeeded.
//! Passwords are hashed before the first repository call, so a write
//! transaction is never open while Argon2 runs.

use crate::auth::{hash_password_async, verify_password_async};
use crate::error::{ApiError, ApiResult};
use crate::models::{NewUser, User, UserChanges};
use crate::repository::UserRepository;
use crate::schemas::{ListParams, LoginRequest, UserCreate, UserUpdate};
use tracing::{info, instrument};
use userdesk_core::Validate;

const USER_NOT_FOUND: &str = "User not found";
const EMAIL_TAKEN: &str = "Email already registered";
const USERNAME_TAKEN: &str = "Username already taken";
const BAD_CREDENTIALS: &str = "Incorrect email or password";
const INACTIVE_USER: &str = "Inactive user";

fn not_found() -> ApiError {
    ApiError::NotFound(USER_NOT_FOUND.to_string())
}

/// User operations over a repository
#[derive(Debug)]
pub struct UserService<R: UserRepository> {
    repository: R,
}

impl<R: UserRepository> UserService<R> {
    /// Service over `repository`
    pub const fn new(repository: R) -> Self {
        Self { repository }
    }

    /// Register a user
    ///
    /// # Errors
    ///
    /// `Validation`, `Conflict` when the email or username is taken, or a
    /// storage error.
    #[instrument(skip(self, input), fields(email = %input.email, username = %input.username))]
    pub async fn create_user(&mut self, input: UserCreate) -> ApiResult<User> {
        input.validate()?;
        let hashed_password = hash_password_async(input.password).await?;

        if self.repository.get_by_email(&input.email).await?.is_some() {
            return Err(ApiError::Conflict(EMAIL_TAKEN.to_string()));
        }
        if self.repository.get_by_username(&input.username).await?.is_some() {
            return Err(ApiError::Conflict(USERNAME_TAKEN.to_string()));
        }

        let user = self
            .repository
            .create(NewUser {
                email: input.email,
                username: input.username,
                hashed_password,
                is_active: input.is_active,
            })
            .await?;
        self.repository.commit().await?;

        info!(user_id = user.id, "user created");
        Ok(user)
    }

    /// User by id
    ///
    /// # Errors
    ///
    /// `NotFound` when there is no such user.
    #[instrument(skip(self))]
    pub async fn get_user(&mut self, id: i64) -> ApiResult<User> {
        self.repository.get_by_id(id).await?.ok_or_else(not_found)
    }

    /// Page of users
    ///
    /// # Errors
    ///
    /// Storage errors only.
    #[instrument(skip(self))]
    pub async fn list_users(&mut self, params: ListParams) -> ApiResult<Vec<User>> {
        Ok(self.repository.list(params.skip, params.limit).await?)
    }

    /// Copy the supplied fields onto user `id`
    ///
    /// # Errors
    ///
    /// `Validation`, `NotFound`, or `Conflict` when the new email or
    /// username belongs to another user.
    #[instrument(skip(self, input))]
    pub async fn update_user(&mut self, id: i64, input: UserUpdate) -> ApiResult<User> {
        input.validate()?;
        let hashed_password = match input.password {
            Some(password) => Some(hash_password_async(password).await?),
            None => None,
        };

        let existing = self.repository.get_by_id(id).await?.ok_or_else(not_found)?;

        if let Some(email) = input.email.as_deref().filter(|e| *e != existing.email) {
            if self.repository.get_by_email(email).await?.is_some() {
                return Err(ApiError::Conflict(EMAIL_TAKEN.to_string()));
            }
        }
        if let Some(username) = input.username.as_deref().filter(|u| *u != existing.username) {
            if self.repository.get_by_username(username).await?.is_some() {
                return Err(ApiError::Conflict(USERNAME_TAKEN.to_string()));
            }
        }

        let changes = UserChanges {
            email: input.email,
            username: input.username,
            hashed_password,
            is_active: input.is_active,
        };

        let user = self
            .repository
            .update(id, changes)
            .await?
            .ok_or_else(not_found)?;
        self.repository.commit().await?;
        Ok(user)
    }

    /// Remove user `id`
    ///
    /// # Errors
    ///
    /// `NotFound` when there is no such user.
    #[instrument(skip(self))]
    pub async fn delete_user(&mut self, id: i64) -> ApiResult<()> {
        if !self.repository.delete(id).await? {
            return Err(not_found());
        }
        self.repository.commit().await?;
        info!(user_id = id, "user deleted");
        Ok(())
    }

    /// Check credentials and return the account they belong to
    ///
    /// # Errors
    ///
    /// `Unauthorized` for an unknown email or wrong password, `Conflict`
    /// for an inactive account.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn authenticate(&mut self, input: LoginRequest) -> ApiResult<User> {
        input.validate()?;

        let bad_credentials = || ApiError::Unauthorized(BAD_CREDENTIALS.to_string());
        let user = self
            .repository
            .get_by_email(&input.email)
            .await?
            .ok_or_else(bad_credentials)?;

        if !verify_password_async(user.hashed_password.clone(), input.password).await? {
            return Err(bad_credentials());
        }
        if !user.is_active {
            return Err(ApiError::Conflict(INACTIVE_USER.to_string()));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::error::RepositoryError;
    use crate::repository::MockUserRepository;
    use chrono::Utc;
    use mockall::predicate::eq;

    fn stored(id: i64, email: &str, username: &str) -> User {
        User {
            id,
            email: email.into(),
            username: username.into(),
            hashed_password: "$argon2id$stub".into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn create_input() -> UserCreate {
        UserCreate {
            email: "ada@example.com".into(),
            username: "ada".into(),
            password: "correct horse".into(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_create_user_hashes_and_commits() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email().returning(|_| Ok(None));
        repo.expect_get_by_username().returning(|_| Ok(None));
        repo.expect_create()
            .withf(|new| {
                new.hashed_password.starts_with("$argon2") && new.email == "ada@example.com"
            })
            .times(1)
            .returning(|new| {
                Ok(User {
                    id: 1,
                    email: new.email,
                    username: new.username,
                    hashed_password: new.hashed_password,
                    is_active: new.is_active,
                    created_at: Utc::now(),
                })
            });
        repo.expect_commit().times(1).returning(|| Ok(()));

        let user = UserService::new(repo).create_user(create_input()).await.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.username, "ada");
    }

    #[tokio::test]
    async fn test_create_user_email_taken() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email()
            .returning(|_| Ok(Some(stored(7, "ada@example.com", "someone"))));
        repo.expect_create().never();
        repo.expect_commit().never();

        let err = UserService::new(repo).create_user(create_input()).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Email already registered"));
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_create_user_username_taken() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email().returning(|_| Ok(None));
        repo.expect_get_by_username()
            .returning(|_| Ok(Some(stored(7, "other@example.com", "ada"))));
        repo.expect_create().never();

        let err = UserService::new(repo).create_user(create_input()).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Username already taken"));
    }

    #[tokio::test]
    async fn test_create_user_invalid_input_touches_nothing() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email().never();

        let input = UserCreate {
            password: "short".into(),
            ..create_input()
        };
        let err = UserService::new(repo).create_user(input).await.unwrap_err();
        assert_eq!(err.status(), 422);
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id().with(eq(5)).returning(|_| Ok(None));

        let err = UserService::new(repo).get_user(5).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "User not found"));
    }

    #[tokio::test]
    async fn test_list_users_passes_paging() {
        let mut repo = MockUserRepository::new();
        repo.expect_list()
            .with(eq(10), eq(5))
            .returning(|_, _| Ok(vec![stored(11, "a@example.com", "aaa")]));

        let users = UserService::new(repo)
            .list_users(ListParams { skip: 10, limit: 5 })
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_update_user_copies_only_supplied_fields() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id()
            .returning(|id| Ok(Some(stored(id, "ada@example.com", "ada"))));
        repo.expect_get_by_username()
            .with(eq("lovelace"))
            .returning(|_| Ok(None));
        repo.expect_update()
            .withf(|id, changes| {
                *id == 3
                    && changes.username.as_deref() == Some("lovelace")
                    && changes.email.is_none()
                    && changes.hashed_password.is_none()
                    && changes.is_active.is_none()
            })
            .returning(|id, changes| {
                let mut user = stored(id, "ada@example.com", "ada");
                changes.apply_to(&mut user);
                Ok(Some(user))
            });
        repo.expect_commit().times(1).returning(|| Ok(()));

        let update = UserUpdate {
            username: Some("lovelace".into()),
            ..UserUpdate::default()
        };
        let user = UserService::new(repo).update_user(3, update).await.unwrap();
        assert_eq!(user.username, "lovelace");
        assert_eq!(user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_update_user_email_owned_by_other() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id()
            .returning(|id| Ok(Some(stored(id, "ada@example.com", "ada"))));
        repo.expect_get_by_email()
            .returning(|_| Ok(Some(stored(9, "grace@example.com", "grace"))));
        repo.expect_update().never();

        let update = UserUpdate {
            email: Some("grace@example.com".into()),
            ..UserUpdate::default()
        };
        let err = UserService::new(repo).update_user(3, update).await.unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id().returning(|_| Ok(None));

        let err = UserService::new(repo)
            .update_user(3, UserUpdate::default())
            .await
            .unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[tokio::test]
    async fn test_delete_user() {
        let mut repo = MockUserRepository::new();
        repo.expect_delete().with(eq(1)).returning(|_| Ok(true));
        repo.expect_delete().with(eq(2)).returning(|_| Ok(false));
        repo.expect_commit().times(1).returning(|| Ok(()));

        let mut service = UserService::new(repo);
        service.delete_user(1).await.unwrap();
        assert_eq!(service.delete_user(2).await.unwrap_err().status(), 404);
    }

    #[tokio::test]
    async fn test_storage_failure_is_500() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id()
            .returning(|_| Err(RepositoryError::Query(sqlx::Error::PoolTimedOut)));

        let err = UserService::new(repo).get_user(1).await.unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[tokio::test]
    async fn test_authenticate() {
        let hash = hash_password("correct horse").unwrap();
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email()
            .with(eq("ada@example.com"))
            .returning(move |_| {
                let mut user = stored(1, "ada@example.com", "ada");
                user.hashed_password = hash.clone();
                Ok(Some(user))
            });
        repo.expect_get_by_email()
            .returning(|_| Ok(None));
        let mut service = UserService::new(repo);

        let login = |email: &str, password: &str| LoginRequest {
            email: email.into(),
            password: password.into(),
        };

        let user = service
            .authenticate(login("ada@example.com", "correct horse"))
            .await
            .unwrap();
        assert_eq!(user.id, 1);

        let err = service
            .authenticate(login("ada@example.com", "wrong horse"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Incorrect email or password"));

        let err = service
            .authenticate(login("nobody@example.com", "correct horse"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[tokio::test]
    async fn test_authenticate_inactive() {
        let mut repo = MockUserRepository::new();
        let hash = hash_password("correct horse").unwrap();
        repo.expect_get_by_email().returning(move |email| {
            let mut user = stored(1, email, "ada");
            user.hashed_password = hash.clone();
            user.is_active = false;
            Ok(Some(user))
        });

        let err = UserService::new(repo)
            .authenticate(LoginRequest {
                email: "ada@example.com".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(ref m) if m == "Inactive user"));
    }
}

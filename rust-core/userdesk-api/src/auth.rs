//! # Authentication
//!
//! Argon2 password hashing and HS256 access tokens.
//!
//! Hashing is CPU-bound; async callers go through [`hash_password_async`]
//! and [`verify_password_async`], which run on Tokio's blocking pool.

use crate::error::{ApiError, ApiResult};
use crate::models::User;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error, instrument};

/// Hash a plaintext password into an Argon2 PHC string
///
/// # Errors
///
/// `ApiError::Internal` if hashing fails.
#[instrument(skip(password), err(Display))]
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "Argon2 password hashing failed");
            ApiError::Internal(format!("password hashing failed: {e}"))
        })
}

/// Check a plaintext password against a stored PHC string
///
/// # Errors
///
/// `ApiError::Internal` if the stored hash cannot be parsed or verification
/// fails for a reason other than a mismatch.
#[instrument(skip_all, err(Display))]
pub fn verify_password(hashed_password: &str, password: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(hashed_password).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        ApiError::Internal(format!("invalid stored password hash: {e}"))
    })?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => {
            debug!("password mismatch");
            Ok(false)
        }
        Err(e) => Err(ApiError::Internal(format!("password verification failed: {e}"))),
    }
}

/// [`hash_password`] on the blocking pool
///
/// # Errors
///
/// As [`hash_password`], or `Internal` if the blocking task panicked.
pub async fn hash_password_async(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {e}")))?
}

/// [`verify_password`] on the blocking pool
///
/// # Errors
///
/// As [`verify_password`], or `Internal` if the blocking task panicked.
pub async fn verify_password_async(hashed_password: String, password: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&hashed_password, &password))
        .await
        .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))?
}

/// Access-token claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string
    pub sub: String,
    /// User email at issue time
    pub email: String,
    /// Issued at (unix seconds)
    pub iat: u64,
    /// Expires at (unix seconds)
    pub exp: u64,
}

/// Signs HS256 access tokens
///
/// The server validates them with the same secret (see
/// `Server::enable_auth`).
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Issuer for `secret` with tokens valid for `ttl_secs`
    pub fn new(secret: &str, ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    /// Token lifetime in seconds
    pub const fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Sign a token for `user`
    ///
    /// # Errors
    ///
    /// `ApiError::Config` if the lifetime overflows the expiry timestamp,
    /// `ApiError::Internal` if signing fails.
    pub fn issue(&self, user: &User) -> ApiResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| ApiError::Internal(format!("system clock before epoch: {e}")))?
            .as_secs();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now,
            exp: now.checked_add(self.ttl_secs).ok_or_else(|| {
                ApiError::Config(format!("token lifetime {}s is too long", self.ttl_secs))
            })?,
        };
        encode(&Header::default(), &claims, &self.key)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }
}

/// User id from validated claims (`sub`)
///
/// # Errors
///
/// `ApiError::Unauthorized` when `sub` is missing or not an id.
pub fn subject_id(claims: Option<&serde_json::Value>) -> ApiResult<i64> {
    claims
        .and_then(|c| c.get("sub"))
        .and_then(serde_json::Value::as_str)
        .and_then(|sub| sub.parse::<i64>().ok())
        .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    fn user() -> User {
        User {
            id: 42,
            email: "ada@example.com".into(),
            username: "ada".into(),
            hashed_password: String::new(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert_ne!(hash, "correct horse");
        assert!(verify_password(&hash, "correct horse").unwrap());
        assert!(!verify_password(&hash, "wrong horse").unwrap());
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_is_internal() {
        assert!(matches!(
            verify_password("plaintext", "plaintext"),
            Err(ApiError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_async_wrappers() {
        let hash = hash_password_async("correct horse".into()).await.unwrap();
        assert!(verify_password_async(hash, "correct horse".into()).await.unwrap());
    }

    #[test]
    fn test_issue_round_trips_claims() {
        let issuer = TokenIssuer::new("secret", 60);
        let token = issuer.issue(&user()).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "42");
        assert_eq!(data.claims.email, "ada@example.com");
        assert_eq!(data.claims.exp - data.claims.iat, 60);
    }

    #[test]
    fn test_oversized_ttl_is_config_error() {
        let err = TokenIssuer::new("secret", u64::MAX).issue(&user()).unwrap_err();
        assert!(matches!(err, ApiError::Config(ref m) if m.contains("too long")));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_subject_id() {
        let claims = serde_json::json!({ "sub": "42" });
        assert_eq!(subject_id(Some(&claims)).unwrap(), 42);
        assert!(subject_id(None).is_err());
        assert!(subject_id(Some(&serde_json::json!({ "sub": "ada" }))).is_err());
    }
}

//! # Request-scoped dependencies
//!
//! Providers that build a handler's object graph from the app state:
//! pool → session → repository → service. Each call makes fresh
//! instances, so a request gets exactly one session, and that session's
//! transaction ends (commit or rollback-on-drop) when the handler returns.
//! Handlers that write ask for [`SessionMode::Write`].

use crate::auth::TokenIssuer;
use crate::error::{ApiError, ApiResult};
use crate::repository::SqliteUserRepository;
use crate::service::UserService;
use userdesk_core::{DatabasePool, HttpRequest, Session, SessionMode};

/// The app's connection pool
///
/// # Errors
///
/// `Internal` when no pool was registered with the server.
pub fn database(req: &HttpRequest) -> ApiResult<DatabasePool> {
    req.state()
        .get::<DatabasePool>()
        .ok_or_else(|| ApiError::Internal("database pool is not registered".to_string()))
}

/// A new session for this request
///
/// # Errors
///
/// See [`database`].
pub fn session(req: &HttpRequest, mode: SessionMode) -> ApiResult<Session> {
    let pool = database(req)?;
    Ok(match mode {
        SessionMode::Read => pool.session(),
        SessionMode::Write => pool.write_session(),
    })
}

/// Repository over a new session
///
/// # Errors
///
/// See [`database`].
pub fn user_repository(req: &HttpRequest, mode: SessionMode) -> ApiResult<SqliteUserRepository> {
    Ok(SqliteUserRepository::new(session(req, mode)?))
}

/// Service over a new repository
///
/// # Errors
///
/// See [`database`].
pub fn user_service(
    req: &HttpRequest,
    mode: SessionMode,
) -> ApiResult<UserService<SqliteUserRepository>> {
    Ok(UserService::new(user_repository(req, mode)?))
}

/// The token issuer
///
/// # Errors
///
/// `Config` when the server runs without a JWT secret.
pub fn token_issuer(req: &HttpRequest) -> ApiResult<TokenIssuer> {
    req.state()
        .get::<Option<TokenIssuer>>()
        .flatten()
        .ok_or_else(|| ApiError::Config("JWT_SECRET is not set".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use userdesk_core::{Method, TypeState};

    fn request(state: TypeState) -> HttpRequest {
        let mut req = HttpRequest::new(Method::Get, "/users", HashMap::new(), None);
        req.set_state(state);
        req
    }

    #[test]
    fn test_missing_pool_is_internal() {
        let req = request(TypeState::new());
        assert!(matches!(database(&req), Err(ApiError::Internal(_))));
        assert!(user_service(&req, SessionMode::Read).is_err());
    }

    #[tokio::test]
    async fn test_each_call_opens_a_fresh_session() {
        let state = TypeState::new();
        state.set(DatabasePool::connect_sqlite("sqlite::memory:", None).await.unwrap());
        let req = request(state);

        let first = session(&req, SessionMode::Read).unwrap();
        let second = session(&req, SessionMode::Write).unwrap();
        assert!(!first.in_transaction());
        assert!(!second.in_transaction());
        assert_eq!(first.mode(), SessionMode::Read);
        assert_eq!(second.mode(), SessionMode::Write);
    }

    #[test]
    fn test_token_issuer() {
        let state = TypeState::new();
        state.set::<Option<TokenIssuer>>(None);
        let req = request(state.clone());
        assert!(matches!(token_issuer(&req), Err(ApiError::Config(_))));

        state.set(Some(TokenIssuer::new("secret", 60)));
        let req = request(state);
        assert_eq!(token_issuer(&req).unwrap().ttl_secs(), 60);
    }
}

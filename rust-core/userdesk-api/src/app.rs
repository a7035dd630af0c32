//! Server assembly: state, middleware and routes for a given config.

use crate::auth::TokenIssuer;
use crate::config::AppConfig;
use crate::error::ApiResult;
use crate::routes;
use tracing::{info, warn};
use userdesk_core::{CorsMiddleware, DatabasePool, LoggingMiddleware, Server, TimingMiddleware};

/// Build a ready-to-serve server
///
/// Without `jwt_secret`, `/auth/token` answers 500 and `/users/me` is
/// rejected as misconfigured.
///
/// # Errors
///
/// `Config` for an unusable bind address, `Internal` if a route pattern
/// is rejected.
pub fn build_server(config: &AppConfig, pool: DatabasePool) -> ApiResult<Server> {
    let mut server = Server::new().bind(config.socket_addr()?);
    server.set_max_body_size(config.max_body_size);

    let issuer = config
        .jwt_secret
        .as_deref()
        .map(|secret| TokenIssuer::new(secret, config.token_ttl_secs));
    match config.jwt_secret.as_deref() {
        Some(secret) => server.enable_auth(secret),
        None => warn!("JWT_SECRET is not set; token routes are disabled"),
    }

    server.manage(pool);
    server.manage(issuer);

    server.add_middleware(LoggingMiddleware::new());
    server.add_middleware(TimingMiddleware::new());
    if let Some(origin) = &config.cors_allow_origin {
        server.add_middleware(CorsMiddleware::new().allow_origin(origin.as_str()));
    }

    routes::register(&mut server)?;
    info!(middleware = ?server.middleware_names(), "server assembled");
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_server_registers_state() {
        let pool = DatabasePool::connect_sqlite("sqlite::memory:", None).await.unwrap();
        let config = AppConfig {
            jwt_secret: Some("secret".into()),
            cors_allow_origin: Some("https://app.example.com".into()),
            ..AppConfig::default()
        };

        let server = build_server(&config, pool).unwrap();
        assert!(server.state().contains::<DatabasePool>());
        assert!(server.state().get::<Option<TokenIssuer>>().flatten().is_some());
        assert_eq!(
            server.middleware_names(),
            vec!["LoggingMiddleware", "TimingMiddleware", "CorsMiddleware"]
        );
        assert_eq!(server.config().address.port(), 8000);
    }

    #[tokio::test]
    async fn test_build_server_without_secret() {
        let pool = DatabasePool::connect_sqlite("sqlite::memory:", None).await.unwrap();
        let server = build_server(&AppConfig::default(), pool).unwrap();
        assert!(server.state().get::<Option<TokenIssuer>>().flatten().is_none());
        assert_eq!(server.middleware_names().len(), 2);
    }
}

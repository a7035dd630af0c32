//! Application configuration from the environment (and `.env`).

use crate::error::{ApiError, ApiResult};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use userdesk_core::database::DEFAULT_MAX_CONNECTIONS;

/// Longest accepted access-token lifetime (one year)
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Runtime settings for the `userdesk` binary
#[derive(Clone)]
pub struct AppConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// SQLite URL
    pub database_url: String,
    /// Pool size for file databases
    pub database_max_connections: u32,
    /// HS256 secret; token routes are disabled without it
    pub jwt_secret: Option<String>,
    /// Access-token lifetime in seconds
    pub token_ttl_secs: u64,
    /// Request body limit in bytes
    pub max_body_size: usize,
    /// Origin allowed by CORS; no CORS headers when unset
    pub cors_allow_origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_url: "sqlite:userdesk.db".to_string(),
            database_max_connections: DEFAULT_MAX_CONNECTIONS,
            jwt_secret: None,
            token_ttl_secs: 3600,
            max_body_size: 1024 * 1024,
            cors_allow_origin: None,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("database_max_connections", &self.database_max_connections)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("max_body_size", &self.max_body_size)
            .field("cors_allow_origin", &self.cors_allow_origin)
            .finish()
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    ///
    /// # Errors
    ///
    /// `ApiError::Config` when a numeric variable does not parse.
    pub fn from_env() -> ApiResult<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|name| env::var(name).ok())?;
        tracing::info!("Application configuration loaded");
        Ok(config)
    }

    /// Build from an arbitrary variable source
    ///
    /// # Errors
    ///
    /// `ApiError::Config` when a numeric variable does not parse, or
    /// `TOKEN_TTL_SECS` is outside `1..=MAX_TOKEN_TTL_SECS`.
    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token_ttl_secs = parse_or(
            non_empty("TOKEN_TTL_SECS"),
            "TOKEN_TTL_SECS",
            defaults.token_ttl_secs,
        )?;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&token_ttl_secs) {
            return Err(ApiError::Config(format!(
                "Invalid TOKEN_TTL_SECS: {token_ttl_secs} is outside 1..={MAX_TOKEN_TTL_SECS}"
            )));
        }

        Ok(Self {
            host: non_empty("USERDESK_HOST").unwrap_or(defaults.host),
            port: parse_or(non_empty("USERDESK_PORT"), "USERDESK_PORT", defaults.port)?,
            database_url: non_empty("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: parse_or(
                non_empty("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            jwt_secret: non_empty("JWT_SECRET"),
            token_ttl_secs,
            max_body_size: parse_or(
                non_empty("MAX_BODY_SIZE"),
                "MAX_BODY_SIZE",
                defaults.max_body_size,
            )?,
            cors_allow_origin: non_empty("CORS_ALLOW_ORIGIN"),
        })
    }

    /// Socket address to bind
    ///
    /// # Errors
    ///
    /// `ApiError::Config` when the host is not an IP address.
    pub fn socket_addr(&self) -> ApiResult<SocketAddr> {
        let host = if self.host == "localhost" { "127.0.0.1" } else { &self.host };
        format!("{host}:{}", self.port)
            .parse::<SocketAddr>()
            .or_else(|_| format!("[{host}]:{}", self.port).parse::<SocketAddr>())
            .map_err(|e| ApiError::Config(format!("Invalid USERDESK_HOST '{}': {e}", self.host)))
    }
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> ApiResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map_or(Ok(default), |v| {
        v.trim()
            .parse()
            .map_err(|e| ApiError::Config(format!("Invalid {name}: {e}")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.database_url, "sqlite:userdesk.db");
        assert_eq!(config.token_ttl_secs, 3600);
        assert!(config.jwt_secret.is_none());
        assert_eq!(config.socket_addr().unwrap().to_string(), "127.0.0.1:8000");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("USERDESK_HOST", "0.0.0.0"),
            ("USERDESK_PORT", "9000"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", "s3cret"),
            ("MAX_BODY_SIZE", "2048"),
            ("CORS_ALLOW_ORIGIN", "https://app.example.com"),
        ]))
        .unwrap();
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:9000");
        assert_eq!(config.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.max_body_size, 2048);
        assert_eq!(config.cors_allow_origin.as_deref(), Some("https://app.example.com"));
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&[("USERDESK_PORT", "eighty")]))
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::Config(ref m) if m.contains("USERDESK_PORT")));
    }

    #[test]
    fn test_token_ttl_bounds() {
        let max = MAX_TOKEN_TTL_SECS.to_string();
        let config = AppConfig::from_lookup(lookup(&[("TOKEN_TTL_SECS", max.as_str())])).unwrap();
        assert_eq!(config.token_ttl_secs, MAX_TOKEN_TTL_SECS);

        let too_long = u64::MAX.to_string();
        for raw in ["0", too_long.as_str()] {
            let err = AppConfig::from_lookup(lookup(&[("TOKEN_TTL_SECS", raw)]))
                .err()
                .unwrap();
            assert!(matches!(err, ApiError::Config(ref m) if m.contains("TOKEN_TTL_SECS")));
        }
    }

    #[test]
    fn test_blank_secret_is_unset() {
        let config = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "  ")])).unwrap();
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn test_secret_redacted_in_debug() {
        let config = AppConfig {
            jwt_secret: Some("s3cret".into()),
            ..AppConfig::default()
        };
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}

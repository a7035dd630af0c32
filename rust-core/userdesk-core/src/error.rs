//! # Error Handling
//!
//! Error types for the userdesk runtime.

use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the HTTP runtime and the database layer
#[derive(Error, Debug)]
pub enum Error {
    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    BindError {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// No route is registered for the method and path
    #[error("No route found for path: {path}")]
    RouteNotFound {
        /// The path that wasn't matched
        path: String,
    },

    /// Request method the runtime does not route
    #[error("Method not allowed: {method}")]
    MethodNotAllowed {
        /// Method as received
        method: String,
    },

    /// Route pattern rejected at registration time
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Path parameter could not be converted to its declared kind
    #[error("Invalid path parameter '{value}': expected {expected}")]
    InvalidParam {
        /// Raw segment value
        value: String,
        /// Declared kind
        expected: &'static str,
    },

    /// Request or response body is not valid JSON for the target type
    #[error("Invalid JSON: {reason}")]
    InvalidJson {
        /// Parser message
        reason: String,
    },

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_not_found_error() {
        let err = Error::RouteNotFound {
            path: "/unknown".to_string(),
        };
        assert!(err.to_string().contains("/unknown"));
    }

    #[test]
    fn test_bind_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = Error::BindError {
            address: "0.0.0.0:8000".to_string(),
            source: io_err,
        };
        assert!(err.to_string().contains("0.0.0.0:8000"));
    }

    #[test]
    fn test_invalid_param_message() {
        let err = Error::InvalidParam {
            value: "abc".to_string(),
            expected: "int",
        };
        assert_eq!(err.to_string(), "Invalid path parameter 'abc': expected int");
    }
}

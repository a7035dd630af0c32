//! # Userdesk Core
//!
//! Runtime library underneath the userdesk API: an HTTP server, routing
//! with typed path parameters, validation errors and SQLite sessions.
//!
//! ## Modules
//!
//! - `server` - HTTP server built on Hyper, auth and dispatch
//! - `router` - Routing using matchit (radix trie)
//! - `route` - Route metadata
//! - `params` - Typed path parameters and conversion
//! - `request` - HTTP request with headers, query and body
//! - `response` - HTTP response built by handlers
//! - `middleware` - Request/response middleware system
//! - `json` - JSON parsing with simd-json
//! - `validation` - Structured field validation errors
//! - `state` - Type-keyed application state
//! - `database` - SQLite pool and per-request sessions
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod database;
pub mod error;
pub mod json;
pub mod middleware;
pub mod params;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod state;
pub mod validation;

pub use database::{DatabasePool, DbValue, Session, SessionMode};
pub use error::{Error, Result};
pub use json::{parse_json, to_json};
pub use middleware::{
    CorsMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareResult,
    TimingMiddleware,
};
pub use params::{ParamKind, ParamValue, PathParams};
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use route::RouteSpec;
pub use router::{Method, Router};
pub use server::{handler, Handler, HandlerFuture, Server, ServerConfig};
pub use state::TypeState;
pub use validation::{
    FieldError, Validate, ValidationCode, ValidationErrors, ValidationResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

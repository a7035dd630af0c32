//! # Userdesk API
//!
//! User management over HTTP, layered router → service → repository →
//! session on top of `userdesk-core`.
//!
//! ## Modules
//!
//! - `config` - Environment configuration
//! - `telemetry` - Tracing subscriber setup
//! - `error` - Repository and API errors
//! - `models` - Persisted `User` and the table schema
//! - `schemas` - Request/response models with validation
//! - `repository` - Storage port and its SQLite adapter
//! - `service` - User business rules
//! - `auth` - Password hashing and access tokens
//! - `dependencies` - Per-request providers
//! - `routes` - HTTP handlers
//! - `app` - Server assembly

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod auth;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod models;
pub mod repository;
pub mod routes;
pub mod schemas;
pub mod service;
pub mod telemetry;

pub use app::build_server;
pub use auth::TokenIssuer;
pub use config::AppConfig;
pub use error::{ApiError, ApiResult, RepositoryError};
pub use models::{init_schema, User};
pub use repository::{SqliteUserRepository, UserRepository};
pub use service::UserService;

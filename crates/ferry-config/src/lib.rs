//! Typed configuration for Ferry.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict parsing (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//!
//! [routing]
//! error_path = "/error/"
//!
//! [trusted_proxy]
//! trust_x_forwarded_for = true
//! trust_x_request_id = true
//!
//! [system]
//! disable_validator = false
//! strict_nested = false
//!
//! [auth]
//! algorithm = "HS256"
//! secret = "change-me"
//! login_cookie = { name = "session", audience = "login" }
//!
//! [audit]
//! policy = "login"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [extensions.ratelimit]
//! per_minute = 120
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden with `PREFIX__SECTION__KEY`, for example
//! `FERRY__AUDIT__POLICY=always` or `FERRY__TELEMETRY__LOGGING__LEVEL=debug`.

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{FerryConfig, FerryConfigBuilder};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;

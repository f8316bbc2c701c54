//! # Ferry Server
//!
//! Serves [`ferry_pipeline`] routes over HTTP/1.1, and HTTP/2 when
//! `server.http2_enabled` is set.
//!
//! - route registration by priority, with CORS preflight routes
//! - extension and route lifecycle hooks
//! - body size and read timeout limits
//! - graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use ferry_config::ConfigLoader;
//! use ferry_core::{Failure, RequestContext};
//! use ferry_extract::Bind;
//! use ferry_pipeline::{HandlerOption, TypedHandler};
//! use ferry_server::Server;
//!
//! #[derive(Debug, Clone, Default, Bind)]
//! pub struct Hello {
//!     #[bind(query, default = "world")]
//!     pub name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_defaults()
//!         .with_optional_file("ferry.toml")?
//!         .with_env_prefix("FERRY")
//!         .load()?;
//!     Server::builder()
//!         .config(config)
//!         .route(TypedHandler::new(
//!             HandlerOption::api("/hello"),
//!             |_ctx: RequestContext, input: Hello| async move {
//!                 Ok::<_, Failure>(format!("hello {}", input.name))
//!             },
//!         ))
//!         .build()?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/ferry-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cors;
pub mod error;
pub mod lifecycle;
pub mod server;
pub mod shutdown;

pub use error::{ServerError, ServerResult};
pub use lifecycle::Phase;
pub use server::{RouteInfo, Server, ServerBuilder};
pub use shutdown::{ConnectionTracker, ShutdownSignal};

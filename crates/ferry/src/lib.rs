//! # Ferry
//!
//! Typed request binding and dispatch for HTTP services.
//!
//! A handler is an async function from a request context and a typed input
//! record to a serializable output. Ferry binds the input from path
//! parameters, query and form values, cookies, headers, token claims and
//! the body, validates it, runs extension and route hooks around the call,
//! and renders the outcome by content type.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferry::prelude::*;
//!
//! #[derive(Debug, Clone, Default, Bind)]
//! #[bind(crate = "ferry::extract")]
//! pub struct GetUser {
//!     #[bind(path, required)]
//!     pub id: u64,
//!     #[bind(query, default = "false")]
//!     pub verbose: bool,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     Server::builder()
//!         .route(TypedHandler::new(
//!             HandlerOption::api("/users/:id"),
//!             |_ctx: RequestContext, input: GetUser| async move {
//!                 if input.id == 0 {
//!                     return Err(Failure::from(CodeError::not_found("no such user")));
//!                 }
//!                 Ok(format!("user {}", input.id))
//!             },
//!         ))
//!         .build()?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → Router → RequestContext → extract(Plan) → pre hooks → handler
//!                                                                    ↓
//! Response ← Renderer / post hooks ← audit ←─────────────────────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/ferry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use ferry_config as config;
pub use ferry_core as core;
pub use ferry_extract as extract;
pub use ferry_pipeline as pipeline;
pub use ferry_router as router;
pub use ferry_server as server;
pub use ferry_telemetry as telemetry;

/// Common imports.
///
/// Records deriving [`Bind`](prelude::Bind) through this crate need
/// `#[bind(crate = "ferry::extract")]`.
pub mod prelude {
    pub use ferry_config::{ConfigLoader, FerryConfig};
    pub use ferry_core::{
        CodeError, Failure, FieldErrors, Identity, Redirect, RenderSelf, RequestContext,
    };
    pub use ferry_extract::Bind;
    pub use ferry_pipeline::{
        Engine, ExtInfo, Extension, ExtensionError, HandlerOption, InputView, Payload, Response,
        Route, TypedHandler,
    };
    pub use ferry_server::{Server, ShutdownSignal};
}

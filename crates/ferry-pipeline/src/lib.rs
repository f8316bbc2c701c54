//! # Ferry Pipeline
//!
//! The generic handler pipeline and the extension registry.
//!
//! A route is a [`TypedHandler`]: a plain async function over a typed input
//! plus a [`HandlerOption`]. At call time the pipeline extracts the input,
//! runs pre-hooks, calls the function, audits and renders the outcome.
//!
//! ```text
//! Request ─→ extract ─→ route pre-hook ─→ extension pre-hooks ─→ handler
//!                                                                  │
//! Response ←─ render ←─ audit ←─────────────────────────────────────┘
//!             │
//!             ├─ extension response/error hooks (first to handle wins)
//!             ├─ route response/error hook
//!             └─ content negotiation table, HTML as fallback
//! ```
//!
//! ## Renderers
//!
//! | Content type | Output | Error |
//! |---|---|---|
//! | `application/json` | `{"data":…}` | `{"error":{"code","msg","child"}}` |
//! | `text/html` | verbatim text, template, or JSON | redirect to the error path |
//!
//! Errors that render themselves, such as [`ferry_core::Redirect`], skip
//! the table.
//!
//! ## Example
//!
//! ```
//! use ferry_core::{CodeError, Failure, RequestContext};
//! use ferry_extract::Bind;
//! use ferry_pipeline::{Engine, HandlerOption, Route, TypedHandler};
//! use http::{StatusCode, Uri};
//! use serde::Serialize;
//!
//! #[derive(Debug, Clone, Default, Bind)]
//! pub struct GetUser {
//!     #[bind(query, required)]
//!     pub id: u64,
//! }
//!
//! #[derive(Serialize)]
//! struct User {
//!     id: u64,
//! }
//!
//! let route = TypedHandler::new(
//!     HandlerOption::api("/user"),
//!     |_ctx: RequestContext, input: GetUser| async move {
//!         if input.id == 13 {
//!             return Err(CodeError::not_found("no such user"));
//!         }
//!         Ok(User { id: input.id })
//!     },
//! );
//!
//! # tokio_test::block_on(async {
//! let engine = Engine::default();
//! let ctx = RequestContext::builder().uri(Uri::from_static("/user?id=7")).build();
//! let response = route.handle(&ctx, &engine).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(response.body(), r#"{"data":{"id":7}}"#);
//!
//! let ctx = RequestContext::builder().uri(Uri::from_static("/user?id=13")).build();
//! let response = route.handle(&ctx, &engine).await;
//! assert_eq!(response.status(), StatusCode::NOT_FOUND);
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/ferry-pipeline/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod audit;
pub mod engine;
pub mod extension;
pub mod negotiate;
pub mod option;
pub mod payload;
pub mod typed;
pub mod types;

pub use audit::{audit, should_audit};
pub use engine::Engine;
pub use extension::{
    ExtInfo, Extension, ExtensionConfig, ExtensionError, ExtensionRegistry,
    ExtensionRegistryBuilder,
};
pub use negotiate::{ContentNegotiation, HtmlRenderer, JsonRenderer, Renderer};
pub use option::{
    ErrorHook, ExtEntry, ExtensionMap, HandlerOption, LifecycleHook, RequestHook, ResponseHook,
};
pub use payload::{Payload, Verbatim};
pub use typed::{InputView, Route, TypedHandler};
pub use types::{BoxFuture, Response, ResponseExt, HTML, JSON};

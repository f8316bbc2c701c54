//! Extensions and the registry that holds them.
//!
//! An extension plugs into six points of the engine: configuration, three
//! lifecycle hooks and three per-request hooks. Extensions run in
//! registration order. The registry is frozen once built.
//!
//! # Example
//!
//! ```
//! use ferry_core::{Failure, RequestContext};
//! use ferry_pipeline::{
//!     BoxFuture, ExtInfo, Extension, ExtensionRegistry, HandlerOption, InputView,
//! };
//!
//! struct Tracer;
//!
//! impl Extension for Tracer {
//!     fn info(&self) -> ExtInfo {
//!         ExtInfo::new("tracer")
//!     }
//!
//!     fn on_request<'a>(
//!         &'a self,
//!         ctx: &'a RequestContext,
//!         _option: &'a HandlerOption,
//!         _input: &'a InputView<'a>,
//!     ) -> BoxFuture<'a, Result<(), Failure>> {
//!         Box::pin(async move {
//!             tracing::debug!(path = ctx.path(), "traced");
//!             Ok(())
//!         })
//!     }
//! }
//!
//! let registry = ExtensionRegistry::builder().register(Tracer).build();
//! assert_eq!(registry.len(), 1);
//! assert_eq!(registry.names(), vec!["tracer"]);
//! ```

use std::fmt;
use std::sync::Arc;

use ferry_core::{Failure, RequestContext};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::engine::Engine;
use crate::option::HandlerOption;
use crate::payload::Payload;
use crate::typed::InputView;
use crate::types::{BoxFuture, Response};

/// Errors raised by extension configuration and lifecycle hooks.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// The `extensions.<name>` table does not fit the extension's type.
    #[error("invalid configuration for extension '{name}': {source}")]
    Config {
        /// Extension name.
        name: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// A lifecycle hook failed.
    #[error("{0}")]
    Hook(String),
}

impl ExtensionError {
    /// A hook failure with `message`.
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }
}

/// Identifies an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtInfo {
    /// Name used for logging and as the configuration key.
    pub name: String,
}

impl ExtInfo {
    /// Info for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A pluggable participant in the engine lifecycle and the request
/// pipeline.
///
/// All hooks have no-op defaults. Response and error hooks return `true`
/// when they have written the response, which stops further rendering.
pub trait Extension: Send + Sync + 'static {
    /// Name and metadata.
    fn info(&self) -> ExtInfo;

    /// Receives the `extensions.<name>` configuration table, or `null`.
    fn configure(&self, _config: &serde_json::Value) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Called once when the server is built.
    fn on_init(&self, _engine: &Engine) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Called once per route before serving starts.
    fn on_handler_init(
        &self,
        _engine: &Engine,
        _option: &HandlerOption,
    ) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Called once right before the server accepts connections.
    fn on_serve(&self, _engine: &Engine) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Called once at shutdown.
    fn on_shutdown(&self, _engine: &Engine) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Pre-hook, run after extraction. An error skips the handler.
    fn on_request<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _option: &'a HandlerOption,
        _input: &'a InputView<'a>,
    ) -> BoxFuture<'a, Result<(), Failure>> {
        Box::pin(async { Ok(()) })
    }

    /// Response hook.
    fn on_response(
        &self,
        _ctx: &RequestContext,
        _option: &HandlerOption,
        _payload: &Payload,
        _response: &mut Response,
    ) -> bool {
        false
    }

    /// Error hook.
    fn on_error(
        &self,
        _ctx: &RequestContext,
        _option: &HandlerOption,
        _failure: &Failure,
        _response: &mut Response,
    ) -> bool {
        false
    }
}

/// Ordered, immutable list of extensions.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    extensions: Arc<[Arc<dyn Extension>]>,
}

impl ExtensionRegistry {
    /// Starts a registry.
    pub fn builder() -> ExtensionRegistryBuilder {
        ExtensionRegistryBuilder::default()
    }

    /// An empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Extensions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Extension>> {
        self.extensions.iter()
    }

    /// Extensions as a slice.
    pub fn as_slice(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    /// Number of extensions.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Extension names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.extensions.iter().map(|e| e.info().name).collect()
    }
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extensions", &self.names())
            .finish()
    }
}

/// Collects extensions before the registry is frozen.
#[derive(Default)]
pub struct ExtensionRegistryBuilder {
    extensions: Vec<Arc<dyn Extension>>,
}

impl ExtensionRegistryBuilder {
    /// Appends `extension`.
    pub fn register<E: Extension>(mut self, extension: E) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    /// Appends an already shared extension.
    pub fn register_arc(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Freezes the list.
    pub fn build(self) -> ExtensionRegistry {
        ExtensionRegistry {
            extensions: self.extensions.into(),
        }
    }
}

impl fmt::Debug for ExtensionRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistryBuilder")
            .field("len", &self.extensions.len())
            .finish()
    }
}

/// Swappable typed configuration for extension implementors.
///
/// ```
/// use ferry_pipeline::ExtensionConfig;
/// use serde::Deserialize;
///
/// #[derive(Debug, Default, Deserialize)]
/// struct Limits {
///     #[serde(default)]
///     per_minute: u32,
/// }
///
/// let config = ExtensionConfig::<Limits>::default();
/// assert_eq!(config.get().per_minute, 0);
///
/// config
///     .update("limits", &serde_json::json!({ "per_minute": 10 }))
///     .unwrap();
/// assert_eq!(config.get().per_minute, 10);
/// ```
#[derive(Debug, Default)]
pub struct ExtensionConfig<C> {
    current: RwLock<Arc<C>>,
}

impl<C: DeserializeOwned + Default> ExtensionConfig<C> {
    /// Holder starting at `initial`.
    pub fn new(initial: C) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// The current configuration.
    pub fn get(&self) -> Arc<C> {
        Arc::clone(&self.current.read())
    }

    /// Replaces the configuration with `value` decoded as `C`. A `null`
    /// value resets it to `C::default()`.
    pub fn update(&self, name: &str, value: &serde_json::Value) -> Result<(), ExtensionError> {
        let next = if value.is_null() {
            C::default()
        } else {
            C::deserialize(value).map_err(|source| ExtensionError::Config {
                name: name.to_string(),
                source,
            })?
        };
        *self.current.write() = Arc::new(next);
        Ok(())
    }
}

//! Extension and route lifecycle hooks.
//!
//! # Execution Order
//!
//! - **Build**: extension `configure`, extension `on_init`, route `on_init`
//! - **Serve**: extension `on_handler_init` for every route, then
//!   extension `on_serve`
//! - **Shutdown**: extension `on_shutdown`, route `on_shutdown`
//!
//! Build and serve stop at the first failure. Shutdown logs failures and
//! keeps going. Extension hooks are skipped while
//! `system.disable_extensions` is set.

use std::fmt;
use std::sync::Arc;

use ferry_pipeline::{Engine, Route};

use crate::error::{ServerError, ServerResult};

/// A lifecycle phase, as reported in errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Extension configuration.
    Configure,
    /// Init hooks.
    Init,
    /// Per-route extension init.
    HandlerInit,
    /// Right before accepting connections.
    Serve,
    /// Shutdown hooks.
    Shutdown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Configure => "configure",
            Self::Init => "init",
            Self::HandlerInit => "handler init",
            Self::Serve => "serve",
            Self::Shutdown => "shutdown",
        })
    }
}

/// Build phase.
pub(crate) fn init(engine: &Engine, routes: &[Arc<dyn Route>]) -> ServerResult {
    for ext in engine.extensions() {
        let name = ext.info().name;
        let value = engine
            .config()
            .extension(&name)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        ext.configure(&value).map_err(|source| ServerError::Extension {
            name,
            phase: Phase::Configure,
            source,
        })?;
    }

    for ext in engine.extensions() {
        ext.on_init(engine).map_err(|source| ServerError::Extension {
            name: ext.info().name,
            phase: Phase::Init,
            source,
        })?;
        tracing::debug!(extension = %ext.info().name, "extension initialised");
    }

    for route in routes {
        let option = route.option();
        if let Some(hook) = option.init_hook() {
            hook(engine).map_err(|source| ServerError::RouteHook {
                path: option.path().to_string(),
                phase: Phase::Init,
                source,
            })?;
        }
    }
    Ok(())
}

/// Serve phase.
pub(crate) fn serve(engine: &Engine, routes: &[Arc<dyn Route>]) -> ServerResult {
    for ext in engine.extensions() {
        for route in routes {
            ext.on_handler_init(engine, route.option())
                .map_err(|source| ServerError::Extension {
                    name: ext.info().name,
                    phase: Phase::HandlerInit,
                    source,
                })?;
        }
    }

    for ext in engine.extensions() {
        ext.on_serve(engine).map_err(|source| ServerError::Extension {
            name: ext.info().name,
            phase: Phase::Serve,
            source,
        })?;
    }
    Ok(())
}

/// Shutdown phase.
pub(crate) fn shutdown(engine: &Engine, routes: &[Arc<dyn Route>]) {
    for ext in engine.extensions() {
        if let Err(e) = ext.on_shutdown(engine) {
            tracing::error!(extension = %ext.info().name, error = %e, "extension shutdown hook failed");
        }
    }

    for route in routes {
        let option = route.option();
        if let Some(hook) = option.shutdown_hook() {
            if let Err(e) = hook(engine) {
                tracing::error!(path = option.path(), error = %e, "route shutdown hook failed");
            }
        }
    }
}

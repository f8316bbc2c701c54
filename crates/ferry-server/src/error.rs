//! Server error types.

use std::io;
use std::net::SocketAddr;

use ferry_core::TokenError;
use ferry_pipeline::ExtensionError;
use ferry_router::InsertError;
use thiserror::Error;

use crate::lifecycle::Phase;

/// Errors raised while building or running a server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// `server.http_addr` is not a socket address.
    #[error("invalid address '{addr}': {source}")]
    Address {
        /// Configured address.
        addr: String,
        /// Parser error.
        #[source]
        source: std::net::AddrParseError,
    },

    /// The listener could not be bound.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        /// Address tried.
        addr: SocketAddr,
        /// I/O error.
        #[source]
        source: io::Error,
    },

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A route could not be registered.
    #[error("route registration failed: {0}")]
    Route(#[from] InsertError),

    /// The token verifier could not be built from `auth`.
    #[error("token verifier: {0}")]
    Token(#[from] TokenError),

    /// An extension hook failed.
    #[error("extension '{name}' failed during {phase}: {source}")]
    Extension {
        /// Extension name.
        name: String,
        /// Lifecycle phase.
        phase: Phase,
        /// Hook error.
        #[source]
        source: ExtensionError,
    },

    /// A route lifecycle hook failed.
    #[error("route {path} failed during {phase}: {source}")]
    RouteHook {
        /// Route path.
        path: String,
        /// Lifecycle phase.
        phase: Phase,
        /// Hook error.
        #[source]
        source: ExtensionError,
    },
}

/// Result alias for server operations.
pub type ServerResult<T = ()> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::Extension {
            name: "masking".into(),
            phase: Phase::Init,
            source: ExtensionError::hook("no key"),
        };
        assert_eq!(err.to_string(), "extension 'masking' failed during init: no key");

        let err = ServerError::RouteHook {
            path: "/a".into(),
            phase: Phase::Configure,
            source: ExtensionError::hook("x"),
        };
        assert!(err.to_string().starts_with("route /a failed during configure"));
    }
}

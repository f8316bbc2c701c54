//! Route registration errors.

use http::Method;
use thiserror::Error;

/// A route pattern that could not be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    /// The method is already registered for an equivalent pattern.
    #[error("duplicate route {method} {path}")]
    Duplicate {
        /// Method.
        method: Method,
        /// Pattern as written.
        path: String,
    },

    /// A capture at this position already uses a different name.
    #[error("capture in {path} conflicts with existing segment {existing}")]
    ParamConflict {
        /// Pattern as written.
        path: String,
        /// Segment registered first.
        existing: String,
    },

    /// A `*rest` segment was followed by more segments.
    #[error("wildcard must be the last segment in {0}")]
    WildcardNotLast(String),

    /// A capture without a name (`:` or `{}`).
    #[error("unnamed capture in {0}")]
    EmptyName(String),
}

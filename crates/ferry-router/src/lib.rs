//! Radix tree path router for Ferry.
//!
//! Routes map `(method, pattern)` to an arbitrary value; the server stores
//! an index into its route table. Patterns support:
//!
//! - static segments (`/widget`)
//! - named captures in either spelling (`/widget/:id`, `/widget/{id}`)
//! - a trailing catch-all (`/files/*path`)
//!
//! ```text
//!                (root)
//!                  │
//!          ┌───────┴───────┐
//!      "widget"         "files"
//!          │               │
//!       ":id"           "*path"
//!   [GET, POST]          [GET]
//! ```

mod error;
mod method_router;
mod node;
mod params;
mod router;

pub use error::InsertError;
pub use method_router::MethodRouter;
pub use node::{Node, SegmentKind};
pub use params::Params;
pub use router::{Lookup, Router};

/// A matched route value and the captures collected on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a, T> {
    /// Registered value.
    pub value: &'a T,
    /// Captured path parameters.
    pub params: Params,
}

impl<'a, T> RouteMatch<'a, T> {
    /// Creates a route match.
    #[must_use]
    pub fn new(value: &'a T, params: Params) -> Self {
        Self { value, params }
    }
}

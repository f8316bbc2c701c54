//! High-level router API.

use http::Method;

use crate::error::InsertError;
use crate::node::Node;
use crate::params::Params;
use crate::RouteMatch;

/// Outcome of a lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup<'a, T> {
    /// Path and method matched.
    Found(RouteMatch<'a, T>),
    /// The path matched but not for this method; carries the `Allow` value.
    MethodNotAllowed(String),
    /// Nothing matched the path.
    NotFound,
}

/// Radix tree router mapping `(method, path)` to a value.
///
/// Patterns accept `:name` and `{name}` captures and a trailing `*rest`
/// wildcard. Lookups prefer static segments over captures and captures over
/// wildcards, regardless of insertion order.
///
/// ```rust
/// use ferry_router::{Lookup, Router};
/// use http::Method;
///
/// let mut router = Router::new();
/// router.insert(Method::POST, "/widget/:id", 0_usize).unwrap();
///
/// match router.at(&Method::POST, "/widget/42") {
///     Lookup::Found(m) => {
///         assert_eq!(*m.value, 0);
///         assert_eq!(m.params.get("id"), Some("42"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Router<T> {
    root: Node<T>,
    route_count: usize,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Router<T> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            route_count: 0,
        }
    }

    /// Registers `value` for `method` at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InsertError`] on malformed or conflicting patterns.
    pub fn insert(&mut self, method: Method, path: &str, value: T) -> Result<(), InsertError> {
        self.root.insert(method, path, value)?;
        self.route_count += 1;
        Ok(())
    }

    /// Looks up a request.
    #[must_use]
    pub fn at(&self, method: &Method, path: &str) -> Lookup<'_, T> {
        let Some((methods, params)) = self.root.match_path(path) else {
            return Lookup::NotFound;
        };
        match methods.get(method) {
            Some(value) => Lookup::Found(RouteMatch::new(value, params)),
            None => Lookup::MethodNotAllowed(methods.allow_header()),
        }
    }

    /// Matches the path alone, ignoring the method.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&crate::MethodRouter<T>, Params)> {
        self.root.match_path(path)
    }

    /// Returns the number of `(method, pattern)` registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.route_count
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route_count == 0
    }
}

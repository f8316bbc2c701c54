//! Per-path method table.

use http::Method;
use smallvec::SmallVec;

/// Maps HTTP methods to route values for a single path.
///
/// Registration order is preserved, so [`MethodRouter::allow_header`] lists
/// methods the way they were added.
///
/// ```rust
/// use ferry_router::MethodRouter;
/// use http::Method;
///
/// let mut methods = MethodRouter::new();
/// methods.insert(Method::GET, 0_usize).unwrap();
/// methods.insert(Method::POST, 1).unwrap();
///
/// assert_eq!(methods.get(&Method::POST), Some(&1));
/// assert_eq!(methods.get(&Method::DELETE), None);
/// assert_eq!(methods.allow_header(), "GET, POST");
/// ```
#[derive(Debug, Clone)]
pub struct MethodRouter<T> {
    entries: SmallVec<[(Method, T); 4]>,
}

impl<T> Default for MethodRouter<T> {
    fn default() -> Self {
        Self {
            entries: SmallVec::new(),
        }
    }
}

impl<T> MethodRouter<T> {
    /// Creates an empty method table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` for `method`.
    ///
    /// # Errors
    ///
    /// Hands `value` back if the method is already registered.
    pub fn insert(&mut self, method: Method, value: T) -> Result<(), T> {
        if self.contains(&method) {
            return Err(value);
        }
        self.entries.push((method, value));
        Ok(())
    }

    /// Returns the value registered for `method`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<&T> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, v)| v)
    }

    /// Returns true if `method` is registered.
    #[must_use]
    pub fn contains(&self, method: &Method) -> bool {
        self.entries.iter().any(|(m, _)| m == method)
    }

    /// Returns true if no method is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the registered methods in registration order.
    #[must_use]
    pub fn allowed_methods(&self) -> Vec<Method> {
        self.entries.iter().map(|(m, _)| m.clone()).collect()
    }

    /// Formats the registered methods as an `Allow` header value.
    #[must_use]
    pub fn allow_header(&self) -> String {
        self.entries
            .iter()
            .map(|(m, _)| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

//! Radix tree node.
//!
//! Each node owns one path segment. Static children are kept sorted for
//! binary search; a node has at most one parameter child and at most one
//! trailing wildcard.

use http::Method;

use crate::error::InsertError;
use crate::method_router::MethodRouter;
use crate::params::Params;

/// Kind of path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal segment (`widget`).
    Static,
    /// Named capture (`:id` or `{id}`).
    Param(String),
    /// Capture of the remaining path (`*rest`).
    Wildcard(String),
}

impl SegmentKind {
    /// Classifies a single path segment.
    #[must_use]
    pub fn of(segment: &str) -> Self {
        if let Some(name) = segment.strip_prefix(':') {
            Self::Param(name.to_string())
        } else if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Self::Param(name.to_string())
        } else if let Some(name) = segment.strip_prefix('*') {
            Self::Wildcard(name.to_string())
        } else {
            Self::Static
        }
    }
}

/// A node in the radix tree.
#[derive(Debug, Clone)]
pub struct Node<T> {
    /// Segment text as written in the pattern.
    pub segment: String,

    /// Segment kind.
    pub kind: SegmentKind,

    /// Method table when a pattern ends here.
    pub methods: Option<MethodRouter<T>>,

    static_children: Vec<Node<T>>,
    param_child: Option<Box<Node<T>>>,
    wildcard_child: Option<Box<Node<T>>>,
}

impl<T> Node<T> {
    fn new(segment: &str, kind: SegmentKind) -> Self {
        Self {
            segment: segment.to_string(),
            kind,
            methods: None,
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    /// Creates the root node.
    #[must_use]
    pub fn root() -> Self {
        Self::new("", SegmentKind::Static)
    }

    /// Inserts `value` for `method` at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InsertError`] when the pattern is malformed or conflicts
    /// with an existing registration.
    pub fn insert(&mut self, method: Method, path: &str, value: T) -> Result<(), InsertError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let target = self.descend(path, &segments)?;
        let methods = target.methods.get_or_insert_with(MethodRouter::new);
        methods
            .insert(method.clone(), value)
            .map_err(|_| InsertError::Duplicate {
                method,
                path: path.to_string(),
            })
    }

    fn descend(&mut self, path: &str, segments: &[&str]) -> Result<&mut Self, InsertError> {
        let Some((&segment, remaining)) = segments.split_first() else {
            return Ok(self);
        };

        match SegmentKind::of(segment) {
            SegmentKind::Static => {
                let idx = match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(idx) => idx,
                    Err(idx) => {
                        self.static_children
                            .insert(idx, Self::new(segment, SegmentKind::Static));
                        idx
                    }
                };
                self.static_children[idx].descend(path, remaining)
            }
            SegmentKind::Param(name) => {
                if name.is_empty() {
                    return Err(InsertError::EmptyName(path.to_string()));
                }
                let child = self
                    .param_child
                    .get_or_insert_with(|| Box::new(Self::new(segment, SegmentKind::Param(name.clone()))));
                if child.kind != SegmentKind::Param(name.clone()) {
                    return Err(InsertError::ParamConflict {
                        path: path.to_string(),
                        existing: child.segment.clone(),
                    });
                }
                child.descend(path, remaining)
            }
            SegmentKind::Wildcard(name) => {
                if !remaining.is_empty() {
                    return Err(InsertError::WildcardNotLast(path.to_string()));
                }
                let child = self.wildcard_child.get_or_insert_with(|| {
                    Box::new(Self::new(segment, SegmentKind::Wildcard(name.clone())))
                });
                if child.kind != SegmentKind::Wildcard(name) {
                    return Err(InsertError::ParamConflict {
                        path: path.to_string(),
                        existing: child.segment.clone(),
                    });
                }
                Ok(&mut **child)
            }
        }
    }

    /// Matches a concrete request path.
    ///
    /// Static segments win over captures, captures win over wildcards.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodRouter<T>, Params)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut params = Params::new();
        let methods = self.match_segments(&segments, &mut params)?;
        Some((methods, params))
    }

    fn match_segments(&self, segments: &[&str], params: &mut Params) -> Option<&MethodRouter<T>> {
        let Some((&segment, remaining)) = segments.split_first() else {
            return self.methods.as_ref().or_else(|| {
                // `/files/*rest` also matches `/files`
                let wildcard = self.wildcard_child.as_ref()?;
                if let SegmentKind::Wildcard(name) = &wildcard.kind {
                    params.push(name.clone(), "");
                }
                wildcard.methods.as_ref()
            });
        };

        if let Ok(idx) = self
            .static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
        {
            if let Some(found) = self.static_children[idx].match_segments(remaining, params) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            if let SegmentKind::Param(name) = &child.kind {
                let mark = params.len();
                params.push(name.clone(), segment);
                if let Some(found) = child.match_segments(remaining, params) {
                    return Some(found);
                }
                params.truncate(mark);
            }
        }

        let child = self.wildcard_child.as_ref()?;
        if let SegmentKind::Wildcard(name) = &child.kind {
            params.push(name.clone(), segments.join("/"));
        }
        child.methods.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(routes: &[&str]) -> Node<usize> {
        let mut root = Node::root();
        for (i, path) in routes.iter().enumerate() {
            root.insert(Method::GET, path, i).unwrap();
        }
        root
    }

    fn hit(root: &Node<usize>, path: &str) -> Option<(usize, Params)> {
        root.match_path(path)
            .and_then(|(m, p)| m.get(&Method::GET).map(|v| (*v, p)))
    }

    #[test]
    fn test_segment_kind_of() {
        assert_eq!(SegmentKind::of("widget"), SegmentKind::Static);
        assert_eq!(SegmentKind::of(":id"), SegmentKind::Param("id".into()));
        assert_eq!(SegmentKind::of("{id}"), SegmentKind::Param("id".into()));
        assert_eq!(SegmentKind::of("*rest"), SegmentKind::Wildcard("rest".into()));
    }

    #[test]
    fn test_colon_and_brace_params() {
        let root = tree(&["/widget/:id", "/gadget/{id}/parts"]);

        let (idx, params) = hit(&root, "/widget/42").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(params.get("id"), Some("42"));

        let (idx, params) = hit(&root, "/gadget/7/parts").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(params.get("id"), Some("7"));
    }

    #[test]
    fn test_static_beats_param() {
        let root = tree(&["/users/:id", "/users/me"]);
        assert_eq!(hit(&root, "/users/me").unwrap().0, 1);
        assert_eq!(hit(&root, "/users/9").unwrap().0, 0);
    }

    #[test]
    fn test_backtracking_drops_stale_params() {
        let root = tree(&["/a/:x/b", "/a/*rest"]);

        let (idx, params) = hit(&root, "/a/1/c").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(params.get("x"), None);
        assert_eq!(params.get("rest"), Some("1/c"));
    }

    #[test]
    fn test_wildcard_captures_remaining() {
        let root = tree(&["/files/*path"]);
        let (_, params) = hit(&root, "/files/images/logo.png").unwrap();
        assert_eq!(params.get("path"), Some("images/logo.png"));

        let (_, params) = hit(&root, "/files").unwrap();
        assert_eq!(params.get("path"), None);
    }

    #[test]
    fn test_wildcard_must_be_last() {
        let mut root: Node<()> = Node::root();
        let err = root.insert(Method::GET, "/files/*path/meta", ()).unwrap_err();
        assert!(matches!(err, InsertError::WildcardNotLast(_)));
    }

    #[test]
    fn test_conflicting_param_names() {
        let mut root: Node<()> = Node::root();
        root.insert(Method::GET, "/items/:id", ()).unwrap();
        let err = root.insert(Method::GET, "/items/:name/tags", ()).unwrap_err();
        assert!(matches!(err, InsertError::ParamConflict { .. }));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut root: Node<()> = Node::root();
        root.insert(Method::POST, "/widget", ()).unwrap();
        let err = root.insert(Method::POST, "/widget/", ()).unwrap_err();
        assert!(matches!(err, InsertError::Duplicate { .. }));
    }

    #[test]
    fn test_no_match() {
        let root = tree(&["/users"]);
        assert!(hit(&root, "/posts").is_none());
        assert!(hit(&root, "/users/1").is_none());
    }
}

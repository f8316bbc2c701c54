//! Decoded form bodies.
//!
//! Urlencoded and multipart bodies are decoded once per request and stored
//! on the [`RequestContext`](crate::RequestContext).

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

/// A file received as one multipart part.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field name.
    pub field: String,
    /// Client supplied file name.
    pub file_name: Option<String>,
    /// Declared content type of the part.
    pub content_type: Option<String>,
    /// Part contents.
    pub data: Bytes,
}

impl UploadedFile {
    /// Size of the contents in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the part was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// Audit records include the input's Debug output; keep file contents out of it.
impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Text values and files from a form body.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    values: Vec<(String, String)>,
    files: HashMap<String, Vec<UploadedFile>>,
}

impl FormData {
    /// Creates an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text value.
    pub fn push_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.push((name.into(), value.into()));
    }

    /// Adds a file part.
    pub fn push_file(&mut self, file: UploadedFile) {
        self.files.entry(file.field.clone()).or_default().push(file);
    }

    /// First text value for `name`.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every text value for `name`, in body order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Files uploaded under `name`.
    #[must_use]
    pub fn files(&self, name: &str) -> &[UploadedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns true if the form carried neither values nor files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.files.is_empty()
    }
}

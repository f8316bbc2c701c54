//! Field descriptions and the traits the derive builds on.
//!
//! `#[derive(Bind)]` emits a [`FieldSpec`] per visible field and index-based
//! accessors returning [`FieldRef`]s. Everything the extractor knows about a
//! field's Rust type comes through [`FieldType`] (static facts) and
//! [`FieldValue`] (operations on a live value).

use std::any::Any;
use std::sync::Arc;

use ferry_core::{FieldErrors, UploadedFile};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::plan::{Plan, PlanCache};

/// What a field coerces into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `bool`
    Bool,
    /// Signed integers.
    Int,
    /// Unsigned integers.
    Uint,
    /// `f32` / `f64`
    Float,
    /// `String`
    Text,
    /// `Vec<u8>` / `Bytes`
    Bytes,
    /// `std::time::Duration` / `chrono::TimeDelta`
    Duration,
    /// `chrono::DateTime<Utc>`, terminal even though it is structured.
    Timestamp,
    /// A nested `Bind` record.
    Record,
    /// A single uploaded file.
    Upload,
    /// Every file uploaded under one name.
    Uploads,
    /// `Vec<T>` of scalars, filled from array claims.
    List,
    /// Decoded with serde: JSON/XML bodies and `serde_json::Value` claims.
    Opaque,
}

impl ValueKind {
    /// True for upload fields, which are bound from multipart parts.
    pub const fn is_upload(self) -> bool {
        matches!(self, Self::Upload | Self::Uploads)
    }
}

/// How a `post` field consumes the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PostMode {
    /// Deserialize JSON into the field.
    Json,
    /// Deserialize XML into the field.
    Xml,
    /// Copy the body bytes.
    Raw,
}

/// A declarative validation rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// Field must not be zero.
    Required,
    /// Text must look like an email address.
    Email,
    /// Text must be an absolute http(s) URL.
    Url,
    /// Numeric lower bound.
    Min(f64),
    /// Numeric upper bound.
    Max(f64),
    /// Minimum length in characters or elements.
    MinLen(usize),
    /// Maximum length in characters or elements.
    MaxLen(usize),
}

impl Rule {
    /// Name used as the error code.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Email => "email",
            Self::Url => "url",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::MinLen(_) => "min_len",
            Self::MaxLen(_) => "max_len",
        }
    }
}

/// Builds (or fetches) the plan of a nested record through a given cache.
pub type ChildPlan = fn(&PlanCache) -> Arc<Plan>;

/// Child plan builder used by the derive for nested records.
pub fn child_plan<T: Bind>(cache: &PlanCache) -> Arc<Plan> {
    cache.get::<T>()
}

/// Static description of one field, produced by `#[derive(Bind)]`.
///
/// Source names are already resolved: an annotation without a value holds
/// the field's own name.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Rust field name.
    pub name: &'static str,
    /// Path parameter name.
    pub path: Option<&'static str>,
    /// Query key.
    pub query: Option<&'static str>,
    /// Form field name, also used for uploads.
    pub form: Option<&'static str>,
    /// Body mode.
    pub post: Option<PostMode>,
    /// Token claim key.
    pub claims: Option<&'static str>,
    /// Cookie name.
    pub cookie: Option<&'static str>,
    /// Header name.
    pub header: Option<&'static str>,
    /// Regex the raw value must match.
    pub pattern: Option<&'static str>,
    /// Default applied to zero values.
    pub default: Option<&'static str>,
    /// Validation rules.
    pub rules: &'static [Rule],
    /// Free-form `tag(key = "value")` metadata.
    pub tags: &'static [(&'static str, &'static str)],
    /// Coercion target.
    pub kind: ValueKind,
    /// `Option<T>` field.
    pub pointer: bool,
    /// Plan builder for nested records.
    pub child: Option<ChildPlan>,
}

impl FieldSpec {
    /// A spec with no sources, rules or tags.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            path: None,
            query: None,
            form: None,
            post: None,
            claims: None,
            cookie: None,
            header: None,
            pattern: None,
            default: None,
            rules: &[],
            tags: &[],
            kind: ValueKind::Opaque,
            pointer: false,
            child: None,
        }
    }

    /// Returns the value of tag `key`.
    pub fn tag(&self, key: &str) -> Option<&'static str> {
        self.tags.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    }

    /// The default annotation, with `"-"` meaning none.
    pub fn default_value(&self) -> Option<&'static str> {
        self.default.filter(|d| *d != "-")
    }

    /// True if the field reads the request body as JSON or XML.
    pub fn decodes_body(&self) -> bool {
        matches!(self.post, Some(PostMode::Json | PostMode::Xml))
    }
}

// Child builders are compared through the plans they produce.
impl PartialEq for FieldSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.path == other.path
            && self.query == other.query
            && self.form == other.form
            && self.post == other.post
            && self.claims == other.claims
            && self.cookie == other.cookie
            && self.header == other.header
            && self.pattern == other.pattern
            && self.default == other.default
            && self.rules == other.rules
            && self.tags == other.tags
            && self.kind == other.kind
            && self.pointer == other.pointer
            && self.child.is_some() == other.child.is_some()
    }
}

/// Static facts about a field type.
pub trait FieldType {
    /// Coercion target.
    const KIND: ValueKind;
    /// True for `Option<T>`.
    const POINTER: bool = false;
    /// Set for nested records only.
    const CHILD: Option<ChildPlan> = None;
}

/// Operations the extractor, defaults pass and validator perform on a field.
pub trait FieldValue: Send + Sync {
    /// Parses `raw` into the field. Returns false and leaves the field
    /// untouched when the text does not parse.
    fn coerce(&mut self, raw: &str) -> bool;

    /// Stores a decoded token claim. Scalars go through [`FieldValue::coerce`]
    /// in their JSON spelling; arrays and objects are refused unless the
    /// field type overrides this. Returns false and leaves the field
    /// untouched on mismatch.
    fn set_claim(&mut self, value: &Value) -> bool {
        match value {
            Value::String(s) => self.coerce(s),
            Value::Number(n) => self.coerce(&n.to_string()),
            Value::Bool(b) => self.coerce(if *b { "true" } else { "false" }),
            Value::Null | Value::Array(_) | Value::Object(_) => false,
        }
    }

    /// True when the field holds its type's zero value.
    fn is_zero(&self) -> bool;

    /// Nested record view.
    fn as_record(&self) -> Option<&dyn Record> {
        None
    }

    /// Mutable nested record view.
    fn as_record_mut(&mut self) -> Option<&mut dyn Record> {
        None
    }

    /// Stores uploaded files. Returns false for non-upload fields.
    fn set_uploads(&mut self, _files: &[UploadedFile]) -> bool {
        false
    }

    /// Stores a raw body. Returns false for fields that cannot hold bytes.
    fn set_bytes(&mut self, _bytes: &[u8]) -> bool {
        false
    }

    /// Numeric view for `min` / `max`.
    fn as_f64(&self) -> Option<f64> {
        None
    }

    /// Length for `min_len` / `max_len`: characters for text, elements
    /// for collections.
    fn len_hint(&self) -> Option<usize> {
        None
    }

    /// Text view for `email` / `url`.
    fn as_text(&self) -> Option<&str> {
        None
    }

    /// Downcasting hook for extensions walking populated records.
    fn as_any(&self) -> &dyn Any;
}

/// Mutable access to one field, as handed to the extractor.
pub enum FieldRef<'a> {
    /// A field coerced from text.
    Value(&'a mut dyn FieldValue),
    /// A field deserialized from the body.
    Decode(&'a mut dyn DecodeTarget),
}

/// A field the request body is deserialized into.
pub trait DecodeTarget {
    /// Replaces the field with the JSON document in `body`.
    fn decode_json(&mut self, body: &[u8]) -> Result<(), serde_json::Error>;

    /// Replaces the field with the XML document in `body`.
    fn decode_xml(&mut self, body: &[u8]) -> Result<(), quick_xml::DeError>;
}

impl<T: DeserializeOwned> DecodeTarget for T {
    fn decode_json(&mut self, body: &[u8]) -> Result<(), serde_json::Error> {
        *self = serde_json::from_slice(body)?;
        Ok(())
    }

    fn decode_xml(&mut self, body: &[u8]) -> Result<(), quick_xml::DeError> {
        *self = quick_xml::de::from_reader(body)?;
        Ok(())
    }
}

/// A struct the extractor can populate. Implemented by `#[derive(Bind)]`.
///
/// Field indices follow the order of [`Bind::describe`].
pub trait Bind: Send + Sync + 'static {
    /// One spec per visible field, in declaration order.
    fn describe() -> Vec<FieldSpec>
    where
        Self: Sized;

    /// Mutable access to field `index`.
    fn field_mut(&mut self, index: usize) -> Option<FieldRef<'_>>;

    /// Read access to field `index`. `None` for decoded body fields.
    fn field(&self, index: usize) -> Option<&dyn FieldValue>;

    /// Struct-level check run after the field rules.
    fn check(&self, _errors: &mut FieldErrors) {}
}

/// Object-safe view of a [`Bind`] value.
pub trait Record: Send + Sync {
    /// See [`Bind::field_mut`].
    fn record_field_mut(&mut self, index: usize) -> Option<FieldRef<'_>>;

    /// See [`Bind::field`].
    fn record_field(&self, index: usize) -> Option<&dyn FieldValue>;

    /// See [`Bind::check`].
    fn record_check(&self, errors: &mut FieldErrors);
}

impl<T: Bind> Record for T {
    fn record_field_mut(&mut self, index: usize) -> Option<FieldRef<'_>> {
        self.field_mut(index)
    }

    fn record_field(&self, index: usize) -> Option<&dyn FieldValue> {
        self.field(index)
    }

    fn record_check(&self, errors: &mut FieldErrors) {
        self.check(errors);
    }
}

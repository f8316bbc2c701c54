//! Error taxonomy for handlers and the request pipeline.
//!
//! Every failure a handler, hook or extractor can produce is funnelled into
//! [`Failure`], a tagged union the renderers dispatch on:
//!
//! | Variant | Produced by | Rendered as |
//! |---|---|---|
//! | [`Failure::Coded`] | [`CodeError`] | `{"error":{"code","msg","child"}}`, status override |
//! | [`Failure::Render`] | [`Redirect`] or any [`RenderSelf`] | writes its own response |
//! | [`Failure::Plain`] | any other error | generic message, route error status |

use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error used by plain failures.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An error that knows how to write its own response.
///
/// Self-rendering failures bypass content negotiation entirely.
pub trait RenderSelf: StdError + Send + Sync + 'static {
    /// Writes status, headers and body onto `response`.
    fn render(&self, response: &mut Response<Bytes>);
}

/// Any failure a handler or hook may return.
#[derive(Debug)]
pub enum Failure {
    /// Structured error with a programmatic code.
    Coded(CodeError),
    /// Error that renders itself.
    Render(Box<dyn RenderSelf>),
    /// Anything else.
    Plain(BoxError),
}

impl Failure {
    /// Wraps an arbitrary error as a plain failure.
    pub fn plain(error: impl Into<BoxError>) -> Self {
        Self::Plain(error.into())
    }

    /// Wraps a self-rendering error.
    pub fn render(error: impl RenderSelf) -> Self {
        Self::Render(Box::new(error))
    }

    /// Returns the coded error, if this is one.
    #[must_use]
    pub const fn as_coded(&self) -> Option<&CodeError> {
        match self {
            Self::Coded(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the self-rendering error, if this is one.
    #[must_use]
    pub fn as_render(&self) -> Option<&dyn RenderSelf> {
        match self {
            Self::Render(r) => Some(r.as_ref()),
            _ => None,
        }
    }

    /// Status override carried by a coded error.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.as_coded().and_then(|e| e.status)
    }

    /// Programmatic code, when there is one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.as_coded()
            .map(|e| e.code.as_str())
            .filter(|c| !c.is_empty())
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coded(e) => fmt::Display::fmt(e, f),
            Self::Render(e) => fmt::Display::fmt(e, f),
            Self::Plain(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Coded(e) => e.source(),
            Self::Render(e) => e.source(),
            Self::Plain(e) => e.source(),
        }
    }
}

impl From<CodeError> for Failure {
    fn from(e: CodeError) -> Self {
        Self::Coded(e)
    }
}

impl From<Redirect> for Failure {
    fn from(r: Redirect) -> Self {
        Self::Render(Box::new(r))
    }
}

impl From<FieldErrors> for Failure {
    fn from(e: FieldErrors) -> Self {
        Self::Coded(e.into())
    }
}

impl From<anyhow::Error> for Failure {
    fn from(e: anyhow::Error) -> Self {
        Self::Plain(e.into())
    }
}

impl From<std::io::Error> for Failure {
    fn from(e: std::io::Error) -> Self {
        Self::Plain(Box::new(e))
    }
}

impl From<String> for Failure {
    fn from(msg: String) -> Self {
        Self::Plain(msg.into())
    }
}

impl From<&str> for Failure {
    fn from(msg: &str) -> Self {
        Self::Plain(msg.into())
    }
}

impl From<Infallible> for Failure {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}

/// Structured error with a programmatic code.
///
/// Serializes as `{"code","msg","child"}`, omitting empty members. The status
/// and the underlying source are never serialized.
///
/// ```
/// use ferry_core::CodeError;
/// use http::StatusCode;
///
/// let err = CodeError::new("FORBIDDEN", "no").with_status(StatusCode::FORBIDDEN);
/// assert_eq!(err.to_string(), "[FORBIDDEN] no");
/// assert_eq!(serde_json::to_string(&err).unwrap(), r#"{"code":"FORBIDDEN","msg":"no"}"#);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeError {
    /// Response status override.
    #[serde(skip)]
    pub status: Option<StatusCode>,

    /// Machine-readable code.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,

    /// Human-readable message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub msg: String,

    #[serde(skip)]
    source: Option<Arc<dyn StdError + Send + Sync>>,

    /// Nested errors, e.g. one per failed field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child: Vec<CodeError>,
}

impl CodeError {
    /// Creates a coded error without a status override.
    #[must_use]
    pub fn new(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            msg: msg.into(),
            ..Self::default()
        }
    }

    /// `UNAUTHORIZED`, 401.
    #[must_use]
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", msg).with_status(StatusCode::UNAUTHORIZED)
    }

    /// `FORBIDDEN`, 403.
    #[must_use]
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", msg).with_status(StatusCode::FORBIDDEN)
    }

    /// `NOT_FOUND`, 404.
    #[must_use]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", msg).with_status(StatusCode::NOT_FOUND)
    }

    /// `CONFLICT`, 409.
    #[must_use]
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new("CONFLICT", msg).with_status(StatusCode::CONFLICT)
    }

    /// `INTERNAL_ERROR`, 500.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", msg).with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Sets the response status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches the underlying cause. It is logged, never rendered.
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Appends a nested error.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.child.push(child);
        self
    }
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.msg)
    }
}

impl StdError for CodeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Redirect instruction a handler can return as its error.
///
/// ```
/// use ferry_core::{Failure, Redirect};
///
/// let failure: Failure = Redirect::to("/login").into();
/// assert!(failure.as_render().is_some());
/// ```
#[derive(Debug, Clone, Error)]
#[error("redirect to {location}")]
pub struct Redirect {
    /// Redirect status, `302 Found` unless changed.
    pub status: StatusCode,
    /// Target location.
    pub location: String,
}

impl Redirect {
    /// `302 Found` to `location`.
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            location: location.into(),
        }
    }

    /// `303 See Other` to `location`.
    #[must_use]
    pub fn see_other(location: impl Into<String>) -> Self {
        Self::to(location).with_status(StatusCode::SEE_OTHER)
    }

    /// `308 Permanent Redirect` to `location`.
    #[must_use]
    pub fn permanent(location: impl Into<String>) -> Self {
        Self::to(location).with_status(StatusCode::PERMANENT_REDIRECT)
    }

    /// Overrides the status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl RenderSelf for Redirect {
    fn render(&self, response: &mut Response<Bytes>) {
        *response.status_mut() = self.status;
        *response.body_mut() = Bytes::new();
        match HeaderValue::from_str(&self.location) {
            Ok(location) => {
                response.headers_mut().insert(header::LOCATION, location);
            }
            Err(_) => {
                tracing::error!(location = %self.location, "redirect location is not a valid header value");
            }
        }
    }
}

/// One failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name as declared on the input type.
    pub field: String,
    /// Rule that failed (`required`, `email`, `min_len`, ...).
    pub rule: String,
    /// Reason, phrased to follow the field name.
    pub message: String,
}

/// Field-specific validation errors, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{} field validation error(s)", .fields.len())]
pub struct FieldErrors {
    /// Failed rules.
    pub fields: Vec<FieldError>,
}

impl FieldErrors {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed rule.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.fields.push(FieldError {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
        });
    }

    /// Returns `true` if nothing failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of failed rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns the collected errors if any rule failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<FieldErrors> for CodeError {
    fn from(errors: FieldErrors) -> Self {
        let child = errors
            .fields
            .iter()
            .map(|e| Self::new(e.rule.clone(), format!("{} {}", e.field, e.message)))
            .collect();
        Self {
            child,
            ..Self::new("VALIDATION_ERROR", "validation failed").with_source(errors)
        }
    }
}

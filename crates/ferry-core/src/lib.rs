//! # Ferry Core
//!
//! Types shared by every Ferry crate:
//!
//! - [`RequestContext`] - per-request state with memoised identity, claims,
//!   request id, client ip, session id and form body
//! - [`Failure`] - the tagged union every handler or hook error becomes
//! - [`CodeError`] / [`Redirect`] - coded and self-rendering errors
//! - [`FieldErrors`] - declarative validation results
//! - [`Identity`] / [`TokenVerifier`] - bearer token verification
//! - [`FormData`] / [`UploadedFile`] - decoded form bodies

#![doc(html_root_url = "https://docs.rs/ferry-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod form;
mod identity;

pub use context::{
    RequestContext, RequestContextBuilder, DEBUG_USER_QUERY, FORWARDED_FOR_HEADER,
    REQUEST_ID_HEADER,
};
pub use error::{BoxError, CodeError, Failure, FieldError, FieldErrors, Redirect, RenderSelf};
pub use form::{FormData, UploadedFile};
pub use identity::{Claims, Identity, TokenError, TokenVerifier, VerifiedToken};

//! Response type and builders shared by the pipeline and the server.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};

/// Response produced by a route. The body is fully buffered.
pub type Response = http::Response<Bytes>;

/// A boxed future, as returned by routes and extension request hooks.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// `Content-Type` for JSON routes.
pub const JSON: &str = "application/json";

/// `Content-Type` for HTML routes.
pub const HTML: &str = "text/html; charset=utf-8";

/// Shorthands for building responses.
pub trait ResponseExt {
    /// An empty response with `status`.
    fn empty(status: StatusCode) -> Response;

    /// A `text/plain` response.
    fn text(status: StatusCode, message: &str) -> Response;

    /// A JSON response from already serialized bytes.
    fn json(status: StatusCode, body: impl Into<Bytes>) -> Response;

    /// Sets `Content-Type` unless one is already present.
    fn default_content_type(&mut self, content_type: &'static str);
}

impl ResponseExt for Response {
    fn empty(status: StatusCode) -> Response {
        let mut response = Response::new(Bytes::new());
        *response.status_mut() = status;
        response
    }

    fn text(status: StatusCode, message: &str) -> Response {
        let mut response = Response::new(Bytes::from(message.to_string()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    }

    fn json(status: StatusCode, body: impl Into<Bytes>) -> Response {
        let mut response = Response::new(body.into());
        *response.status_mut() = status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON));
        response
    }

    fn default_content_type(&mut self, content_type: &'static str) {
        self.headers_mut()
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(content_type));
    }
}

//! Content negotiation: renderers keyed by a route's declared content type.
//!
//! The table ships with two renderers. [`JsonRenderer`] wraps outputs in
//! `{"data":…}` and errors in `{"error":…}` unless the route opts out.
//! [`HtmlRenderer`] writes text verbatim, applies the route template to
//! structured outputs and answers errors with a redirect to the configured
//! error path.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use ferry_core::{Failure, RequestContext};
use http::{header, HeaderValue, StatusCode};
use serde::Serialize;

use crate::option::{render_template, HandlerOption};
use crate::payload::{Payload, Verbatim};
use crate::types::{Response, ResponseExt, HTML, JSON};

/// Writes outputs and errors for one content type.
pub trait Renderer: Send + Sync + 'static {
    /// Writes a successful output.
    fn render_output(
        &self,
        ctx: &RequestContext,
        option: &HandlerOption,
        payload: &Payload,
        response: &mut Response,
    );

    /// Writes an error.
    fn render_error(
        &self,
        ctx: &RequestContext,
        option: &HandlerOption,
        failure: &Failure,
        response: &mut Response,
    );
}

#[derive(Serialize)]
struct Message<'a> {
    msg: &'a str,
}

#[derive(Serialize)]
struct ErrorEnvelope<T> {
    error: T,
}

fn wrap(key: &str, json: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(json.len() + key.len() + 5);
    buf.put_slice(b"{\"");
    buf.put_slice(key.as_bytes());
    buf.put_slice(b"\":");
    buf.put_slice(json);
    buf.put_u8(b'}');
    buf.freeze()
}

fn error_body(failure: &Failure, unwrapped: bool) -> Result<Vec<u8>, serde_json::Error> {
    match (failure.as_coded(), unwrapped) {
        (Some(coded), true) => serde_json::to_vec(coded),
        (Some(coded), false) => serde_json::to_vec(&ErrorEnvelope { error: coded }),
        (None, unwrapped) => {
            let text = failure.to_string();
            let msg = Message { msg: &text };
            if unwrapped {
                serde_json::to_vec(&msg)
            } else {
                serde_json::to_vec(&ErrorEnvelope { error: msg })
            }
        }
    }
}

/// JSON renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render_output(
        &self,
        _ctx: &RequestContext,
        option: &HandlerOption,
        payload: &Payload,
        response: &mut Response,
    ) {
        *response.status_mut() = option.response_status_code();
        *response.body_mut() = if option.is_unwrapped() {
            payload.json().clone()
        } else {
            wrap("data", payload.json())
        };
        response.default_content_type(JSON);
    }

    fn render_error(
        &self,
        _ctx: &RequestContext,
        option: &HandlerOption,
        failure: &Failure,
        response: &mut Response,
    ) {
        if let Some(render) = failure.as_render() {
            render.render(response);
            return;
        }

        *response.status_mut() = failure.status().unwrap_or(option.error_status_code());
        match error_body(failure, option.is_unwrapped()) {
            Ok(body) => *response.body_mut() = Bytes::from(body),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize error body");
                *response.body_mut() = Bytes::new();
            }
        }
        response.default_content_type(JSON);
    }
}

/// HTML renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    fn redirect(ctx: &RequestContext, status: StatusCode, code: Option<&str>, response: &mut Response) {
        let mut location = ctx.config().routing.error_path.clone();
        if let Some(code) = code {
            location.push_str(code);
        }

        *response.status_mut() = status;
        *response.body_mut() = Bytes::new();
        match HeaderValue::from_str(&location) {
            Ok(value) => {
                response.headers_mut().insert(header::LOCATION, value);
            }
            Err(_) => tracing::error!(location = %location, "error path is not a valid header value"),
        }
    }
}

impl Renderer for HtmlRenderer {
    fn render_output(
        &self,
        ctx: &RequestContext,
        option: &HandlerOption,
        payload: &Payload,
        response: &mut Response,
    ) {
        *response.status_mut() = option.response_status_code();
        response.default_content_type(HTML);

        if let Some(verbatim) = payload.verbatim() {
            *response.body_mut() = match verbatim {
                Verbatim::Bytes(bytes) => bytes.clone(),
                Verbatim::Text(text) => Bytes::from(text.clone()),
            };
            return;
        }

        let value: serde_json::Value = match serde_json::from_slice(payload.json()) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, "output is not valid JSON");
                Self::redirect(ctx, option.error_status_code(), None, response);
                return;
            }
        };

        match option.template() {
            Some(Ok(env)) => match render_template(env, &value) {
                Ok(html) => *response.body_mut() = Bytes::from(html),
                Err(err) => {
                    tracing::error!(path = option.path(), error = %err, "template rendering failed");
                    Self::redirect(ctx, option.error_status_code(), None, response);
                }
            },
            Some(Err(err)) => {
                tracing::error!(path = option.path(), error = err, "template does not parse");
                Self::redirect(ctx, option.error_status_code(), None, response);
            }
            None => {
                *response.body_mut() = match value {
                    serde_json::Value::String(text) => Bytes::from(text),
                    _ => payload.json().clone(),
                };
            }
        }
    }

    fn render_error(
        &self,
        ctx: &RequestContext,
        option: &HandlerOption,
        failure: &Failure,
        response: &mut Response,
    ) {
        if let Some(render) = failure.as_render() {
            render.render(response);
            return;
        }

        let status = failure.status().unwrap_or(option.redirect_status_code());
        Self::redirect(ctx, status, failure.code(), response);
    }
}

/// Renderers keyed by lowercase media type essence.
#[derive(Clone)]
pub struct ContentNegotiation {
    renderers: HashMap<String, Arc<dyn Renderer>>,
    html: Arc<dyn Renderer>,
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

impl ContentNegotiation {
    /// A table with no entries besides the HTML fallback.
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
            html: Arc::new(HtmlRenderer),
        }
    }

    /// Registers `renderer` for `content_type`, replacing any previous one.
    /// Parameters such as `charset` are ignored.
    pub fn insert(&mut self, content_type: &str, renderer: impl Renderer) {
        self.renderers.insert(essence(content_type), Arc::new(renderer));
    }

    /// Renderer registered for `content_type`.
    pub fn get(&self, content_type: &str) -> Option<&Arc<dyn Renderer>> {
        self.renderers.get(&essence(content_type))
    }

    /// Renderer for a route, falling back to HTML when the route declares
    /// no content type or one without a renderer.
    pub fn resolve(&self, content_type: Option<&str>) -> &Arc<dyn Renderer> {
        content_type
            .and_then(|ct| self.get(ct))
            .unwrap_or(&self.html)
    }

    /// Registered content types.
    pub fn content_types(&self) -> Vec<&str> {
        let mut types: Vec<_> = self.renderers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl Default for ContentNegotiation {
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert(JSON, JsonRenderer);
        table.insert(HTML, HtmlRenderer);
        table
    }
}

impl fmt::Debug for ContentNegotiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentNegotiation")
            .field("content_types", &self.content_types())
            .finish_non_exhaustive()
    }
}

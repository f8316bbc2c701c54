//! Per-request context.
//!
//! A [`RequestContext`] wraps one inbound request together with values that
//! are derived from it on demand: the request id, client ip, caller identity,
//! token claims, session id and the decoded form body. Each is resolved at
//! most once and then memoised for the rest of the call.
//!
//! The context is cheap to clone and is never shared between requests. A
//! sub-invocation gets its own copy through [`RequestContext::sub_context`].

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use bytes::Bytes;
use ferry_config::FerryConfig;
use ferry_router::Params;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use uuid::Uuid;

use crate::form::FormData;
use crate::identity::{Claims, Identity, TokenVerifier, VerifiedToken};

/// Query parameter that names the caller when `system.debug` is on.
pub const DEBUG_USER_QUERY: &str = ".user";

/// Header carrying a proxy supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Header carrying the proxy chain of client addresses.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Clone)]
struct Inner {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: Params,
    peer: Option<SocketAddr>,
    config: Arc<FerryConfig>,
    verifier: Option<Arc<TokenVerifier>>,
    caller: Option<String>,
    started_at: Instant,

    request_id: OnceLock<String>,
    client_ip: OnceLock<String>,
    session_id: OnceLock<String>,
    query: OnceLock<Vec<(String, String)>>,
    cookies: OnceLock<HashMap<String, String>>,
    token: OnceLock<Option<VerifiedToken>>,
    identity: OnceLock<Option<Identity>>,
    claims: OnceLock<Claims>,
    form: OnceLock<FormData>,
    input: OnceLock<String>,
}

/// Per-request context handed to extractors, hooks and handlers.
///
/// ```
/// use ferry_core::RequestContext;
/// use http::Uri;
///
/// let ctx = RequestContext::builder()
///     .uri(Uri::from_static("/widget/42?color=red"))
///     .build();
///
/// assert_eq!(ctx.query("color"), Some("red"));
/// assert_eq!(ctx.request_id(), ctx.request_id());
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

impl RequestContext {
    /// Starts building a context.
    #[must_use]
    pub fn builder() -> RequestContextBuilder {
        RequestContextBuilder::default()
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    /// Returns the request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.inner.uri
    }

    /// Returns the path portion of the URI.
    #[must_use]
    pub fn path(&self) -> &str {
        self.inner.uri.path()
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// Returns a header value if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the `Content-Type` header.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw request body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.inner.body
    }

    /// Returns the captured path parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.inner.params
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &FerryConfig {
        &self.inner.config
    }

    /// Returns the route path of the calling handler for sub-invocations.
    #[must_use]
    pub fn caller(&self) -> Option<&str> {
        self.inner.caller.as_deref()
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// Returns the first query value for `key`.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_pairs()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every decoded query pair in order.
    #[must_use]
    pub fn query_pairs(&self) -> &[(String, String)] {
        self.inner.query.get_or_init(|| {
            self.inner
                .uri
                .query()
                .and_then(|q| serde_urlencoded::from_str(q).ok())
                .unwrap_or_default()
        })
    }

    /// Returns the cookie named `name`.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.inner
            .cookies
            .get_or_init(|| parse_cookies(&self.inner.headers))
            .get(name)
            .map(String::as_str)
    }

    /// Request id: a trusted `X-Request-ID`, otherwise a fresh UUID v7.
    #[must_use]
    pub fn request_id(&self) -> &str {
        self.inner.request_id.get_or_init(|| {
            if self.inner.config.trusted_proxy.trust_x_request_id {
                if let Some(id) = self.header(REQUEST_ID_HEADER).map(str::trim) {
                    if !id.is_empty() {
                        return id.to_string();
                    }
                }
            }
            Uuid::now_v7().to_string()
        })
    }

    /// Client ip: the first trusted `X-Forwarded-For` hop, otherwise the
    /// peer address, otherwise `unknown`.
    #[must_use]
    pub fn client_ip(&self) -> &str {
        self.inner.client_ip.get_or_init(|| {
            if self.inner.config.trusted_proxy.trust_x_forwarded_for {
                let first = self
                    .header(FORWARDED_FOR_HEADER)
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
                    .filter(|v| !v.is_empty());
                if let Some(ip) = first {
                    return ip.to_string();
                }
            }
            self.inner
                .peer
                .map_or_else(|| "unknown".to_string(), |p| p.ip().to_string())
        })
    }

    /// Session id from a verified guest cookie, otherwise a fresh UUID.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.inner.session_id.get_or_init(|| {
            let auth = &self.inner.config.auth;
            auth.guest_cookie
                .as_ref()
                .and_then(|cookie| {
                    let token = self.cookie(&cookie.name)?;
                    self.verify(token, cookie.audience.as_deref())
                })
                .map_or_else(|| Uuid::now_v7().to_string(), |t| t.identity.id)
        })
    }

    /// Resolved caller, if any.
    ///
    /// Resolution order: the debug `.user` query parameter (only with
    /// `system.debug`), then the verified bearer token (access token query
    /// key, `Authorization: Bearer`, login cookie).
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.inner
            .identity
            .get_or_init(|| {
                if self.inner.config.system.debug {
                    if let Some(user) = self.query(DEBUG_USER_QUERY).filter(|u| !u.is_empty()) {
                        return Some(Identity::new(user));
                    }
                }
                self.token().map(|t| t.identity.clone())
            })
            .as_ref()
    }

    /// Claims of the verified caller token.
    #[must_use]
    pub fn claims(&self) -> &Claims {
        self.inner.claims.get_or_init(|| {
            self.token()
                .map(|t| Claims::from_map(&t.claims))
                .unwrap_or_default()
        })
    }

    fn token(&self) -> Option<&VerifiedToken> {
        self.inner
            .token
            .get_or_init(|| {
                let auth = &self.inner.config.auth;
                let audience = auth.audience.as_deref();

                let from_query = auth
                    .access_token_query
                    .as_deref()
                    .and_then(|key| self.query(key))
                    .filter(|t| !t.is_empty());
                if let Some(verified) = from_query.and_then(|t| self.verify(t, audience)) {
                    return Some(verified);
                }

                if auth.bearer {
                    let bearer = self
                        .header(header::AUTHORIZATION.as_str())
                        .and_then(|v| v.strip_prefix("Bearer "))
                        .map(str::trim)
                        .filter(|t| !t.is_empty());
                    if let Some(verified) = bearer.and_then(|t| self.verify(t, audience)) {
                        return Some(verified);
                    }
                }

                let cookie = auth.login_cookie.as_ref()?;
                let token = self.cookie(&cookie.name)?;
                self.verify(token, cookie.audience.as_deref())
            })
            .as_ref()
    }

    fn verify(&self, token: &str, audience: Option<&str>) -> Option<VerifiedToken> {
        let verifier = self.inner.verifier.as_ref()?;
        match verifier.verify(token, audience) {
            Ok(verified) => Some(verified),
            Err(e) => {
                tracing::debug!(error = %e, "token verification failed");
                None
            }
        }
    }

    /// Returns a copy of this context acting as `identity`.
    ///
    /// Values already memoised on this context are carried over.
    #[must_use]
    pub fn assume_user(&self, identity: Identity) -> Self {
        let mut inner = (*self.inner).clone();
        inner.identity = OnceLock::from(Some(identity));
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns a copy of this context for a call made from route `caller`.
    #[must_use]
    pub fn sub_context(&self, caller: impl Into<String>) -> Self {
        let mut inner = (*self.inner).clone();
        inner.caller = Some(caller.into());
        inner.input = OnceLock::new();
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Returns the decoded form body, if it was loaded.
    #[must_use]
    pub fn form(&self) -> Option<&FormData> {
        self.inner.form.get()
    }

    /// Stores the decoded form body. The first stored value wins.
    pub fn set_form(&self, form: FormData) -> &FormData {
        self.inner.form.get_or_init(|| form)
    }

    /// Records the populated input for audit logging. The first record wins;
    /// returns `false` when an earlier record was kept.
    pub fn record_input(&self, input: String) -> bool {
        match self.inner.input.set(input) {
            Ok(()) => true,
            Err(_) => {
                tracing::debug!(
                    request_id = %self.request_id(),
                    "input already recorded; keeping the first record"
                );
                false
            }
        }
    }

    /// Returns the recorded input.
    #[must_use]
    pub fn input(&self) -> Option<&str> {
        self.inner.input.get().map(String::as_str)
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug, Default)]
pub struct RequestContextBuilder {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: Params,
    peer: Option<SocketAddr>,
    config: Option<Arc<FerryConfig>>,
    verifier: Option<Arc<TokenVerifier>>,
}

impl RequestContextBuilder {
    /// Takes method, URI, headers and body from `request`.
    #[must_use]
    pub fn request(mut self, request: Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        self.method = parts.method;
        self.uri = parts.uri;
        self.headers = parts.headers;
        self.body = body;
        self
    }

    /// Sets the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the URI.
    #[must_use]
    pub fn uri(mut self, uri: Uri) -> Self {
        self.uri = uri;
        self
    }

    /// Appends a header. Invalid names or values are skipped.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the captured path parameters.
    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Sets the peer address.
    #[must_use]
    pub fn peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn config(mut self, config: Arc<FerryConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the token verifier.
    #[must_use]
    pub fn verifier(mut self, verifier: Option<Arc<TokenVerifier>>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Builds the context.
    #[must_use]
    pub fn build(self) -> RequestContext {
        RequestContext {
            inner: Arc::new(Inner {
                method: self.method,
                uri: self.uri,
                headers: self.headers,
                body: self.body,
                params: self.params,
                peer: self.peer,
                config: self.config.unwrap_or_default(),
                verifier: self.verifier,
                caller: None,
                started_at: Instant::now(),
                request_id: OnceLock::new(),
                client_ip: OnceLock::new(),
                session_id: OnceLock::new(),
                query: OnceLock::new(),
                cookies: OnceLock::new(),
                token: OnceLock::new(),
                identity: OnceLock::new(),
                claims: OnceLock::new(),
                form: OnceLock::new(),
                input: OnceLock::new(),
            }),
        }
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                cookies
                    .entry(name.trim().to_string())
                    .or_insert_with(|| value.trim().trim_matches('"').to_string());
            }
        }
    }
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_config::{AuthConfig, SystemConfig, TokenCookieConfig, TrustedProxyConfig};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "ctx-secret";

    fn sign(claims: &serde_json::Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn auth_config() -> Arc<FerryConfig> {
        Arc::new(FerryConfig {
            auth: AuthConfig {
                secret: Some(SECRET.into()),
                access_token_query: Some("access_token".into()),
                login_cookie: Some(TokenCookieConfig {
                    name: "login".into(),
                    audience: Some("login".into()),
                }),
                guest_cookie: Some(TokenCookieConfig {
                    name: "guest".into(),
                    audience: Some("guest".into()),
                }),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn with_auth() -> RequestContextBuilder {
        let config = auth_config();
        let verifier = TokenVerifier::from_config(&config.auth).unwrap().map(Arc::new);
        RequestContext::builder().config(config).verifier(verifier)
    }

    #[test]
    fn test_query_and_cookies() {
        let ctx = RequestContext::builder()
            .uri(Uri::from_static("/w?name=a%20b&tag=1&tag=2"))
            .header("cookie", "theme=dark; session=\"abc\"")
            .build();

        assert_eq!(ctx.query("name"), Some("a b"));
        assert_eq!(ctx.query("tag"), Some("1"));
        assert_eq!(ctx.query_pairs().len(), 3);
        assert_eq!(ctx.cookie("theme"), Some("dark"));
        assert_eq!(ctx.cookie("session"), Some("abc"));
        assert_eq!(ctx.cookie("missing"), None);
    }

    #[test]
    fn test_request_id_memoised() {
        let ctx = RequestContext::builder()
            .header("x-request-id", "from-proxy")
            .build();

        let id = ctx.request_id().to_string();
        assert_ne!(id, "from-proxy");
        assert_eq!(ctx.request_id(), id);
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn test_trusted_proxy_headers() {
        let config = Arc::new(FerryConfig {
            trusted_proxy: TrustedProxyConfig {
                trust_x_forwarded_for: true,
                trust_x_request_id: true,
            },
            ..Default::default()
        });
        let ctx = RequestContext::builder()
            .config(config)
            .header("x-request-id", "from-proxy")
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .peer("10.0.0.1:5000".parse().unwrap())
            .build();

        assert_eq!(ctx.request_id(), "from-proxy");
        assert_eq!(ctx.client_ip(), "203.0.113.9");
    }

    #[test]
    fn test_client_ip_fallbacks() {
        let ctx = RequestContext::builder()
            .header("x-forwarded-for", "203.0.113.9")
            .peer("192.0.2.4:443".parse().unwrap())
            .build();
        assert_eq!(ctx.client_ip(), "192.0.2.4");

        assert_eq!(RequestContext::builder().build().client_ip(), "unknown");
    }

    #[test]
    fn test_identity_from_bearer() {
        let token = sign(&json!({"sub": "u-7", "name": "Grace", "tier": 2, "exp": 4_102_444_800_u64}));
        let ctx = with_auth()
            .header("authorization", &format!("Bearer {token}"))
            .build();

        let identity = ctx.identity().unwrap();
        assert_eq!(identity.id, "u-7");
        assert_eq!(identity.name.as_deref(), Some("Grace"));
        assert_eq!(ctx.claims().get("tier"), Some(&json!(2)));
        assert_eq!(ctx.claims().text("tier"), Some("2"));
    }

    #[test]
    fn test_identity_from_access_token_query() {
        let token = sign(&json!({"sub": "u-8", "exp": 4_102_444_800_u64}));
        let uri: Uri = format!("/x?access_token={token}").parse().unwrap();
        let ctx = with_auth().uri(uri).build();

        assert_eq!(ctx.identity().map(|i| i.id.as_str()), Some("u-8"));
    }

    #[test]
    fn test_login_cookie_requires_audience() {
        let wrong = sign(&json!({"sub": "u-9", "aud": "guest", "exp": 4_102_444_800_u64}));
        let ctx = with_auth().header("cookie", &format!("login={wrong}")).build();
        assert!(ctx.identity().is_none());
        assert!(ctx.claims().is_empty());

        let right = sign(&json!({"sub": "u-9", "aud": "login", "exp": 4_102_444_800_u64}));
        let ctx = with_auth().header("cookie", &format!("login={right}")).build();
        assert_eq!(ctx.identity().map(|i| i.id.as_str()), Some("u-9"));
    }

    #[test]
    fn test_invalid_bearer_is_anonymous() {
        let ctx = with_auth().header("authorization", "Bearer not-a-token").build();
        assert!(ctx.identity().is_none());
    }

    #[test]
    fn test_debug_user_override() {
        let config = Arc::new(FerryConfig {
            system: SystemConfig {
                debug: true,
                ..Default::default()
            },
            ..Default::default()
        });
        let ctx = RequestContext::builder()
            .config(config)
            .uri(Uri::from_static("/x?.user=tester"))
            .build();
        assert_eq!(ctx.identity().map(|i| i.id.as_str()), Some("tester"));

        let ctx = RequestContext::builder()
            .uri(Uri::from_static("/x?.user=tester"))
            .build();
        assert!(ctx.identity().is_none());
    }

    #[test]
    fn test_session_id_from_guest_cookie() {
        let guest = sign(&json!({"sub": "sess-1", "aud": "guest", "exp": 4_102_444_800_u64}));
        let ctx = with_auth().header("cookie", &format!("guest={guest}")).build();
        assert_eq!(ctx.session_id(), "sess-1");

        let ctx = with_auth().build();
        let fresh = ctx.session_id().to_string();
        assert_eq!(fresh.len(), 36);
        assert_eq!(ctx.session_id(), fresh);
    }

    #[test]
    fn test_second_input_record_is_refused() {
        let ctx = RequestContext::builder().build();
        assert!(ctx.record_input("Input { id: 1 }".into()));
        assert!(!ctx.record_input("Input { id: 2 }".into()));
        assert_eq!(ctx.input(), Some("Input { id: 1 }"));
    }

    #[test]
    fn test_assume_user_and_sub_context() {
        let ctx = RequestContext::builder().build();
        let request_id = ctx.request_id().to_string();
        assert!(ctx.record_input("Input { id: 1 }".into()));

        let acting = ctx.assume_user(Identity::new("admin"));
        assert_eq!(acting.identity().map(|i| i.id.as_str()), Some("admin"));
        assert_eq!(acting.request_id(), request_id);
        assert!(ctx.identity().is_none());

        let sub = acting.sub_context("/widget/:id");
        assert_eq!(sub.caller(), Some("/widget/:id"));
        assert_eq!(sub.identity().map(|i| i.id.as_str()), Some("admin"));
        assert!(sub.input().is_none());
    }

    #[test]
    fn test_form_memo_first_wins() {
        let ctx = RequestContext::builder().build();
        assert!(ctx.form().is_none());

        let mut first = FormData::new();
        first.push_value("name", "foo");
        ctx.set_form(first);
        ctx.set_form(FormData::new());

        assert_eq!(ctx.form().and_then(|f| f.value("name")), Some("foo"));
    }
}

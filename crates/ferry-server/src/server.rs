//! HTTP server.
//!
//! A [`Server`] owns the route table, the shared [`Engine`] and the token
//! verifier. [`Server::dispatch`] runs one buffered request through the
//! router and the matched route; [`Server::serve`] drives it from a Hyper
//! accept loop until a [`ShutdownSignal`] fires.
//!
//! # Example
//!
//! ```rust
//! use ferry_core::{Failure, RequestContext};
//! use ferry_extract::Bind;
//! use ferry_pipeline::{HandlerOption, TypedHandler};
//! use ferry_server::Server;
//! use http::{Request, StatusCode};
//!
//! #[derive(Debug, Clone, Default, Bind)]
//! pub struct Ping {
//!     #[bind(query, default = "pong")]
//!     pub reply: String,
//! }
//!
//! let server = Server::builder()
//!     .route(TypedHandler::new(
//!         HandlerOption::api("/ping"),
//!         |_ctx: RequestContext, input: Ping| async move { Ok::<_, Failure>(input.reply) },
//!     ))
//!     .build()
//!     .unwrap();
//!
//! # tokio_test::block_on(async {
//! let request = Request::get("/ping").body(bytes::Bytes::new()).unwrap();
//! let response = server.dispatch(request, None).await;
//! assert_eq!(response.status(), StatusCode::OK);
//! assert_eq!(response.body(), r#"{"data":"pong"}"#);
//! # });
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use ferry_config::FerryConfig;
use ferry_core::{RequestContext, TokenVerifier};
use ferry_pipeline::{
    ContentNegotiation, Engine, Extension, ExtensionRegistryBuilder, Response,
    ResponseExt, Route,
};
use ferry_router::{InsertError, Lookup, Router};
use ferry_telemetry::record_request;
use http::{header, HeaderValue, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use crate::cors;
use crate::error::{ServerError, ServerResult};
use crate::lifecycle;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// What a router entry points at, by index into the route list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Handler(usize),
    Preflight(usize),
}

/// A registered route as listed by [`Server::routes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Mount path.
    pub path: String,
    /// Primary method followed by secondary ones.
    pub methods: Vec<Method>,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Registration priority.
    pub priority: i32,
    /// True when a preflight route is registered too.
    pub cors: bool,
    /// Summary text.
    pub summary: String,
    /// Description text.
    pub description: String,
}

/// The Ferry HTTP server.
pub struct Server {
    engine: Engine,
    routes: Vec<Arc<dyn Route>>,
    router: Router<Endpoint>,
    verifier: Option<Arc<TokenVerifier>>,
    stopped: AtomicBool,
}

impl Server {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Shared engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Server configuration.
    pub fn config(&self) -> &FerryConfig {
        self.engine.config()
    }

    /// Registered routes, sorted by path.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let mut infos: Vec<_> = self
            .routes
            .iter()
            .map(|route| {
                let option = route.option();
                RouteInfo {
                    path: option.path().to_string(),
                    methods: option.methods().cloned().collect(),
                    content_type: option.declared_content_type().map(ToString::to_string),
                    priority: option.priority_value(),
                    cors: option.is_cors(),
                    summary: option.summary_text().to_string(),
                    description: option.description_text().to_string(),
                }
            })
            .collect();
        infos.sort_by(|a, b| a.path.cmp(&b.path));
        infos
    }

    /// Routes one buffered request and runs it.
    ///
    /// Unknown paths answer `404`, known paths with another method `405`
    /// with an `Allow` header.
    pub async fn dispatch(&self, request: Request<Bytes>, peer: Option<SocketAddr>) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let (endpoint, params) = match self.router.at(&method, &path) {
            Lookup::Found(found) => (*found.value, found.params),
            Lookup::MethodNotAllowed(allow) => {
                tracing::debug!(%method, path, allow, "method not allowed");
                let mut response = Response::text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
                if let Ok(allow) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, allow);
                }
                return response;
            }
            Lookup::NotFound => {
                tracing::debug!(%method, path, "no route");
                return Response::text(StatusCode::NOT_FOUND, "not found");
            }
        };

        let route = match endpoint {
            Endpoint::Preflight(index) => {
                return cors::preflight(self.routes[index].option().custom_cors_headers());
            }
            Endpoint::Handler(index) => &self.routes[index],
        };

        let mut builder = RequestContext::builder()
            .request(request)
            .params(params)
            .config(Arc::clone(self.engine.config()))
            .verifier(self.verifier.clone());
        if let Some(peer) = peer {
            builder = builder.peer(peer);
        }
        let ctx = builder.build();

        let span = tracing::info_span!(
            "request",
            request_id = ctx.request_id(),
            http.method = %method,
            http.path = %path,
            http.route = route.option().path(),
            client_ip = ctx.client_ip(),
            http.status_code = tracing::field::Empty,
        );

        let response = route.handle(&ctx, &self.engine).instrument(span.clone()).await;

        let status = response.status().as_u16();
        span.record("http.status_code", status);
        let elapsed = ctx.elapsed();
        span.in_scope(|| {
            tracing::info!(
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "request completed"
            );
        });
        record_request(route.option().path(), status, elapsed);
        response
    }

    /// Binds `server.http_addr` and serves until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Fails on an invalid or unavailable address and when an extension
    /// hook of the serve phase fails.
    pub async fn serve(self, shutdown: ShutdownSignal) -> ServerResult {
        let configured = self.config().server.http_addr.clone();
        let addr: SocketAddr = configured.parse().map_err(|source| ServerError::Address {
            addr: configured.clone(),
            source,
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve_on(listener, shutdown).await
    }

    /// Serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// See [`Server::serve`].
    pub async fn run(self) -> ServerResult {
        self.serve(ShutdownSignal::with_os_signals()).await
    }

    /// Serves on an already bound listener until `shutdown` fires, then
    /// waits for open connections and runs the shutdown hooks.
    ///
    /// # Errors
    ///
    /// Fails when an extension hook of the serve phase fails.
    pub async fn serve_on(self, listener: TcpListener, shutdown: ShutdownSignal) -> ServerResult {
        lifecycle::serve(&self.engine, &self.routes)?;

        let local = listener.local_addr()?;
        tracing::info!(addr = %local, routes = self.routes.len(), "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = Arc::clone(&server);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream, peer, shutdown).await {
                                tracing::debug!(%peer, error = %e, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let timeout = Duration::from_secs(server.config().server.shutdown_timeout_secs);
        tokio::select! {
            () = tracker.wait_for_shutdown() => tracing::info!("all connections closed"),
            () = tokio::time::sleep(timeout) => tracing::warn!(
                active = tracker.active_connections(),
                "shutdown timeout reached with connections still open"
            ),
        }

        server.shutdown();
        tracing::info!("server stopped");
        Ok(())
    }

    /// Runs extension and route shutdown hooks once.
    pub fn shutdown(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            lifecycle::shutdown(&self.engine, &self.routes);
        }
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        peer: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);
        let service = service_fn(move |request: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request, peer).await) }
        });

        if self.config().server.http2_enabled {
            let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(io, service);
            tokio::pin!(conn);
            tokio::select! {
                result = conn.as_mut() => result,
                () = shutdown.recv() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            }
        } else {
            let conn = hyper::server::conn::http1::Builder::new().serve_connection(io, service);
            tokio::pin!(conn);
            tokio::select! {
                result = conn.as_mut() => result.map_err(Into::into),
                () = shutdown.recv() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await.map_err(Into::into)
                }
            }
        }
    }

    async fn handle_request(&self, request: Request<Incoming>, peer: SocketAddr) -> http::Response<Full<Bytes>> {
        let limits = &self.config().server;
        let (parts, body) = request.into_parts();
        let read = tokio::time::timeout(
            Duration::from_millis(limits.request_timeout_ms),
            Limited::new(body, limits.max_body_bytes).collect(),
        )
        .await;

        let response = match read {
            Ok(Ok(collected)) => {
                let request = Request::from_parts(parts, collected.to_bytes());
                self.dispatch(request, Some(peer)).await
            }
            Ok(Err(e)) => {
                if e.is::<http_body_util::LengthLimitError>() {
                    tracing::warn!(limit = limits.max_body_bytes, "request body too large");
                    Response::text(StatusCode::PAYLOAD_TOO_LARGE, "payload too large")
                } else {
                    tracing::debug!(error = %e, "failed to read request body");
                    Response::text(StatusCode::BAD_REQUEST, "failed to read request body")
                }
            }
            Err(_) => {
                tracing::warn!("request body read timed out");
                Response::text(StatusCode::REQUEST_TIMEOUT, "request timeout")
            }
        };
        response.map(Full::new)
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("routes", &self.routes.len())
            .field("extensions", self.engine.registry())
            .finish_non_exhaustive()
    }
}

/// Collects routes, extensions and configuration.
#[derive(Default)]
pub struct ServerBuilder {
    config: Option<Arc<FerryConfig>>,
    routes: Vec<Arc<dyn Route>>,
    extensions: ExtensionRegistryBuilder,
    negotiation: Option<ContentNegotiation>,
}

impl ServerBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration. Defaults apply otherwise.
    #[must_use]
    pub fn config(mut self, config: FerryConfig) -> Self {
        self.config = Some(Arc::new(config));
        self
    }

    /// Adds a route.
    #[must_use]
    pub fn route(mut self, route: impl Route) -> Self {
        self.routes.push(Arc::new(route));
        self
    }

    /// Adds an already shared route.
    #[must_use]
    pub fn route_arc(mut self, route: Arc<dyn Route>) -> Self {
        self.routes.push(route);
        self
    }

    /// Registers an extension. Hooks run in registration order.
    #[must_use]
    pub fn extension(mut self, extension: impl Extension) -> Self {
        self.extensions = self.extensions.register(extension);
        self
    }

    /// Replaces the content negotiation table.
    #[must_use]
    pub fn negotiation(mut self, negotiation: ContentNegotiation) -> Self {
        self.negotiation = Some(negotiation);
        self
    }

    /// Freezes the extension registry, runs the build-phase hooks and
    /// registers routes in ascending priority. Equal priorities keep
    /// insertion order.
    ///
    /// # Errors
    ///
    /// Fails on conflicting routes, an unusable `auth` section or a failing
    /// build-phase hook.
    pub fn build(self) -> ServerResult<Server> {
        let config = self.config.unwrap_or_default();
        let verifier = TokenVerifier::from_config(&config.auth)?.map(Arc::new);

        let mut engine = Engine::new(Arc::clone(&config)).with_extensions(self.extensions.build());
        if let Some(negotiation) = self.negotiation {
            engine = engine.with_negotiation(negotiation);
        }

        let mut routes = self.routes;
        routes.sort_by_key(|route| route.option().priority_value());

        lifecycle::init(&engine, &routes)?;
        let router = register(&routes)?;
        tracing::debug!(
            routes = routes.len(),
            extensions = engine.registry().len(),
            "server built"
        );

        Ok(Server {
            engine,
            routes,
            router,
            verifier,
            stopped: AtomicBool::new(false),
        })
    }
}

fn register(routes: &[Arc<dyn Route>]) -> Result<Router<Endpoint>, InsertError> {
    let mut router = Router::new();
    for (index, route) in routes.iter().enumerate() {
        let option = route.option();
        for method in option.methods() {
            router.insert(method.clone(), option.path(), Endpoint::Handler(index))?;
        }
        if option.is_cors() {
            match router.insert(Method::OPTIONS, option.path(), Endpoint::Preflight(index)) {
                Ok(()) => {}
                Err(InsertError::Duplicate { .. }) => {
                    tracing::debug!(path = option.path(), "preflight already registered");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::trace!(path = option.path(), priority = option.priority_value(), "route registered");
    }
    Ok(router)
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder")
            .field("routes", &self.routes.len())
            .field("extensions", &self.extensions)
            .finish_non_exhaustive()
    }
}

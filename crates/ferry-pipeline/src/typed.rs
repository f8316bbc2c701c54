//! Typed handlers.
//!
//! A [`TypedHandler`] wraps a plain async function `(ctx, input) -> Result`
//! and turns it into a [`Route`]: the input is extracted from the request,
//! hooks run around the call and the outcome is rendered.
//!
//! Per request the steps are, in order:
//!
//! 1. set the declared `Content-Type`
//! 2. copy the pre-computed default input and extract into it
//! 3. run the route pre-hook, then every extension pre-hook; the first
//!    failure skips the rest and the handler
//! 4. record the input on the context for audit
//! 5. call the handler
//! 6. write the audit entry when policy asks for it
//! 7. render: extension hooks first, then the route hook, then the
//!    content negotiation table, falling back to HTML

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use ferry_core::{Failure, RequestContext};
use ferry_extract::{compile, defaulted, each_field, extract, Bind, FieldDescriptor, FieldValue, Plan, Record};
use ferry_telemetry::record_extraction_failure;
use http::{header, HeaderValue, StatusCode};
use serde::Serialize;
use tracing::Instrument;

use crate::audit;
use crate::engine::Engine;
use crate::option::HandlerOption;
use crate::payload::Payload;
use crate::types::{BoxFuture, Response, ResponseExt};

/// Read-only view of a populated input, handed to pre-hooks.
#[derive(Clone, Copy)]
pub struct InputView<'a> {
    value: &'a (dyn Any + Send + Sync),
    record: &'a dyn Record,
    plan: &'a Plan,
}

impl<'a> InputView<'a> {
    /// View over `input`, described by `plan`.
    pub fn new<I: Bind>(input: &'a I, plan: &'a Plan) -> Self {
        Self {
            value: input,
            record: input,
            plan,
        }
    }

    /// The input as its concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&'a T> {
        self.value.downcast_ref()
    }

    /// The input as a record.
    pub fn record(&self) -> &'a dyn Record {
        self.record
    }

    /// The compiled plan of the input type.
    pub fn plan(&self) -> &'a Plan {
        self.plan
    }

    /// Visits every leaf field, nested records included.
    pub fn each_field(&self, visit: &mut dyn FnMut(&FieldDescriptor, &'a dyn FieldValue)) {
        each_field(self.plan, self.record, visit);
    }
}

impl fmt::Debug for InputView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputView")
            .field("type", &self.plan.type_name())
            .finish_non_exhaustive()
    }
}

/// A registered endpoint.
pub trait Route: Send + Sync + 'static {
    /// Route options.
    fn option(&self) -> &HandlerOption;

    /// Runs the pipeline for one request.
    fn handle<'a>(&'a self, ctx: &'a RequestContext, engine: &'a Engine) -> BoxFuture<'a, Response>;
}

type HandlerFn<I, O, E> =
    Arc<dyn Fn(RequestContext, I) -> BoxFuture<'static, Result<O, E>> + Send + Sync>;

/// A route built from a typed async function.
///
/// ```
/// use ferry_core::{Failure, RequestContext};
/// use ferry_extract::Bind;
/// use ferry_pipeline::{HandlerOption, Route, TypedHandler};
///
/// #[derive(Debug, Clone, Default, Bind)]
/// pub struct Hello {
///     #[bind(query, default = "world")]
///     pub name: String,
/// }
///
/// let route = TypedHandler::new(
///     HandlerOption::api("/hello"),
///     |_ctx: RequestContext, input: Hello| async move {
///         Ok::<_, Failure>(format!("hello {}", input.name))
///     },
/// );
///
/// assert_eq!(route.option().path(), "/hello");
/// assert_eq!(route.defaults().name, "world");
/// ```
pub struct TypedHandler<I, O, E = Failure> {
    option: HandlerOption,
    plan: Arc<Plan>,
    defaults: I,
    func: HandlerFn<I, O, E>,
}

impl<I, O, E> TypedHandler<I, O, E>
where
    I: Bind + Clone + Default + fmt::Debug,
    O: Serialize + Send + Sync + 'static,
    E: Into<Failure> + Send + 'static,
{
    /// Wraps `func`. The input plan is compiled and the default input
    /// computed here, once.
    pub fn new<F, Fut>(option: HandlerOption, func: F) -> Self
    where
        F: Fn(RequestContext, I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let plan = compile::<I>();
        let defaults = defaulted::<I>();
        tracing::debug!(
            path = option.path(),
            input = plan.type_name(),
            fields = plan.len(),
            "typed handler created"
        );
        Self {
            option,
            plan,
            defaults,
            func: Arc::new(move |ctx, input| Box::pin(func(ctx, input))),
        }
    }

    /// The default input every request starts from.
    pub fn defaults(&self) -> &I {
        &self.defaults
    }

    /// The input plan.
    pub fn plan(&self) -> &Arc<Plan> {
        &self.plan
    }

    /// Calls the function directly from another route, skipping
    /// extraction, hooks and rendering. The context is copied and tagged
    /// with the calling path.
    pub async fn call(&self, ctx: &RequestContext, input: I) -> Result<O, E> {
        let sub = ctx.sub_context(ctx.path());
        let span = tracing::info_span!(
            "call",
            route = self.option.path(),
            caller = sub.caller().unwrap_or_default()
        );
        (self.func)(sub, input).instrument(span).await
    }

    async fn run(&self, ctx: &RequestContext, engine: &Engine) -> Result<Payload, Failure> {
        let mut input = self.defaults.clone();
        if let Err(err) = extract(ctx, &self.plan, &mut input, &engine.settings()).await {
            record_extraction_failure(self.option.path());
            tracing::debug!(path = self.option.path(), error = %err, "input extraction failed");
            return Err(err.into());
        }

        let hooks = self.pre_hooks(ctx, engine, &input).await;
        ctx.record_input(format!("{input:?}"));
        hooks?;

        let output = (self.func)(ctx.clone(), input).await.map_err(Into::into)?;
        Payload::new(output).map_err(Failure::plain)
    }

    async fn pre_hooks(&self, ctx: &RequestContext, engine: &Engine, input: &I) -> Result<(), Failure> {
        let view = InputView::new(input, &self.plan);
        if let Some(hook) = self.option.request_hook() {
            hook(ctx, &view)?;
        }
        for ext in engine.extensions() {
            ext.on_request(ctx, &self.option, &view).await?;
        }
        Ok(())
    }

    fn render_failure(&self, ctx: &RequestContext, engine: &Engine, failure: &Failure, response: &mut Response) {
        for ext in engine.extensions() {
            if ext.on_error(ctx, &self.option, failure, response) {
                return;
            }
        }
        if let Some(hook) = self.option.error_hook() {
            hook(ctx, failure, response);
            return;
        }
        if let Some(render) = failure.as_render() {
            render.render(response);
            return;
        }
        engine
            .negotiation()
            .resolve(self.option.declared_content_type())
            .render_error(ctx, &self.option, failure, response);
    }

    fn render_output(&self, ctx: &RequestContext, engine: &Engine, payload: &Payload, response: &mut Response) {
        for ext in engine.extensions() {
            if ext.on_response(ctx, &self.option, payload, response) {
                return;
            }
        }
        if let Some(hook) = self.option.response_hook() {
            hook(ctx, payload, response);
            return;
        }
        engine
            .negotiation()
            .resolve(self.option.declared_content_type())
            .render_output(ctx, &self.option, payload, response);
    }
}

impl<I, O, E> Route for TypedHandler<I, O, E>
where
    I: Bind + Clone + Default + fmt::Debug,
    O: Serialize + Send + Sync + 'static,
    E: Into<Failure> + Send + 'static,
{
    fn option(&self) -> &HandlerOption {
        &self.option
    }

    fn handle<'a>(&'a self, ctx: &'a RequestContext, engine: &'a Engine) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let mut response = Response::empty(StatusCode::OK);
            if let Some(content_type) = self.option.declared_content_type() {
                match HeaderValue::from_str(content_type) {
                    Ok(value) => {
                        response.headers_mut().insert(header::CONTENT_TYPE, value);
                    }
                    Err(_) => tracing::warn!(content_type, "declared content type is not a valid header value"),
                }
            }

            let outcome = self.run(ctx, engine).await;

            if audit::should_audit(ctx, &self.option) {
                audit::record_outcome(ctx, &self.option, outcome.as_ref());
            }

            match &outcome {
                Ok(payload) => self.render_output(ctx, engine, payload, &mut response),
                Err(failure) => {
                    tracing::debug!(path = self.option.path(), error = %failure, "handler failed");
                    self.render_failure(ctx, engine, failure, &mut response);
                }
            }
            response
        })
    }
}

impl<I: fmt::Debug, O, E> fmt::Debug for TypedHandler<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedHandler")
            .field("option", &self.option)
            .field("input", &self.plan.type_name())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::CodeError;
    use http::Uri;

    #[derive(Debug, Clone, Default, Bind)]
    pub struct Greet {
        #[bind(query, default = "world")]
        pub name: String,
        #[bind(query, max = 3)]
        pub times: u32,
    }

    fn greet_route(option: HandlerOption) -> TypedHandler<Greet, String> {
        TypedHandler::new(option, |_ctx: RequestContext, input: Greet| async move {
            Ok::<_, Failure>(input.name.repeat(input.times.max(1) as usize))
        })
    }

    fn request(uri: &'static str) -> RequestContext {
        RequestContext::builder().uri(Uri::from_static(uri)).build()
    }

    #[tokio::test]
    async fn test_defaults_fill_missing_inputs() {
        let route = greet_route(HandlerOption::api("/greet"));
        let engine = Engine::default();

        let response = route.handle(&request("/greet"), &engine).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body(), r#"{"data":"world"}"#);

        let response = route.handle(&request("/greet?name=ab&times=2"), &engine).await;
        assert_eq!(response.body(), r#"{"data":"abab"}"#);
    }

    #[tokio::test]
    async fn test_validation_failure_renders_coded_error() {
        let route = greet_route(HandlerOption::api("/greet"));
        let response = route.handle(&request("/greet?times=9"), &Engine::default()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body["error"]["child"][0]["msg"]
            .as_str()
            .unwrap()
            .contains("times"));
    }

    #[tokio::test]
    async fn test_input_is_recorded_before_handler() {
        let route = TypedHandler::new(
            HandlerOption::api("/greet"),
            |ctx: RequestContext, _input: Greet| async move {
                let seen = ctx.input().map(ToString::to_string);
                Ok::<_, Failure>(seen.unwrap_or_default())
            },
        );
        let response = route.handle(&request("/greet?name=zed"), &Engine::default()).await;
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body["data"].as_str().unwrap().contains("zed"));
    }

    #[tokio::test]
    async fn test_route_pre_hook_short_circuits() {
        let option = HandlerOption::api("/greet").on_request(|_ctx, input| {
            let greet = input.downcast_ref::<Greet>().ok_or("wrong input")?;
            if greet.name == "mallory" {
                return Err(CodeError::forbidden("blocked").into());
            }
            Ok(())
        });
        let route = TypedHandler::new(option, |_ctx: RequestContext, _input: Greet| async move {
            Ok::<_, Failure>("called")
        });

        let response = route.handle(&request("/greet?name=mallory"), &Engine::default()).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = route.handle(&request("/greet?name=alice"), &Engine::default()).await;
        assert_eq!(response.body(), r#"{"data":"called"}"#);
    }

    #[tokio::test]
    async fn test_sub_invocation_tags_caller() {
        let inner = TypedHandler::new(
            HandlerOption::new("/inner"),
            |ctx: RequestContext, input: Greet| async move {
                Ok::<_, Failure>(format!("{}:{}", ctx.caller().unwrap_or("-"), input.name))
            },
        );

        let ctx = request("/outer?x=1");
        let out = inner
            .call(
                &ctx,
                Greet {
                    name: "n".into(),
                    times: 0,
                },
            )
            .await
            .unwrap();
        assert_eq!(out, "/outer:n");
        assert!(ctx.caller().is_none());
    }
}

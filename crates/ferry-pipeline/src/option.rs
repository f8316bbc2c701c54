//! Per-route options.
//!
//! A [`HandlerOption`] describes one route: where it is mounted, how its
//! output and errors are rendered, which hooks run around the handler, and
//! a type-indexed side-table where extensions keep route-scoped settings.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use ferry_core::{Failure, RequestContext};
use ferry_extract::{apply_defaults, compile, Bind};
use http::{Method, StatusCode};
use minijinja::Environment;
use parking_lot::RwLock;

use crate::engine::Engine;
use crate::extension::ExtensionError;
use crate::payload::Payload;
use crate::typed::InputView;
use crate::types::{Response, HTML, JSON};

/// Route pre-hook, run after extraction and before extension pre-hooks.
pub type RequestHook =
    Arc<dyn Fn(&RequestContext, &InputView<'_>) -> Result<(), Failure> + Send + Sync>;

/// Route response hook, replaces content negotiation for outputs.
pub type ResponseHook = Arc<dyn Fn(&RequestContext, &Payload, &mut Response) + Send + Sync>;

/// Route error hook, replaces content negotiation for errors.
pub type ErrorHook = Arc<dyn Fn(&RequestContext, &Failure, &mut Response) + Send + Sync>;

/// Route lifecycle hook.
pub type LifecycleHook = Arc<dyn Fn(&Engine) -> Result<(), ExtensionError> + Send + Sync>;

const TEMPLATE_NAME: &str = "route";

/// One side-table value as seen by an extension.
#[derive(Debug)]
pub struct ExtEntry<T> {
    /// The stored value.
    pub value: Arc<T>,
    /// True when the route author supplied it with
    /// [`HandlerOption::with_ext`], false when it was defaulted on access.
    pub user_set: bool,
}

impl<T> Clone for ExtEntry<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            user_set: self.user_set,
        }
    }
}

#[derive(Clone)]
struct ExtSlot {
    value: Arc<dyn Any + Send + Sync>,
    user_set: bool,
}

/// Type-indexed map holding at most one value per type.
///
/// Entries are added on first access and never removed.
#[derive(Default)]
pub struct ExtensionMap {
    slots: RwLock<HashMap<TypeId, ExtSlot>>,
}

impl ExtensionMap {
    /// Stores `value` as explicitly set, after applying its default
    /// annotations.
    pub fn insert<T: Bind>(&self, mut value: T) {
        apply_defaults(&compile::<T>(), &mut value);
        self.slots.write().insert(
            TypeId::of::<T>(),
            ExtSlot {
                value: Arc::new(value),
                user_set: true,
            },
        );
    }

    /// Returns the entry for `T`, default-constructing it on first access.
    pub fn get<T: Bind + Default>(&self) -> ExtEntry<T> {
        let id = TypeId::of::<T>();
        if let Some(entry) = self.slots.read().get(&id).and_then(downcast_slot) {
            return entry;
        }

        let mut slots = self.slots.write();
        let slot = slots.entry(id).or_insert_with(|| {
            tracing::trace!(ext = type_name::<T>(), "defaulting route extension value");
            let mut value = T::default();
            apply_defaults(&compile::<T>(), &mut value);
            ExtSlot {
                value: Arc::new(value),
                user_set: false,
            }
        });
        downcast_slot(slot).unwrap_or_else(|| ExtEntry {
            value: Arc::new(T::default()),
            user_set: false,
        })
    }

    /// True if a value for `T` has been stored or defaulted.
    pub fn contains<T: Any>(&self) -> bool {
        self.slots.read().contains_key(&TypeId::of::<T>())
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// True if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

fn downcast_slot<T: Any + Send + Sync>(slot: &ExtSlot) -> Option<ExtEntry<T>> {
    Arc::clone(&slot.value)
        .downcast::<T>()
        .ok()
        .map(|value| ExtEntry {
            value,
            user_set: slot.user_set,
        })
}

impl fmt::Debug for ExtensionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionMap")
            .field("len", &self.len())
            .finish()
    }
}

/// Options for one route.
///
/// ```
/// use ferry_pipeline::{HandlerOption, JSON};
/// use http::{Method, StatusCode};
///
/// let option = HandlerOption::new("/widget/:id")
///     .method(Method::POST)
///     .content_type(JSON)
///     .error_status(StatusCode::UNPROCESSABLE_ENTITY)
///     .cors();
///
/// assert_eq!(option.path(), "/widget/:id");
/// assert_eq!(option.response_status_code(), StatusCode::OK);
/// assert_eq!(option.redirect_status_code(), StatusCode::FOUND);
/// ```
pub struct HandlerOption {
    path: String,
    priority: i32,
    method: Method,
    sub_methods: Vec<Method>,
    content_type: Option<String>,
    cors: bool,
    cors_headers: Option<Vec<(String, String)>>,
    response_status: StatusCode,
    error_status: StatusCode,
    redirect_status: StatusCode,
    no_wrap_json: bool,
    html_template: Option<String>,
    auto_audit: bool,
    audit_message: Option<String>,
    summary: String,
    description: String,
    on_request: Option<RequestHook>,
    on_response: Option<ResponseHook>,
    on_error: Option<ErrorHook>,
    on_init: Option<LifecycleHook>,
    on_shutdown: Option<LifecycleHook>,
    exts: ExtensionMap,
    parsed_template: OnceLock<Result<Environment<'static>, String>>,
}

impl HandlerOption {
    /// A `GET` route at `path` answering 200, 400 on error and 302 on
    /// redirects.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            priority: 0,
            method: Method::GET,
            sub_methods: Vec::new(),
            content_type: None,
            cors: false,
            cors_headers: None,
            response_status: StatusCode::OK,
            error_status: StatusCode::BAD_REQUEST,
            redirect_status: StatusCode::FOUND,
            no_wrap_json: false,
            html_template: None,
            auto_audit: false,
            audit_message: None,
            summary: String::new(),
            description: String::new(),
            on_request: None,
            on_response: None,
            on_error: None,
            on_init: None,
            on_shutdown: None,
            exts: ExtensionMap::default(),
            parsed_template: OnceLock::new(),
        }
    }

    /// A JSON API route answering `GET` and `POST`.
    pub fn api(path: impl Into<String>) -> Self {
        Self::new(path).sub_method(Method::POST).content_type(JSON)
    }

    /// An HTML route answering `GET` and `POST`.
    pub fn ui(path: impl Into<String>) -> Self {
        Self::new(path).sub_method(Method::POST).content_type(HTML)
    }

    /// Sets the primary method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a secondary method served by the same handler.
    pub fn sub_method(mut self, method: Method) -> Self {
        self.sub_methods.push(method);
        self
    }

    /// Registration priority; lower values register first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Declared response content type, also the content negotiation key.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Answers CORS preflight requests with the default header set.
    pub fn cors(mut self) -> Self {
        self.cors = true;
        self
    }

    /// Answers CORS preflight requests with exactly `headers`.
    pub fn cors_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.cors = true;
        self.cors_headers = Some(
            headers
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Status for successful responses.
    pub fn response_status(mut self, status: StatusCode) -> Self {
        self.response_status = status;
        self
    }

    /// Status for error responses without an override of their own.
    pub fn error_status(mut self, status: StatusCode) -> Self {
        self.error_status = status;
        self
    }

    /// Status for HTML error redirects.
    pub fn redirect_status(mut self, status: StatusCode) -> Self {
        self.redirect_status = status;
        self
    }

    /// Writes JSON outputs and errors without the `data` / `error` envelope.
    pub fn no_wrap_json(mut self) -> Self {
        self.no_wrap_json = true;
        self
    }

    /// Inline template the HTML renderer applies to structured outputs.
    pub fn html_template(mut self, template: impl Into<String>) -> Self {
        self.html_template = Some(template.into());
        self.parsed_template = OnceLock::new();
        self
    }

    /// Audits every call of this route, optionally under `message`.
    pub fn auto_audit(mut self, message: Option<&str>) -> Self {
        self.auto_audit = true;
        self.audit_message = message.map(ToString::to_string);
        self
    }

    /// One-line summary for route listings.
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Longer description for route listings.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the route pre-hook.
    pub fn on_request<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &InputView<'_>) -> Result<(), Failure> + Send + Sync + 'static,
    {
        self.on_request = Some(Arc::new(hook));
        self
    }

    /// Sets the route response hook.
    pub fn on_response<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &Payload, &mut Response) + Send + Sync + 'static,
    {
        self.on_response = Some(Arc::new(hook));
        self
    }

    /// Sets the route error hook.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RequestContext, &Failure, &mut Response) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Runs when the server is built, after extension init hooks.
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Engine) -> Result<(), ExtensionError> + Send + Sync + 'static,
    {
        self.on_init = Some(Arc::new(hook));
        self
    }

    /// Runs at shutdown, after extension shutdown hooks.
    pub fn on_shutdown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Engine) -> Result<(), ExtensionError> + Send + Sync + 'static,
    {
        self.on_shutdown = Some(Arc::new(hook));
        self
    }

    /// Stores route-scoped extension settings, marked as set by the author.
    pub fn with_ext<T: Bind>(self, value: T) -> Self {
        self.exts.insert(value);
        self
    }

    /// Route-scoped extension settings of type `T`, defaulted on first
    /// access.
    pub fn ext<T: Bind + Default>(&self) -> ExtEntry<T> {
        self.exts.get()
    }

    /// The side-table itself.
    pub fn extensions(&self) -> &ExtensionMap {
        &self.exts
    }

    /// Mount path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Registration priority.
    pub fn priority_value(&self) -> i32 {
        self.priority
    }

    /// Primary method.
    pub fn primary_method(&self) -> &Method {
        &self.method
    }

    /// Primary method followed by the secondary ones.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        std::iter::once(&self.method).chain(self.sub_methods.iter())
    }

    /// Declared content type.
    pub fn declared_content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// True if a preflight route is registered.
    pub fn is_cors(&self) -> bool {
        self.cors
    }

    /// Custom preflight headers.
    pub fn custom_cors_headers(&self) -> Option<&[(String, String)]> {
        self.cors_headers.as_deref()
    }

    /// Success status.
    pub fn response_status_code(&self) -> StatusCode {
        self.response_status
    }

    /// Error status.
    pub fn error_status_code(&self) -> StatusCode {
        self.error_status
    }

    /// Redirect status.
    pub fn redirect_status_code(&self) -> StatusCode {
        self.redirect_status
    }

    /// True if JSON is written without the envelope.
    pub fn is_unwrapped(&self) -> bool {
        self.no_wrap_json
    }

    /// True if the route itself requests auditing.
    pub fn is_audited(&self) -> bool {
        self.auto_audit
    }

    /// Audit message, `autoaudit` unless set.
    pub fn audit_message(&self) -> &str {
        self.audit_message.as_deref().unwrap_or("autoaudit")
    }

    /// Summary text.
    pub fn summary_text(&self) -> &str {
        &self.summary
    }

    /// Description text.
    pub fn description_text(&self) -> &str {
        &self.description
    }

    pub(crate) fn request_hook(&self) -> Option<&RequestHook> {
        self.on_request.as_ref()
    }

    pub(crate) fn response_hook(&self) -> Option<&ResponseHook> {
        self.on_response.as_ref()
    }

    pub(crate) fn error_hook(&self) -> Option<&ErrorHook> {
        self.on_error.as_ref()
    }

    /// Init hook.
    pub fn init_hook(&self) -> Option<&LifecycleHook> {
        self.on_init.as_ref()
    }

    /// Shutdown hook.
    pub fn shutdown_hook(&self) -> Option<&LifecycleHook> {
        self.on_shutdown.as_ref()
    }

    /// The inline template, parsed on first use and cached.
    ///
    /// Returns `None` when no template is configured.
    pub(crate) fn template(&self) -> Option<Result<&Environment<'static>, &str>> {
        let source = self.html_template.as_ref()?;
        let parsed = self.parsed_template.get_or_init(|| {
            let mut env = Environment::new();
            env.add_template_owned(TEMPLATE_NAME, source.clone())
                .map_err(|e| e.to_string())?;
            Ok(env)
        });
        Some(parsed.as_ref().map_err(String::as_str))
    }
}

/// Renders `value` with a parsed route template.
pub(crate) fn render_template(
    env: &Environment<'static>,
    value: &serde_json::Value,
) -> Result<String, minijinja::Error> {
    env.get_template(TEMPLATE_NAME)?
        .render(minijinja::Value::from_serialize(value))
}

impl fmt::Debug for HandlerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerOption")
            .field("path", &self.path)
            .field("priority", &self.priority)
            .field("method", &self.method)
            .field("sub_methods", &self.sub_methods)
            .field("content_type", &self.content_type)
            .field("cors", &self.cors)
            .field("response_status", &self.response_status)
            .field("error_status", &self.error_status)
            .field("redirect_status", &self.redirect_status)
            .field("no_wrap_json", &self.no_wrap_json)
            .field("auto_audit", &self.auto_audit)
            .field("exts", &self.exts)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Bind)]
    pub struct RateLimit {
        #[bind(default = "60")]
        pub per_minute: u32,
        #[bind(default = "ip")]
        pub key: String,
    }

    #[derive(Debug, Default, PartialEq, Bind)]
    pub struct Masking {
        pub enabled: bool,
    }

    #[test]
    fn test_defaults() {
        let option = HandlerOption::new("/x");
        assert_eq!(option.primary_method(), &Method::GET);
        assert_eq!(option.response_status_code(), StatusCode::OK);
        assert_eq!(option.error_status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(option.redirect_status_code(), StatusCode::FOUND);
        assert_eq!(option.audit_message(), "autoaudit");
    }

    #[test]
    fn test_api_and_ui_shortcuts() {
        let api = HandlerOption::api("/api/items");
        assert_eq!(
            api.methods().cloned().collect::<Vec<_>>(),
            vec![Method::GET, Method::POST]
        );
        assert_eq!(api.declared_content_type(), Some(JSON));

        let ui = HandlerOption::ui("/items");
        assert_eq!(ui.declared_content_type(), Some(HTML));
    }

    #[test]
    fn test_ext_is_defaulted_lazily() {
        let option = HandlerOption::new("/x");
        assert!(!option.extensions().contains::<RateLimit>());

        let entry = option.ext::<RateLimit>();
        assert!(!entry.user_set);
        assert_eq!(entry.value.per_minute, 60);
        assert_eq!(entry.value.key, "ip");

        let again = option.ext::<RateLimit>();
        assert!(Arc::ptr_eq(&entry.value, &again.value));
        assert_eq!(option.extensions().len(), 1);
    }

    #[test]
    fn test_with_ext_marks_user_set_and_applies_defaults() {
        let option = HandlerOption::new("/x").with_ext(RateLimit {
            per_minute: 5,
            key: String::new(),
        });

        let entry = option.ext::<RateLimit>();
        assert!(entry.user_set);
        assert_eq!(entry.value.per_minute, 5);
        assert_eq!(entry.value.key, "ip");

        assert!(!option.ext::<Masking>().user_set);
        assert_eq!(option.extensions().len(), 2);
    }

    #[test]
    fn test_template_is_parsed_once() {
        let option = HandlerOption::ui("/hello").html_template("<p>{{ name }}</p>");
        let env = option.template().unwrap().unwrap();
        let out = render_template(env, &serde_json::json!({"name": "Ada"})).unwrap();
        assert_eq!(out, "<p>Ada</p>");

        let first = option.template().unwrap().unwrap() as *const Environment<'static>;
        let second = option.template().unwrap().unwrap() as *const Environment<'static>;
        assert_eq!(first, second);
    }

    #[test]
    fn test_broken_template() {
        let option = HandlerOption::ui("/hello").html_template("{% if %}");
        assert!(option.template().unwrap().is_err());
        assert!(HandlerOption::ui("/plain").template().is_none());
    }
}

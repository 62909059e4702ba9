use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use crate::{
    request::{Body, Call, Payload, RequestOptions},
    FetchError, Response, Result,
};

/// Request-phase interceptor.
///
/// Returning `Some` replaces the current options for subsequent
/// interceptors; returning `None` leaves them unchanged.
pub type RequestInterceptor = dyn Fn(&RequestOptions) -> Option<RequestOptions> + Send + Sync;

/// Response-phase interceptor, executed before the response handler with
/// the same replace-or-keep contract as [`RequestInterceptor`].
pub type ResponseInterceptor = dyn Fn(&Response) -> Option<Response> + Send + Sync;

/// Handle returned by interceptor registration, usable for removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InterceptorId(pub(crate) u64);

pub(crate) type RequestHook = dyn Fn(Call) -> Result<RequestOptions> + Send + Sync;
pub(crate) type ResponseHook<T> = dyn Fn(Response) -> Result<T> + Send + Sync;
pub(crate) type ErrorHook<T> = dyn Fn(FetchError) -> Result<T> + Send + Sync;

pub(crate) struct Hooks<T> {
    pub on_request: Arc<RequestHook>,
    pub on_response: Arc<ResponseHook<T>>,
    pub on_request_error: Arc<ErrorHook<T>>,
    pub on_response_error: Arc<ErrorHook<T>>,
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            on_request: Arc::clone(&self.on_request),
            on_response: Arc::clone(&self.on_response),
            on_request_error: Arc::clone(&self.on_request_error),
            on_response_error: Arc::clone(&self.on_response_error),
        }
    }
}

/// Default timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
/// Default retry budget after the initial attempt.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Create-time options for a client.
///
/// `T` is the call outcome type produced by the response handler. The
/// [`Default`] configuration (for `T = serde_json::Value`) parses the
/// response body as JSON and classifies a 403 status as an
/// authorization error; [`ClientConfig::raw`] resolves with the
/// untouched [`Response`] instead.
pub struct ClientConfig<T> {
    pub(crate) base_url: String,
    pub(crate) timeout_ms: u64,
    pub(crate) retry_count: u32,
    pub(crate) request_interceptors: Vec<Arc<RequestInterceptor>>,
    pub(crate) response_interceptors: Vec<Arc<ResponseInterceptor>>,
    pub(crate) hooks: Hooks<T>,
}

impl<T> fmt::Debug for ClientConfig<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("retry_count", &self.retry_count)
            .field("request_interceptors", &self.request_interceptors.len())
            .field("response_interceptors", &self.response_interceptors.len())
            .finish()
    }
}

impl Default for ClientConfig<Value> {
    fn default() -> Self {
        Self::with_handler(default_json_handler)
    }
}

impl ClientConfig<Value> {
    /// Default configuration: JSON request bodies, JSON-parsed outcomes.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientConfig<Response> {
    /// Configuration whose calls resolve with the raw response.
    pub fn raw() -> Self {
        Self::with_handler(Ok)
    }
}

impl<T> ClientConfig<T> {
    /// Creates a configuration with the given response handler and
    /// defaults for everything else.
    pub fn with_handler(
        on_response: impl Fn(Response) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            base_url: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_count: DEFAULT_RETRY_COUNT,
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            hooks: Hooks {
                on_request: Arc::new(default_request_builder),
                on_response: Arc::new(on_response),
                on_request_error: Arc::new(|err| Err(err)),
                on_response_error: Arc::new(|err| Err(err)),
            },
        }
    }

    /// Base URL prepended to origin-relative call URLs.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Default per-call timeout in milliseconds.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Default retry budget after the initial attempt.
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Replaces the request builder hook.
    pub fn on_request(
        mut self,
        hook: impl Fn(Call) -> Result<RequestOptions> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_request = Arc::new(hook);
        self
    }

    /// Replaces the response handler hook.
    pub fn on_response(
        mut self,
        hook: impl Fn(Response) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_response = Arc::new(hook);
        self
    }

    /// Sets both error hooks at once.
    pub fn on_error(mut self, hook: impl Fn(FetchError) -> Result<T> + Send + Sync + 'static) -> Self {
        let hook: Arc<ErrorHook<T>> = Arc::new(hook);
        self.hooks.on_request_error = Arc::clone(&hook);
        self.hooks.on_response_error = hook;
        self
    }

    /// Replaces the request-phase error hook.
    pub fn on_request_error(
        mut self,
        hook: impl Fn(FetchError) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_request_error = Arc::new(hook);
        self
    }

    /// Replaces the response-phase error hook.
    pub fn on_response_error(
        mut self,
        hook: impl Fn(FetchError) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_response_error = Arc::new(hook);
        self
    }

    /// Appends a request interceptor.
    pub fn request_interceptor(
        mut self,
        interceptor: impl Fn(&RequestOptions) -> Option<RequestOptions> + Send + Sync + 'static,
    ) -> Self {
        self.request_interceptors.push(Arc::new(interceptor));
        self
    }

    /// Appends a response interceptor.
    pub fn response_interceptor(
        mut self,
        interceptor: impl Fn(&Response) -> Option<Response> + Send + Sync + 'static,
    ) -> Self {
        self.response_interceptors.push(Arc::new(interceptor));
        self
    }
}

impl From<ConfigSnapshot> for ClientConfig<Value> {
    fn from(snapshot: ConfigSnapshot) -> Self {
        let mut config = Self::default()
            .timeout_ms(snapshot.timeout_ms)
            .retry_count(snapshot.retry_count);
        config.request_interceptors = snapshot.request_interceptors;
        config.response_interceptors = snapshot.response_interceptors;
        config
    }
}

/// Default request builder: JSON payloads are serialized with a
/// `Content-Type: application/json` header, caller headers merge over
/// the defaults, and multipart payloads carry no content type (the
/// transport adds one with the boundary).
pub fn default_request_builder(call: Call) -> Result<RequestOptions> {
    let mut headers = HeaderMap::new();
    let mut body = Body::Empty;
    let multipart = matches!(call.data, Some(Payload::Multipart(_)));

    match call.data {
        Some(Payload::Json(value)) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            let bytes = serde_json::to_vec(&value).map_err(|err| {
                FetchError::RequestBuild(format!("failed to serialize JSON body: {err}"))
            })?;
            body = Body::Bytes(bytes.into());
        }
        Some(Payload::Multipart(form)) => {
            body = Body::Multipart(form);
        }
        None => {}
    }

    for (name, value) in call.headers.iter() {
        headers.insert(name, value.clone());
    }
    if multipart {
        headers.remove(CONTENT_TYPE);
    }

    Ok(RequestOptions {
        url: call.url,
        method: call.method,
        headers,
        body,
    })
}

/// Default response handler: a 403 status is classified as an
/// authorization error; any other response resolves with its body
/// parsed as JSON.
pub fn default_json_handler(response: Response) -> Result<Value> {
    if response.status == reqwest::StatusCode::FORBIDDEN {
        return Err(FetchError::Http {
            status: 403,
            body: response.text(),
        });
    }
    response.json()
}

/// Standalone mutable request configuration.
///
/// Mirrors the live mutation surface of a client for callers that
/// assemble configuration up front and hand a snapshot to
/// [`crate::create`].
#[derive(Default)]
pub struct RequestConfig {
    request_interceptors: Vec<(InterceptorId, Arc<RequestInterceptor>)>,
    response_interceptors: Vec<(InterceptorId, Arc<ResponseInterceptor>)>,
    timeout_ms: u64,
    retry_count: u32,
    next_id: u64,
}

impl RequestConfig {
    /// Creates a configuration with the documented defaults.
    pub fn new() -> Self {
        Self {
            request_interceptors: Vec::new(),
            response_interceptors: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retry_count: DEFAULT_RETRY_COUNT,
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> InterceptorId {
        let id = InterceptorId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Appends a request interceptor, preserving registration order.
    pub fn add_request_interceptor(
        &mut self,
        interceptor: impl Fn(&RequestOptions) -> Option<RequestOptions> + Send + Sync + 'static,
    ) -> InterceptorId {
        let id = self.next_id();
        self.request_interceptors.push((id, Arc::new(interceptor)));
        id
    }

    /// Appends a response interceptor, preserving registration order.
    pub fn add_response_interceptor(
        &mut self,
        interceptor: impl Fn(&Response) -> Option<Response> + Send + Sync + 'static,
    ) -> InterceptorId {
        let id = self.next_id();
        self.response_interceptors.push((id, Arc::new(interceptor)));
        id
    }

    /// Removes a previously registered request interceptor.
    pub fn remove_request_interceptor(&mut self, id: InterceptorId) -> bool {
        let before = self.request_interceptors.len();
        self.request_interceptors.retain(|(entry, _)| *entry != id);
        self.request_interceptors.len() != before
    }

    /// Removes a previously registered response interceptor.
    pub fn remove_response_interceptor(&mut self, id: InterceptorId) -> bool {
        let before = self.response_interceptors.len();
        self.response_interceptors.retain(|(entry, _)| *entry != id);
        self.response_interceptors.len() != before
    }

    /// Overwrites the timeout unconditionally.
    pub fn set_timeout(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    /// Overwrites the retry budget unconditionally.
    pub fn set_retry_count(&mut self, retry_count: u32) {
        self.retry_count = retry_count;
    }

    /// Read-only snapshot of the current configuration.
    pub fn get_config(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            request_interceptors: self
                .request_interceptors
                .iter()
                .map(|(_, interceptor)| Arc::clone(interceptor))
                .collect(),
            response_interceptors: self
                .response_interceptors
                .iter()
                .map(|(_, interceptor)| Arc::clone(interceptor))
                .collect(),
            timeout_ms: self.timeout_ms,
            retry_count: self.retry_count,
        }
    }
}

/// Read-only view of a [`RequestConfig`] at one point in time.
#[derive(Clone)]
pub struct ConfigSnapshot {
    pub(crate) request_interceptors: Vec<Arc<RequestInterceptor>>,
    pub(crate) response_interceptors: Vec<Arc<ResponseInterceptor>>,
    pub(crate) timeout_ms: u64,
    pub(crate) retry_count: u32,
}

impl ConfigSnapshot {
    /// Timeout in milliseconds at snapshot time.
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Retry budget at snapshot time.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Number of registered request interceptors.
    pub fn request_interceptor_count(&self) -> usize {
        self.request_interceptors.len()
    }

    /// Number of registered response interceptors.
    pub fn response_interceptor_count(&self) -> usize {
        self.response_interceptors.len()
    }
}

impl fmt::Debug for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSnapshot")
            .field("timeout_ms", &self.timeout_ms)
            .field("retry_count", &self.retry_count)
            .field("request_interceptors", &self.request_interceptors.len())
            .field("response_interceptors", &self.response_interceptors.len())
            .finish()
    }
}

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use reqwest::header::HeaderMap;
use reqwest::Method;
use serde_json::Value;

use crate::{
    config::{ClientConfig, Hooks, InterceptorId, RequestInterceptor, ResponseInterceptor},
    request::{Call, Payload, RequestOptions},
    transfer::{self, FilePayload, ProgressHandler},
    transport::{ReqwestTransport, Transport},
    ConfigSnapshot, FetchError, Result,
};

/// Builds a client from an injected transport and configuration.
///
/// This is the generic escape hatch; [`FetchClient::new`] covers the
/// common case of the platform transport with default configuration.
pub fn create<T>(transport: impl Transport + 'static, config: ClientConfig<T>) -> FetchClient<T> {
    FetchClient::from_parts(Arc::new(transport), reqwest::Client::new(), config)
}

type RequestEntries = Vec<(InterceptorId, Arc<RequestInterceptor>)>;
type ResponseEntries = Vec<(InterceptorId, Arc<ResponseInterceptor>)>;

/// HTTP convenience client.
///
/// One client owns one configuration: interceptors registered through
/// [`FetchClient::add_request_interceptor`] and friends persist across
/// every call made through this client (and its clones, which share
/// state). Calls run fully independently — there is no queueing or
/// cross-call serialization.
pub struct FetchClient<T> {
    inner: Arc<ClientInner<T>>,
}

impl<T> Clone for FetchClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for FetchClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("base_url", &self.inner.base_url)
            .field(
                "timeout_ms",
                &self.inner.timeout_ms.load(Ordering::Relaxed),
            )
            .field(
                "retry_count",
                &self.inner.retry_count.load(Ordering::Relaxed),
            )
            .finish()
    }
}

struct ClientInner<T> {
    transport: Arc<dyn Transport>,
    // File transfers bypass the pipeline and talk to the platform
    // client directly.
    transfer_http: reqwest::Client,
    base_url: String,
    hooks: Hooks<T>,
    request_interceptors: ArcSwap<RequestEntries>,
    response_interceptors: ArcSwap<ResponseEntries>,
    timeout_ms: AtomicU64,
    retry_count: AtomicU32,
    next_interceptor_id: AtomicU64,
}

impl FetchClient<Value> {
    /// Creates a client over the platform transport with the default
    /// JSON configuration.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a default client with a base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::with_config(ClientConfig::default().base_url(base_url))
    }
}

impl Default for FetchClient<Value> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FetchClient<T> {
    /// Creates a client over the platform transport with the given
    /// configuration.
    pub fn with_config(config: ClientConfig<T>) -> Self {
        let http = reqwest::Client::new();
        Self::from_parts(
            Arc::new(ReqwestTransport::with_client(http.clone())),
            http,
            config,
        )
    }

    /// Equivalent to the free [`create`] function.
    pub fn create(transport: impl Transport + 'static, config: ClientConfig<T>) -> Self {
        create(transport, config)
    }

    pub(crate) fn from_parts(
        transport: Arc<dyn Transport>,
        transfer_http: reqwest::Client,
        config: ClientConfig<T>,
    ) -> Self {
        let mut next_id = 0u64;
        let request_interceptors: RequestEntries = config
            .request_interceptors
            .into_iter()
            .map(|interceptor| {
                let id = InterceptorId(next_id);
                next_id += 1;
                (id, interceptor)
            })
            .collect();
        let response_interceptors: ResponseEntries = config
            .response_interceptors
            .into_iter()
            .map(|interceptor| {
                let id = InterceptorId(next_id);
                next_id += 1;
                (id, interceptor)
            })
            .collect();

        Self {
            inner: Arc::new(ClientInner {
                transport,
                transfer_http,
                base_url: config.base_url,
                hooks: config.hooks,
                request_interceptors: ArcSwap::from_pointee(request_interceptors),
                response_interceptors: ArcSwap::from_pointee(response_interceptors),
                timeout_ms: AtomicU64::new(config.timeout_ms),
                retry_count: AtomicU32::new(config.retry_count),
                next_interceptor_id: AtomicU64::new(next_id),
            }),
        }
    }

    /// Executes one logical HTTP call through the full pipeline:
    /// build options, apply request interceptors, resolve the URL,
    /// send under a timeout-bound cancellation with capped linear
    /// retry, apply response interceptors, and deliver the outcome
    /// through exactly one of the configured hooks.
    pub async fn call(&self, call: Call) -> Result<T> {
        let inner = &*self.inner;
        let timeout_ms = call
            .timeout_ms
            .unwrap_or_else(|| inner.timeout_ms.load(Ordering::Relaxed));
        let retry_count = call
            .retry_count
            .unwrap_or_else(|| inner.retry_count.load(Ordering::Relaxed));

        // Build errors short-circuit: the transport is never invoked.
        let mut options = match (inner.hooks.on_request)(call) {
            Ok(options) => options,
            Err(err) => return (inner.hooks.on_request_error)(err),
        };

        // Request interceptors run once per logical call, not once per
        // retry attempt. The list is snapshotted here; concurrent
        // registration may or may not be visible to an in-flight call.
        let request_interceptors = inner.request_interceptors.load_full();
        for (_, interceptor) in request_interceptors.iter() {
            if let Some(replacement) = interceptor(&options) {
                options = replacement;
            }
        }

        if !is_absolute_url(&options.url) {
            options.url = format!("{}{}", inner.base_url, options.url);
        }
        if let Err(err) = reqwest::Url::parse(&options.url) {
            let err =
                FetchError::RequestBuild(format!("invalid request URL '{}': {err}", options.url));
            return (inner.hooks.on_request_error)(err);
        }

        let response_interceptors = inner.response_interceptors.load_full();

        // A single timer bounds the whole call, retries included.
        // Dropping the timed future on expiry cancels the in-flight
        // attempt, and a timeout is never retried.
        let outcome = match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.run_attempts(&options, &response_interceptors, retry_count),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Timeout),
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(err) => (inner.hooks.on_response_error)(err),
        }
    }

    async fn run_attempts(
        &self,
        options: &RequestOptions,
        response_interceptors: &ResponseEntries,
        retry_count: u32,
    ) -> Result<T> {
        let mut retries = 0u32;
        loop {
            let attempt = match self.inner.transport.send(options).await {
                Ok(mut response) => {
                    // Response interceptors run on every attempt that
                    // produced a response.
                    for (_, interceptor) in response_interceptors {
                        if let Some(replacement) = interceptor(&response) {
                            response = replacement;
                        }
                    }
                    (self.inner.hooks.on_response)(response)
                }
                Err(err) => Err(err),
            };

            match attempt {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && retries < retry_count => {
                    retries += 1;
                    #[cfg(feature = "tracing")]
                    tracing::debug!(attempt = retries, "retrying after transport error");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// GET request. Never forwards a body.
    pub async fn get(&self, url: impl Into<String>, headers: Option<HeaderMap>) -> Result<T> {
        self.call(build_call(Method::GET, url.into(), None, headers))
            .await
    }

    /// POST request with an optional payload.
    pub async fn post(
        &self,
        url: impl Into<String>,
        data: Option<Payload>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        self.call(build_call(Method::POST, url.into(), data, headers))
            .await
    }

    /// PUT request with an optional payload.
    pub async fn put(
        &self,
        url: impl Into<String>,
        data: Option<Payload>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        self.call(build_call(Method::PUT, url.into(), data, headers))
            .await
    }

    /// PATCH request with an optional payload.
    pub async fn patch(
        &self,
        url: impl Into<String>,
        data: Option<Payload>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        self.call(build_call(Method::PATCH, url.into(), data, headers))
            .await
    }

    /// DELETE request with an optional payload.
    pub async fn delete(
        &self,
        url: impl Into<String>,
        data: Option<Payload>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        self.call(build_call(Method::DELETE, url.into(), data, headers))
            .await
    }

    /// Uploads a file as a single-field multipart POST, outside the
    /// interceptor/retry pipeline.
    pub async fn upload_file(
        &self,
        url: &str,
        file: FilePayload,
        headers: Option<HeaderMap>,
        on_progress: Option<ProgressHandler>,
    ) -> Result<Value> {
        transfer::upload_file(
            &self.inner.transfer_http,
            url,
            file,
            headers.unwrap_or_default(),
            on_progress,
        )
        .await
    }

    /// Downloads a URL as text, outside the interceptor/retry pipeline.
    pub async fn download_file(
        &self,
        url: &str,
        headers: Option<HeaderMap>,
        on_progress: Option<ProgressHandler>,
    ) -> Result<String> {
        transfer::download_file(
            &self.inner.transfer_http,
            url,
            headers.unwrap_or_default(),
            on_progress,
        )
        .await
    }

    /// Appends a request interceptor, visible to subsequent calls.
    pub fn add_request_interceptor(
        &self,
        interceptor: impl Fn(&RequestOptions) -> Option<RequestOptions> + Send + Sync + 'static,
    ) -> InterceptorId {
        let id = self.next_interceptor_id();
        let interceptor: Arc<RequestInterceptor> = Arc::new(interceptor);
        self.inner.request_interceptors.rcu(|current| {
            let mut next = (**current).clone();
            next.push((id, Arc::clone(&interceptor)));
            next
        });
        id
    }

    /// Appends a response interceptor, visible to subsequent calls.
    pub fn add_response_interceptor(
        &self,
        interceptor: impl Fn(&crate::Response) -> Option<crate::Response> + Send + Sync + 'static,
    ) -> InterceptorId {
        let id = self.next_interceptor_id();
        let interceptor: Arc<ResponseInterceptor> = Arc::new(interceptor);
        self.inner.response_interceptors.rcu(|current| {
            let mut next = (**current).clone();
            next.push((id, Arc::clone(&interceptor)));
            next
        });
        id
    }

    /// Removes a request interceptor registered on this client.
    pub fn remove_request_interceptor(&self, id: InterceptorId) -> bool {
        let mut removed = false;
        self.inner.request_interceptors.rcu(|current| {
            let mut next = (**current).clone();
            let before = next.len();
            next.retain(|(entry, _)| *entry != id);
            removed = next.len() != before;
            next
        });
        removed
    }

    /// Removes a response interceptor registered on this client.
    pub fn remove_response_interceptor(&self, id: InterceptorId) -> bool {
        let mut removed = false;
        self.inner.response_interceptors.rcu(|current| {
            let mut next = (**current).clone();
            let before = next.len();
            next.retain(|(entry, _)| *entry != id);
            removed = next.len() != before;
            next
        });
        removed
    }

    /// Overwrites the default timeout for subsequent calls.
    pub fn set_timeout(&self, timeout_ms: u64) {
        self.inner.timeout_ms.store(timeout_ms, Ordering::Relaxed);
    }

    /// Overwrites the default retry budget for subsequent calls.
    pub fn set_retry_count(&self, retry_count: u32) {
        self.inner.retry_count.store(retry_count, Ordering::Relaxed);
    }

    /// Read-only snapshot of the current configuration.
    pub fn get_config(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            request_interceptors: self
                .inner
                .request_interceptors
                .load()
                .iter()
                .map(|(_, interceptor)| Arc::clone(interceptor))
                .collect(),
            response_interceptors: self
                .inner
                .response_interceptors
                .load()
                .iter()
                .map(|(_, interceptor)| Arc::clone(interceptor))
                .collect(),
            timeout_ms: self.inner.timeout_ms.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
        }
    }

    fn next_interceptor_id(&self) -> InterceptorId {
        InterceptorId(self.inner.next_interceptor_id.fetch_add(1, Ordering::Relaxed))
    }
}

fn build_call(
    method: Method,
    url: String,
    data: Option<Payload>,
    headers: Option<HeaderMap>,
) -> Call {
    let mut call = Call::new(method, url);
    call.data = data;
    if let Some(headers) = headers {
        call.headers = headers;
    }
    call
}

fn is_absolute_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

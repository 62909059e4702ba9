//! `fetchkit` is a configurable convenience layer over a pluggable HTTP
//! transport: base-URL resolution, default headers, JSON body
//! serialization, timeout-bound cancellation, capped linear retry, and
//! ordered request/response interceptor chains.
//!
//! Entry points:
//! - [`FetchClient::get`] / [`FetchClient::post`] and the other verbs
//! - [`create`] — injected-transport escape hatch
//! - [`upload_file`] / [`download_file`] — file transfer with progress
//!
//! One client owns one configuration; interceptors registered on it
//! apply to every subsequent call. Retry is linear and immediate by
//! design — there is no backoff or jitter, so callers needing
//! production-grade retry pacing should layer it into a custom
//! [`Transport`].

mod client;
mod config;
mod error;
mod request;
mod response;
mod transfer;
mod transport;

pub use client::{create, FetchClient};
pub use config::{
    default_json_handler, default_request_builder, ClientConfig, ConfigSnapshot, InterceptorId,
    RequestConfig, RequestInterceptor, ResponseInterceptor, DEFAULT_RETRY_COUNT,
    DEFAULT_TIMEOUT_MS,
};
pub use error::FetchError;
pub use request::{Body, Call, MultipartForm, MultipartPart, Payload, RequestOptions};
pub use response::Response;
pub use transfer::{
    download_file, track_progress, upload_file, FilePayload, ProgressEvent, ProgressHandler,
};
pub use transport::{ReqwestTransport, Transport};

pub use reqwest::header;
pub use reqwest::{Method, StatusCode};

pub type Result<T> = std::result::Result<T, FetchError>;

//! File upload and download helpers with progress accounting.
//!
//! These operate directly on the platform client and bypass the
//! interceptor/retry pipeline entirely.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::multipart;
use serde_json::Value;

use crate::{FetchError, Result};

/// Shared progress callback receiving a cumulative percentage.
pub type ProgressHandler = Arc<dyn Fn(f64) + Send + Sync>;

/// One progress notification from the transport.
#[derive(Clone, Copy, Debug)]
pub struct ProgressEvent {
    /// Bytes transferred so far.
    pub loaded: u64,
    /// Total bytes, meaningful only when `length_computable` is set.
    pub total: u64,
    /// Whether the total size is known.
    pub length_computable: bool,
}

/// Converts a progress event into a percentage callback invocation.
///
/// A no-op when the event is not length-computable.
pub fn track_progress(event: ProgressEvent, on_progress: impl Fn(f64)) {
    if event.length_computable && event.total > 0 {
        on_progress(event.loaded as f64 / event.total as f64 * 100.0);
    }
}

/// Upload source: a named blob of bytes.
#[derive(Clone, Debug)]
pub struct FilePayload {
    /// File name reported in the multipart field.
    pub file_name: String,
    /// File contents.
    pub content: Bytes,
    /// Optional content type of the file part.
    pub content_type: Option<String>,
}

impl FilePayload {
    /// Creates an upload source.
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
            content_type: None,
        }
    }

    /// Sets the content type of the file part.
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// POSTs `file` as a single-field (`"file"`) multipart body.
///
/// When a progress handler is supplied and the file size is known, the
/// body is streamed in chunks and each chunk fires a cumulative
/// percentage. Resolves with the response parsed as JSON when possible,
/// otherwise the raw text as a JSON string. Non-2xx statuses reject
/// with [`FetchError::Http`]; transport failures with
/// [`FetchError::Transport`].
pub async fn upload_file(
    http: &reqwest::Client,
    url: &str,
    file: FilePayload,
    headers: HeaderMap,
    on_progress: Option<ProgressHandler>,
) -> Result<Value> {
    let total = file.content.len() as u64;
    let mut part = match on_progress {
        Some(on_progress) if total > 0 => {
            let chunks: Vec<Bytes> = file
                .content
                .chunks(UPLOAD_CHUNK_SIZE)
                .map(Bytes::copy_from_slice)
                .collect();
            let mut loaded = 0u64;
            let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
                loaded += chunk.len() as u64;
                track_progress(
                    ProgressEvent {
                        loaded,
                        total,
                        length_computable: true,
                    },
                    &*on_progress,
                );
                Ok::<Bytes, std::io::Error>(chunk)
            }));
            multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
        }
        _ => multipart::Part::bytes(file.content.to_vec()),
    };

    part = part.file_name(file.file_name.clone());
    if let Some(content_type) = &file.content_type {
        part = part.mime_str(content_type).map_err(|err| {
            FetchError::RequestBuild(format!("invalid upload content type: {err}"))
        })?;
    }
    let form = multipart::Form::new().part("file", part);

    let response = http
        .post(url)
        .headers(headers)
        .multipart(form)
        .send()
        .await
        .map_err(FetchError::transport)?;

    let status = response.status();
    let body = response.text().await.map_err(FetchError::transport)?;
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
            body,
        });
    }

    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(_) => Ok(Value::String(body)),
    }
}

/// GETs `url` and resolves with the body decoded as text.
///
/// Rejects immediately with [`FetchError::Http`] on a non-2xx status.
/// When a progress handler is supplied and the response declares a
/// content length, the body stream is consumed chunk by chunk; each
/// chunk is appended unmodified and fires a cumulative percentage.
/// Stream errors reject with [`FetchError::Transport`].
pub async fn download_file(
    http: &reqwest::Client,
    url: &str,
    headers: HeaderMap,
    on_progress: Option<ProgressHandler>,
) -> Result<String> {
    let response = http
        .get(url)
        .headers(headers)
        .send()
        .await
        .map_err(FetchError::transport)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.map_err(FetchError::transport)?;
        return Err(FetchError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let total = response.content_length().unwrap_or(0);
    match on_progress {
        Some(on_progress) if total > 0 => {
            let mut loaded = 0u64;
            let mut buffer = Vec::with_capacity(total as usize);
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(FetchError::transport)?;
                loaded += chunk.len() as u64;
                buffer.extend_from_slice(&chunk);
                track_progress(
                    ProgressEvent {
                        loaded,
                        total,
                        length_computable: true,
                    },
                    &*on_progress,
                );
            }
            Ok(String::from_utf8_lossy(&buffer).into_owned())
        }
        _ => response.text().await.map_err(FetchError::transport),
    }
}

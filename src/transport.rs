use async_trait::async_trait;
use reqwest::multipart;

use crate::{
    request::{Body, MultipartForm, RequestOptions},
    FetchError, Response, Result,
};

/// Injected HTTP transport.
///
/// The pipeline never touches the network itself; it hands fully-built
/// [`RequestOptions`] to a transport and receives a buffered
/// [`Response`]. Timeout cancellation is owned by the caller: dropping
/// the `send` future must abort the underlying request.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one HTTP request.
    async fn send(&self, request: &RequestOptions) -> Result<Response>;
}

/// Platform transport over [`reqwest::Client`].
///
/// Carries no request timeout of its own; the pipeline bounds the whole
/// call, retries included, with a single timer.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a fresh `reqwest` client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport over an existing `reqwest` client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// The underlying `reqwest` client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestOptions) -> Result<Response> {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());

        builder = match &request.body {
            Body::Empty => builder,
            Body::Bytes(bytes) => builder.body(bytes.clone()),
            Body::Multipart(form) => builder.multipart(to_reqwest_form(form)?),
        };

        let response = builder.send().await.map_err(FetchError::transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(FetchError::transport)?;

        Ok(Response::new(status, headers, body))
    }
}

/// Encodes the owned multipart form into reqwest's representation.
///
/// Rebuilt per attempt, since reqwest forms are consumed on send.
fn to_reqwest_form(form: &MultipartForm) -> Result<multipart::Form> {
    let mut encoded = multipart::Form::new();
    for part in form.parts() {
        let mut piece = multipart::Part::bytes(part.data.to_vec());
        if let Some(file_name) = &part.file_name {
            piece = piece.file_name(file_name.clone());
        }
        if let Some(content_type) = &part.content_type {
            piece = piece.mime_str(content_type).map_err(|err| {
                FetchError::RequestBuild(format!(
                    "invalid content type for part '{}': {err}",
                    part.name
                ))
            })?;
        }
        encoded = encoded.part(part.name.clone(), piece);
    }
    Ok(encoded)
}

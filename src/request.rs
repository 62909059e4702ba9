use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::Method;

use crate::{FetchError, Result};

/// Structured call descriptor consumed by the request builder hook.
///
/// This replaces the loosely-typed positional argument list
/// `(method, url, data, headers)` with named fields. Per-call timeout
/// and retry overrides take precedence over the client configuration.
#[derive(Clone, Debug, Default)]
pub struct Call {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL, or a path resolved against the client's base URL.
    pub url: String,
    /// Optional request payload.
    pub data: Option<Payload>,
    /// Caller-supplied headers, merged over the builder defaults.
    pub headers: HeaderMap,
    /// Per-call timeout override in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Per-call retry budget override.
    pub retry_count: Option<u32>,
}

impl Call {
    /// Creates a call descriptor for a method and URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            ..Self::default()
        }
    }

    /// Attaches a payload.
    pub fn data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Attaches caller headers.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Overrides the configured timeout for this call only.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Overrides the configured retry budget for this call only.
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }
}

/// Request payload accepted by the verb facade.
#[derive(Clone, Debug)]
pub enum Payload {
    /// JSON value, serialized by the default request builder with a
    /// `Content-Type: application/json` header.
    Json(serde_json::Value),
    /// Multipart form. The default builder sets no content type; the
    /// transport supplies one with the boundary parameter.
    Multipart(MultipartForm),
}

impl Payload {
    /// Serializes any `Serialize` value into a JSON payload.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value)
            .map_err(|err| FetchError::RequestBuild(format!("invalid JSON payload: {err}")))?;
        Ok(Self::Json(value))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<MultipartForm> for Payload {
    fn from(form: MultipartForm) -> Self {
        Self::Multipart(form)
    }
}

/// Owned multipart form data.
///
/// Unlike transport-native multipart builders this form is cloneable, so
/// the same body can be re-sent on every retry attempt.
#[derive(Clone, Debug, Default)]
pub struct MultipartForm {
    parts: Vec<MultipartPart>,
}

impl MultipartForm {
    /// Creates an empty form.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a plain field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: Bytes::from(value.into()),
        });
        self
    }

    /// Appends a file field.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(MultipartPart {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: None,
            data: data.into(),
        });
        self
    }

    /// Appends a fully-specified part.
    pub fn part(mut self, part: MultipartPart) -> Self {
        self.parts.push(part);
        self
    }

    /// The parts in append order.
    pub fn parts(&self) -> &[MultipartPart] {
        &self.parts
    }

    /// Whether the form has no parts.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// One field of a multipart form.
#[derive(Clone, Debug)]
pub struct MultipartPart {
    /// Field name.
    pub name: String,
    /// Optional file name.
    pub file_name: Option<String>,
    /// Optional content type of this part.
    pub content_type: Option<String>,
    /// Field data.
    pub data: Bytes,
}

/// Fully-built request options handed to the transport.
///
/// After the request interceptors and base-URL resolution have run,
/// `url` must parse as an absolute URL.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: Method,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Body,
}

/// Request body variants the transport understands.
#[derive(Clone, Debug, Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Raw bytes, typically serialized JSON.
    Bytes(Bytes),
    /// Multipart form, encoded by the transport per attempt.
    Multipart(MultipartForm),
}

#[cfg(test)]
mod tests {
    use super::{Call, MultipartForm, Payload};
    use reqwest::Method;
    use serde_json::json;

    #[test]
    fn call_builder_sets_overrides() {
        let call = Call::new(Method::POST, "/items")
            .data(json!({"a": 1}))
            .timeout_ms(250)
            .retry_count(0);
        assert_eq!(call.url, "/items");
        assert_eq!(call.timeout_ms, Some(250));
        assert_eq!(call.retry_count, Some(0));
        assert!(matches!(call.data, Some(Payload::Json(_))));
    }

    #[test]
    fn payload_json_serializes_values() {
        let payload = Payload::json(&vec![1, 2, 3]).expect("serializable");
        match payload {
            Payload::Json(value) => assert_eq!(value, json!([1, 2, 3])),
            Payload::Multipart(_) => panic!("expected json payload"),
        }
    }

    #[test]
    fn multipart_form_preserves_part_order() {
        let form = MultipartForm::new()
            .text("kind", "avatar")
            .file("file", "a.png", vec![1u8, 2, 3]);
        assert_eq!(form.parts().len(), 2);
        assert_eq!(form.parts()[0].name, "kind");
        assert_eq!(form.parts()[1].file_name.as_deref(), Some("a.png"));
    }
}

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;

use crate::{FetchError, Result};

/// Fully-buffered HTTP response.
///
/// Response interceptors receive a reference and may return a
/// replacement; cloning is cheap because the body is reference-counted.
#[derive(Clone, Debug)]
pub struct Response {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: Bytes,
}

impl Response {
    /// Creates a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Whether the status is in the 200-299 range.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as text (lossy on invalid UTF-8).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|err| FetchError::Decode(format!("invalid JSON response: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::Response;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use serde_json::{json, Value};

    #[test]
    fn json_parses_body() {
        let response = Response::new(StatusCode::OK, HeaderMap::new(), r#"{"a":1}"#);
        let value: Value = response.json().expect("valid json");
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn json_rejects_invalid_body_as_decode_error() {
        let response = Response::new(StatusCode::OK, HeaderMap::new(), "not json");
        let err = response.json::<Value>().expect_err("must fail");
        assert!(matches!(err, crate::FetchError::Decode(_)));
    }

    #[test]
    fn text_is_lossy_on_invalid_utf8() {
        let response = Response::new(StatusCode::OK, HeaderMap::new(), vec![0xff, 0xfe]);
        assert!(!response.text().is_empty());
    }
}

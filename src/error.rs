/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Failure while constructing request options, before any network
    /// activity. The transport is never invoked for these.
    #[error("request build error: {0}")]
    RequestBuild(String),
    /// Network or request execution error from the underlying transport.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The per-call timeout expired and cancelled the in-flight attempt.
    #[error("request timed out")]
    Timeout,
    /// Status-classified failure with the raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// Response body decoding error.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Wraps any error as a transport failure.
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Transport(err.into())
    }

    /// Whether the retry loop may re-send the request after this error.
    ///
    /// Only transport-level failures are retried. Timeouts cancel the
    /// call outright, and status-classified errors (including the 403
    /// authorization case) surface without retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// HTTP status code for status-classified errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FetchError;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(FetchError::transport("connection reset").is_retryable());
        assert!(!FetchError::Timeout.is_retryable());
        assert!(!FetchError::RequestBuild("bad url".to_owned()).is_retryable());
        assert!(!FetchError::Http {
            status: 403,
            body: String::new()
        }
        .is_retryable());
        assert!(!FetchError::Decode("not json".to_owned()).is_retryable());
    }

    #[test]
    fn status_accessor_only_on_http_errors() {
        let err = FetchError::Http {
            status: 502,
            body: "bad gateway".to_owned(),
        };
        assert_eq!(err.status(), Some(502));
        assert_eq!(FetchError::Timeout.status(), None);
    }
}

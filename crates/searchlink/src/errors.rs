use std::fmt;
use std::time::Duration;

/// Closed set of failure categories, independent of how the service
/// signalled the failure (status code, structured tag, or bare string).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request was rejected as malformed or semantically invalid.
    InvalidRequest,
    /// Missing, invalid or insufficient credentials.
    AuthenticationError,
    /// The caller exceeded its request quota.
    RateLimitError,
    /// An upstream provider used by the service failed.
    ProviderError,
    /// The service failed internally.
    InternalServerError,
    /// Anything that could not be classified more precisely.
    Generic,
}

impl ErrorKind {
    /// Stable snake_case name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::AuthenticationError => "authentication_error",
            Self::RateLimitError => "rate_limit_error",
            Self::ProviderError => "provider_error",
            Self::InternalServerError => "internal_server_error",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure reported by (or on behalf of) the remote service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    correlation_id: Option<String>,
}

impl ApiError {
    /// Creates an error record without status or correlation id.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            correlation_id: None,
        }
    }

    /// Attaches the HTTP status the failure was observed with.
    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    /// Attaches a correlation id and appends it to the message.
    pub fn with_correlation_id(mut self, correlation_id: Option<&str>) -> Self {
        if let Some(id) = correlation_id.map(str::trim).filter(|id| !id.is_empty()) {
            self.message = format!("{} (request id: {id})", self.message);
            self.correlation_id = Some(id.to_string());
        }
        self
    }

    /// Wraps a transport-level failure (unreachable host, unreadable body).
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generic, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}

/// Top-level error type for every client operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Classified service or transport failure.
    #[error(transparent)]
    Api(ApiError),
    /// The client could not be configured (for example no HTTP transport).
    #[error("config error: {0}")]
    Config(String),
    /// The per-call deadline expired before the operation finished.
    #[error("operation timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },
    /// The caller aborted a streaming call.
    #[error("stream cancelled")]
    Cancelled,
}

impl ClientError {
    /// Returns the error category. Local failures report `Generic`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(err) => err.kind(),
            Self::Config(_) | Self::Timeout { .. } | Self::Cancelled => ErrorKind::Generic,
        }
    }

    /// Returns the classified record when this is an `Api` failure.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ApiError> for ClientError {
    fn from(value: ApiError) -> Self {
        ClientError::Api(value)
    }
}

/// Errors raised by an [`HttpTransport`](crate::transport::HttpTransport)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the host was unreachable.
    #[error("request failed: {0}")]
    Connect(String),
    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(String),
    /// The transport itself could not be constructed.
    #[error("failed to build HTTP transport: {0}")]
    Build(String),
}

impl From<TransportError> for ClientError {
    fn from(value: TransportError) -> Self {
        match value {
            TransportError::Build(message) => ClientError::Config(message),
            other => ClientError::Api(ApiError::transport(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_id_is_appended_to_message() {
        let err = ApiError::new(ErrorKind::RateLimitError, "slow down")
            .with_status(Some(429))
            .with_correlation_id(Some("req-42"));
        assert_eq!(err.message(), "slow down (request id: req-42)");
        assert_eq!(err.correlation_id(), Some("req-42"));
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn blank_correlation_id_is_ignored() {
        let err = ApiError::new(ErrorKind::Generic, "boom").with_correlation_id(Some("  "));
        assert_eq!(err.message(), "boom");
        assert_eq!(err.correlation_id(), None);
    }

    #[test]
    fn transport_errors_wrap_as_generic_except_build() {
        let err: ClientError = TransportError::Connect("dns failure".into()).into();
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(err.to_string().contains("dns failure"));

        let err: ClientError = TransportError::Build("no tls backend".into()).into();
        assert!(matches!(err, ClientError::Config(msg) if msg == "no tls backend"));
    }

    #[test]
    fn timeout_display_includes_duration() {
        let err = ClientError::Timeout {
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "operation timed out after 1500ms");
        assert_eq!(err.kind(), ErrorKind::Generic);
    }
}

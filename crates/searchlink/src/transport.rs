//! HTTP execution seam and the lazily resolved default transport.
//!
//! The client never talks to `reqwest` directly; it asks a
//! [`TransportSource`] for an [`HttpTransport`] on every call. The default
//! source builds one shared `reqwest::Client` on first use and keeps it for
//! the rest of the process.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt as _;
use once_cell::sync::OnceCell;
use reqwest::Method;
use reqwest::header::HeaderMap;

use crate::errors::{ClientError, TransportError};

/// Incrementally readable response body.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<Bytes, TransportError>> + Send + 'static>>;

/// Outbound request handed to a transport.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Response body, either already buffered or still streaming.
pub enum HttpBody {
    Full(Bytes),
    Stream(ByteStream),
}

impl HttpBody {
    /// Reads the whole body into memory.
    pub async fn collect(self) -> Result<Bytes, TransportError> {
        match self {
            HttpBody::Full(bytes) => Ok(bytes),
            HttpBody::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// Converts the body into a chunk stream; a buffered body is one chunk.
    pub fn into_stream(self) -> ByteStream {
        match self {
            HttpBody::Full(bytes) => Box::pin(futures::stream::once(async move { Ok(bytes) })),
            HttpBody::Stream(stream) => stream,
        }
    }
}

impl fmt::Debug for HttpBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            HttpBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: HttpBody,
}

/// HTTP execution capability.
///
/// Dropping the body stream of a returned response must release the
/// underlying connection; that is how deadlines and aborts cancel a call.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by a shared `reqwest::Client`.
///
/// No client-level timeout is set; every call is bounded by its own
/// [`Deadline`](crate::deadline::Deadline).
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    /// Wraps an existing client (custom proxies, TLS roots, pools).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .request(request.method, &request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Body(e.to_string())));

        Ok(HttpResponse {
            status,
            headers,
            body: HttpBody::Stream(Box::pin(body)),
        })
    }
}

static DEFAULT_TRANSPORT: OnceCell<Arc<ReqwestTransport>> = OnceCell::new();

/// Where a client obtains its HTTP capability.
#[derive(Clone, Default)]
pub enum TransportSource {
    /// Process-wide `reqwest` transport, built on first use.
    #[default]
    Default,
    /// Caller-supplied transport.
    Custom(Arc<dyn HttpTransport>),
}

impl TransportSource {
    /// Returns the transport for one call.
    ///
    /// Fails with `ClientError::Config` when no transport can be built; no
    /// request has been attempted at that point.
    pub(crate) fn resolve(&self) -> Result<Arc<dyn HttpTransport>, ClientError> {
        match self {
            TransportSource::Custom(transport) => Ok(transport.clone()),
            TransportSource::Default => {
                let transport = DEFAULT_TRANSPORT
                    .get_or_try_init(|| ReqwestTransport::new().map(Arc::new))
                    .map_err(|e| ClientError::Config(e.to_string()))?;
                Ok(transport.clone())
            }
        }
    }
}

impl fmt::Debug for TransportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportSource::Default => f.write_str("Default"),
            TransportSource::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::classify::{classify, correlation_id};
use crate::config::{ClientConfig, resolve_api_key};
use crate::deadline::Deadline;
use crate::envelope::RequestEnvelope;
use crate::errors::{ApiError, ClientError, ErrorKind};
use crate::requests::{AnswerRequest, SearchRequest};
use crate::stream::FrameStream;
use crate::transport::{HttpBody, HttpRequest, HttpResponse, HttpTransport, TransportSource};

pub const SEARCH_PATH: &str = "/search";
pub const ANSWER_PATH: &str = "/answer";

const EVENT_STREAM: &str = "text/event-stream";
const JSON: &str = "application/json";

struct ClientInner {
    config: ClientConfig,
    transport: TransportSource,
}

/// Client for the search/answer service.
///
/// Cheap to clone; clones share the immutable configuration. Calls are
/// independent of each other.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a client from explicit configuration and the default transport.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Client::builder()
            .api_key(config.api_key)
            .base_url(config.base_url)
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
    }

    /// Creates a client using `SEARCHLINK_API_KEY` and default settings.
    pub fn from_env() -> Result<Self, ClientError> {
        Client::builder().build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Runs a search and returns the decoded response.
    pub async fn search(&self, request: &SearchRequest) -> Result<Value, ClientError> {
        self.post_json(SEARCH_PATH, request).await
    }

    /// Requests a complete answer in one response.
    pub async fn answer(&self, request: &AnswerRequest) -> Result<Value, ClientError> {
        self.post_json(ANSWER_PATH, request).await
    }

    /// Requests an answer as a stream of events.
    pub async fn answer_stream(&self, request: &AnswerRequest) -> Result<FrameStream, ClientError> {
        self.post_stream(ANSWER_PATH, request).await
    }

    /// Blocking call: POSTs `params` to `path` and classifies the JSON reply.
    pub async fn post_json<P>(&self, path: &str, params: &P) -> Result<Value, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let call = self.start_call(path, params, false)?;
        let CallStart {
            transport,
            request,
            deadline,
            call_id,
        } = call;

        let response = execute(transport.as_ref(), request, &deadline, call_id).await?;
        let correlation = correlation_id(&response.headers);
        let status = response.status;
        let bytes = read_body(response.body, &deadline, call_id).await?;
        let payload = decode_json_body(&bytes, status)?;

        match classify(payload, Some(status), correlation.as_deref()) {
            Ok(value) => {
                debug!(
                    event = "client.request_succeeded",
                    domain = "client",
                    call_id = %call_id,
                    status = status,
                    response_bytes = bytes.len() as u64
                );
                Ok(value)
            }
            Err(err) => Err(log_failure(err, call_id)),
        }
    }

    /// Streaming call: POSTs `params` with `stream: true` and returns the
    /// lazily decoded event stream.
    ///
    /// Failures before the body is read (configuration, connection, error
    /// status) are returned here; later failures end the stream.
    pub async fn post_stream<P>(&self, path: &str, params: &P) -> Result<FrameStream, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let CallStart {
            transport,
            request,
            deadline,
            call_id,
        } = self.start_call(path, params, true)?;

        let response = execute(transport.as_ref(), request, &deadline, call_id).await?;
        let correlation = correlation_id(&response.headers);
        let status = response.status;

        if status >= 400 || is_json(&response.headers) {
            let bytes = read_body(response.body, &deadline, call_id).await?;
            let payload = decode_json_body(&bytes, status)?;
            let value = classify(payload, Some(status), correlation.as_deref())
                .map_err(|err| log_failure(err, call_id))?;
            // A plain JSON reply to a streaming request becomes a one-event stream.
            let body = HttpBody::Full(Bytes::from(format!("data: {value}\n\n")));
            return Ok(FrameStream::new(
                body.into_stream(),
                deadline,
                correlation,
                call_id,
            ));
        }

        debug!(
            event = "client.stream_opened",
            domain = "client",
            call_id = %call_id,
            status = status,
            has_correlation_id = correlation.is_some()
        );
        Ok(FrameStream::new(
            response.body.into_stream(),
            deadline,
            correlation,
            call_id,
        ))
    }

    fn start_call<P>(&self, path: &str, params: &P, stream: bool) -> Result<CallStart, ClientError>
    where
        P: Serialize + ?Sized,
    {
        // Resolve the transport before anything touches the network.
        let transport = self.inner.transport.resolve()?;
        let config = &self.inner.config;

        let mut envelope = RequestEnvelope::from_params(params)?;
        if stream {
            envelope.set("stream", Value::Bool(true));
        }
        let request = HttpRequest {
            method: Method::POST,
            url: config.endpoint(path),
            headers: request_headers(config, stream)?,
            body: envelope.into_body()?,
        };

        let call_id = uuid::Uuid::new_v4();
        debug!(
            event = "client.request_started",
            domain = "client",
            call_id = %call_id,
            path = path,
            stream = stream,
            timeout_ms = config.timeout.as_millis() as u64,
            request_bytes = request.body.len() as u64
        );
        Ok(CallStart {
            transport,
            request,
            deadline: Deadline::start(config.timeout),
            call_id,
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("transport", &self.inner.transport)
            .finish()
    }
}

struct CallStart {
    transport: Arc<dyn HttpTransport>,
    request: HttpRequest,
    deadline: Deadline,
    call_id: uuid::Uuid,
}

async fn execute(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    deadline: &Deadline,
    call_id: uuid::Uuid,
) -> Result<HttpResponse, ClientError> {
    deadline
        .run(transport.execute(request))
        .await
        .and_then(|result| result.map_err(ClientError::from))
        .map_err(|err| log_client_failure(err, call_id))
}

async fn read_body(
    body: HttpBody,
    deadline: &Deadline,
    call_id: uuid::Uuid,
) -> Result<Bytes, ClientError> {
    deadline
        .run(body.collect())
        .await
        .and_then(|result| result.map_err(ClientError::from))
        .map_err(|err| log_client_failure(err, call_id))
}

/// Parses a buffered body. An unparsable body on an error status is
/// treated as absent so the status alone drives classification.
fn decode_json_body(bytes: &[u8], status: u16) -> Result<Value, ClientError> {
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(_) if status >= 400 => Ok(Value::Null),
        Err(err) => Err(ApiError::new(
            ErrorKind::Generic,
            format!("invalid JSON in response body (HTTP {status}): {err}"),
        )
        .with_status(Some(status))
        .into()),
    }
}

fn request_headers(config: &ClientConfig, stream: bool) -> Result<HeaderMap, ClientError> {
    let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|_| {
        ApiError::new(
            ErrorKind::AuthenticationError,
            "API key contains characters not allowed in an HTTP header",
        )
    })?;
    auth.set_sensitive(true);
    let user_agent = HeaderValue::from_str(&config.user_agent)
        .map_err(|e| ClientError::Config(format!("invalid user agent: {e}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(if stream { EVENT_STREAM } else { JSON }),
    );
    headers.insert(USER_AGENT, user_agent);
    Ok(headers)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.trim_start().starts_with(JSON))
}

fn log_failure(err: ApiError, call_id: uuid::Uuid) -> ClientError {
    log_client_failure(ClientError::Api(err), call_id)
}

fn log_client_failure(err: ClientError, call_id: uuid::Uuid) -> ClientError {
    warn!(
        event = "client.request_failed",
        domain = "client",
        call_id = %call_id,
        code = err.kind().as_str(),
        status = ?err.as_api().and_then(ApiError::status),
        error = %err
    );
    err
}

/// Builder for [`Client`]. The API key is resolved in [`build`](Self::build).
#[derive(Default)]
pub struct ClientBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    transport: TransportSource,
}

impl ClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Uses a caller-supplied transport instead of the shared default.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = TransportSource::Custom(transport);
        self
    }

    /// Builds the client.
    ///
    /// Fails with `AuthenticationError` when no API key was given and
    /// `SEARCHLINK_API_KEY` is unset. No network I/O happens here.
    pub fn build(self) -> Result<Client, ClientError> {
        let api_key = resolve_api_key(self.api_key)?;
        let mut config = ClientConfig::new(api_key);
        if let Some(base_url) = self.base_url {
            config = config.base_url(base_url);
        }
        if let Some(timeout) = self.timeout {
            if timeout.is_zero() {
                return Err(ClientError::Config("timeout must be greater than 0".into()));
            }
            config = config.timeout(timeout);
        }
        if let Some(user_agent) = self.user_agent {
            config = config.user_agent(user_agent);
        }
        Ok(Client {
            inner: Arc::new(ClientInner {
                config,
                transport: self.transport,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::transport::ByteStream;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport that replays canned responses and records requests.
    struct FakeTransport {
        calls: AtomicUsize,
        requests: Mutex<Vec<HttpRequest>>,
        behavior: FakeBehavior,
    }

    enum FakeBehavior {
        Respond {
            status: u16,
            content_type: &'static str,
            chunks: Vec<&'static str>,
        },
        ConnectError,
        Hang,
    }

    impl FakeTransport {
        fn new(behavior: FakeBehavior) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
                behavior,
            })
        }

        fn sse(chunks: Vec<&'static str>) -> Arc<Self> {
            Self::new(FakeBehavior::Respond {
                status: 200,
                content_type: EVENT_STREAM,
                chunks,
            })
        }

        fn json(status: u16, body: &'static str) -> Arc<Self> {
            Self::new(FakeBehavior::Respond {
                status,
                content_type: JSON,
                chunks: vec![body],
            })
        }

        fn last_body(&self) -> Value {
            let requests = self.requests.lock().expect("lock");
            let request = requests.last().expect("request recorded");
            serde_json::from_slice(&request.body).expect("json body")
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for FakeTransport {
        async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().expect("lock").push(request);
            match &self.behavior {
                FakeBehavior::Respond {
                    status,
                    content_type,
                    chunks,
                } => {
                    let mut headers = HeaderMap::new();
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(*content_type));
                    headers.insert("x-request-id", HeaderValue::from_static("req-123"));
                    let items: Vec<Result<Bytes, TransportError>> = chunks
                        .iter()
                        .copied()
                        .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
                        .collect();
                    let body: ByteStream = Box::pin(futures::stream::iter(items));
                    Ok(HttpResponse {
                        status: *status,
                        headers,
                        body: HttpBody::Stream(body),
                    })
                }
                FakeBehavior::ConnectError => {
                    Err(TransportError::Connect("connection refused".into()))
                }
                FakeBehavior::Hang => std::future::pending().await,
            }
        }
    }

    fn client_with(transport: Arc<FakeTransport>) -> Client {
        Client::builder()
            .api_key("test-key")
            .base_url("http://fake.local/")
            .timeout(Duration::from_secs(5))
            .transport(transport)
            .build()
            .expect("client")
    }

    #[tokio::test]
    async fn blocking_success_returns_payload_and_sends_wire_names() {
        let transport = FakeTransport::json(200, r#"{"results":[{"title":"t"}]}"#);
        let client = client_with(transport.clone());
        let value = client
            .search(&SearchRequest::new("rust").param("searchDepth", "basic"))
            .await
            .expect("search");
        assert_eq!(value, json!({"results":[{"title":"t"}]}));

        let body = transport.last_body();
        assert_eq!(body, json!({"query": "rust", "search_depth": "basic"}));
        let requests = transport.requests.lock().expect("lock");
        assert_eq!(requests[0].url, "http://fake.local/search");
        assert_eq!(
            requests[0].headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
            Some("Bearer test-key")
        );
    }

    #[tokio::test]
    async fn blocking_error_marker_is_never_success() {
        let transport = FakeTransport::json(
            200,
            r#"{"detail":{"error_type":"rate_limit","message":"slow down"}}"#,
        );
        let err = client_with(transport)
            .answer(&AnswerRequest::new("q"))
            .await
            .expect_err("error marker");
        let api = err.as_api().expect("api error");
        assert_eq!(api.kind(), ErrorKind::RateLimitError);
        assert_eq!(api.message(), "slow down (request id: req-123)");
        assert_eq!(api.correlation_id(), Some("req-123"));
    }

    #[tokio::test]
    async fn blocking_unparsable_error_body_uses_status() {
        let transport = FakeTransport::json(503, "<html>bad gateway</html>");
        let err = client_with(transport)
            .search(&SearchRequest::new("q"))
            .await
            .expect_err("503");
        assert_eq!(err.kind(), ErrorKind::InternalServerError);
        assert_eq!(
            err.as_api().map(ApiError::message),
            Some("HTTP 503 (request id: req-123)")
        );
    }

    #[tokio::test]
    async fn blocking_invalid_json_on_success_is_generic() {
        let transport = FakeTransport::json(200, "not json");
        let err = client_with(transport)
            .search(&SearchRequest::new("q"))
            .await
            .expect_err("invalid json");
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[tokio::test]
    async fn connect_failure_wraps_as_generic() {
        let err = client_with(FakeTransport::new(FakeBehavior::ConnectError))
            .search(&SearchRequest::new("q"))
            .await
            .expect_err("connect");
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_request_times_out() {
        let client = Client::builder()
            .api_key("k")
            .timeout(Duration::from_millis(250))
            .transport(FakeTransport::new(FakeBehavior::Hang))
            .build()
            .expect("client");
        let err = client
            .answer_stream(&AnswerRequest::new("q"))
            .await
            .expect_err("timeout");
        assert_eq!(
            err,
            ClientError::Timeout {
                after: Duration::from_millis(250)
            }
        );
    }

    #[tokio::test]
    async fn stream_sets_flag_and_decodes_chunked_events() {
        let transport = FakeTransport::sse(vec![
            "data: {\"type\":\"answer\",",
            "\"content\":\"Hel\"}\n\ndata: {\"type\":\"answer\",\"content\":\"lo\"}\r\n\r",
            "\n: keep-alive\n\ndata: {\"type\":\"done\"}\n\n",
        ]);
        let client = client_with(transport.clone());
        let stream = client
            .answer_stream(&AnswerRequest::new("greet"))
            .await
            .expect("stream");
        assert_eq!(stream.correlation_id(), Some("req-123"));
        assert_eq!(stream.collect_text().await.expect("text"), "Hello");

        let body = transport.last_body();
        assert_eq!(body["stream"], json!(true));
        let requests = transport.requests.lock().expect("lock");
        assert_eq!(
            requests[0].headers.get(ACCEPT).and_then(|v| v.to_str().ok()),
            Some(EVENT_STREAM)
        );
    }

    #[tokio::test]
    async fn stream_error_status_fails_before_streaming() {
        let transport = FakeTransport::json(401, r#"{"detail":"Invalid API key"}"#);
        let err = client_with(transport)
            .answer_stream(&AnswerRequest::new("q"))
            .await
            .expect_err("401");
        assert_eq!(err.kind(), ErrorKind::AuthenticationError);
    }

    #[tokio::test]
    async fn stream_json_reply_becomes_single_event() {
        let transport = FakeTransport::json(200, r#"{"type":"answer","content":"whole"}"#);
        let events = client_with(transport)
            .answer_stream(&AnswerRequest::new("q"))
            .await
            .expect("stream")
            .collect_events()
            .await
            .expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].content(), Some("whole"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Client::builder()
            .api_key("k")
            .timeout(Duration::ZERO)
            .build()
            .expect_err("zero timeout");
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn explicit_key_builds_without_network() {
        let client = Client::new(ClientConfig::new("k").base_url("http://localhost:1/"))
            .expect("client");
        assert_eq!(client.config().base_url, "http://localhost:1");
        assert!(!format!("{client:?}").contains("\"k\""));
    }
}

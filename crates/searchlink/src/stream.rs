use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{Fuse, FusedStream};
use futures::StreamExt as _;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::deadline::Deadline;
use crate::errors::{ApiError, ClientError};
use crate::sse::SseDecoder;
use crate::transport::ByteStream;

/// Event type that marks the end of an answer stream.
pub const COMPLETION_EVENT: &str = "done";

/// Handle used to abort a running stream.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The stream drops its connection and yields `ClientError::Cancelled`
    /// as its terminal item.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// One domain event decoded from the stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamEvent {
    data: Value,
}

impl StreamEvent {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// The event's `type` field, when present.
    pub fn event_type(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }

    /// Text carried in the `content` field, when present.
    pub fn content(&self) -> Option<&str> {
        self.data.get("content").and_then(Value::as_str)
    }

    pub fn is_done(&self) -> bool {
        self.event_type() == Some(COMPLETION_EVENT)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }
}

/// Classified form of one decoded event.
#[derive(Debug, PartialEq)]
pub(crate) enum StreamFrame {
    Event(Value),
    Completion(Value),
    Error(ApiError),
}

pub(crate) fn decode_frame(value: Value, correlation_id: Option<&str>) -> StreamFrame {
    match classify(value, None, correlation_id) {
        Ok(value) if value.get("type").and_then(Value::as_str) == Some(COMPLETION_EVENT) => {
            StreamFrame::Completion(value)
        }
        Ok(value) => StreamFrame::Event(value),
        Err(err) => StreamFrame::Error(err),
    }
}

/// Consumption state of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StreamState {
    Open,
    Errored,
    Ended,
}

/// Pulls chunks on demand and turns them into classified events.
struct Pipeline {
    body: Option<ByteStream>,
    decoder: SseDecoder,
    deadline: Deadline,
    abort_rx: watch::Receiver<bool>,
    abort_live: bool,
    correlation_id: Option<String>,
    state: StreamState,
    input_done: bool,
    call_id: uuid::Uuid,
    frames: u64,
}

impl Pipeline {
    async fn next(&mut self) -> Option<Result<StreamEvent, ClientError>> {
        loop {
            if self.state != StreamState::Open {
                return None;
            }
            if *self.abort_rx.borrow() {
                return Some(Err(self.fail(ClientError::Cancelled)));
            }
            if self.deadline.is_expired() {
                return Some(Err(self.fail(self.deadline.expired())));
            }

            if let Some(value) = self.decoder.next_value() {
                return Some(self.deliver(value));
            }
            if self.input_done {
                return match self.decoder.finish() {
                    Some(value) => Some(self.deliver(value)),
                    None => {
                        debug!(
                            event = "stream.ended",
                            domain = "sse",
                            call_id = %self.call_id,
                            frames = self.frames,
                            completed = false
                        );
                        self.close(StreamState::Ended);
                        None
                    }
                };
            }

            match self.pull_chunk().await {
                Ok(Some(chunk)) => self.decoder.push_chunk(&chunk),
                Ok(None) => self.input_done = true,
                Err(err) => return Some(Err(self.fail(err))),
            }
        }
    }

    async fn pull_chunk(&mut self) -> Result<Option<Bytes>, ClientError> {
        let Some(body) = self.body.as_mut() else {
            return Ok(None);
        };
        let deadline = self.deadline;
        loop {
            tokio::select! {
                changed = self.abort_rx.changed(), if self.abort_live => match changed {
                    Ok(()) if *self.abort_rx.borrow() => return Err(ClientError::Cancelled),
                    Ok(()) => continue,
                    Err(_) => {
                        self.abort_live = false;
                        continue;
                    }
                },
                next = deadline.run(body.next()) => {
                    return match next? {
                        Some(Ok(chunk)) => Ok(Some(chunk)),
                        Some(Err(err)) => Err(err.into()),
                        None => Ok(None),
                    };
                }
            }
        }
    }

    fn deliver(&mut self, value: Value) -> Result<StreamEvent, ClientError> {
        self.frames += 1;
        match decode_frame(value, self.correlation_id.as_deref()) {
            StreamFrame::Event(data) => {
                debug!(event = "stream.frame", domain = "sse", call_id = %self.call_id, seq = self.frames);
                Ok(StreamEvent::new(data))
            }
            StreamFrame::Completion(data) => {
                debug!(
                    event = "stream.ended",
                    domain = "sse",
                    call_id = %self.call_id,
                    frames = self.frames,
                    completed = true
                );
                self.close(StreamState::Ended);
                Ok(StreamEvent::new(data))
            }
            StreamFrame::Error(err) => {
                warn!(
                    event = "stream.error_frame",
                    domain = "sse",
                    call_id = %self.call_id,
                    code = err.kind().as_str(),
                    seq = self.frames,
                    error = %err
                );
                self.close(StreamState::Errored);
                Err(ClientError::Api(err))
            }
        }
    }

    fn fail(&mut self, err: ClientError) -> ClientError {
        match &err {
            ClientError::Timeout { after } => warn!(
                event = "stream.timeout",
                domain = "sse",
                call_id = %self.call_id,
                timeout_ms = after.as_millis() as u64,
                frames = self.frames
            ),
            ClientError::Cancelled => debug!(
                event = "stream.cancelled",
                domain = "sse",
                call_id = %self.call_id,
                frames = self.frames
            ),
            other => warn!(
                event = "stream.read_failed",
                domain = "sse",
                call_id = %self.call_id,
                error = %other
            ),
        }
        self.close(StreamState::Errored);
        err
    }

    // Dropping the body releases the connection.
    fn close(&mut self, state: StreamState) {
        self.state = state;
        self.body = None;
    }
}

type EventStream = Pin<Box<dyn futures::Stream<Item = Result<StreamEvent, ClientError>> + Send>>;

/// Lazily decoded event stream returned by streaming calls.
///
/// Yields events in source order. A failure is always the last item:
/// after an `Err` the stream returns `None`. The stream ends without error
/// after the completion event or when the body ends. Polling an ended
/// stream keeps returning `None`.
pub struct FrameStream {
    inner: Fuse<EventStream>,
    abort_handle: AbortHandle,
    correlation_id: Option<String>,
}

impl FrameStream {
    pub(crate) fn new(
        body: ByteStream,
        deadline: Deadline,
        correlation_id: Option<String>,
        call_id: uuid::Uuid,
    ) -> Self {
        let (abort_tx, abort_rx) = watch::channel(false);
        let pipeline = Pipeline {
            body: Some(body),
            decoder: SseDecoder::new(),
            deadline,
            abort_rx,
            abort_live: true,
            correlation_id: correlation_id.clone(),
            state: StreamState::Open,
            input_done: false,
            call_id,
            frames: 0,
        };
        let inner = futures::stream::unfold(pipeline, |mut pipeline| async move {
            let item = pipeline.next().await?;
            Some((item, pipeline))
        });
        let inner: EventStream = Box::pin(inner);
        Self {
            inner: inner.fuse(),
            abort_handle: AbortHandle { tx: abort_tx },
            correlation_id,
        }
    }

    /// Waits for the next event. `None` once the stream has ended.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, ClientError>> {
        self.inner.next().await
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Correlation id reported by the response headers.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Drains the stream into a list of events.
    pub async fn collect_events(mut self) -> Result<Vec<StreamEvent>, ClientError> {
        let mut events = Vec::new();
        while let Some(item) = self.next_event().await {
            events.push(item?);
        }
        Ok(events)
    }

    /// Drains the stream and concatenates the `content` of every event.
    pub async fn collect_text(mut self) -> Result<String, ClientError> {
        let mut text = String::new();
        while let Some(item) = self.next_event().await {
            if let Some(content) = item?.content() {
                text.push_str(content);
            }
        }
        Ok(text)
    }
}

impl futures::Stream for FrameStream {
    type Item = Result<StreamEvent, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl FusedStream for FrameStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl fmt::Debug for FrameStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameStream")
            .field("correlation_id", &self.correlation_id)
            .field("terminated", &self.inner.is_terminated())
            .finish_non_exhaustive()
    }
}

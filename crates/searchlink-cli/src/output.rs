//! Writing results to stdout.

use std::io::{self, Write};

use searchlink::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("writing output failed: {0}")]
    Output(#[from] io::Error),
}

impl CliError {
    /// Short category shown next to the message.
    pub fn label(&self) -> &'static str {
        match self {
            CliError::Client(err) => err.kind().as_str(),
            CliError::Output(_) => "output",
        }
    }
}

pub fn write_json(out: &mut impl Write, value: &serde_json::Value) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(io::Error::from)?;
    writeln!(out)?;
    Ok(())
}

/// Copies streamed answer text to `out` as it arrives.
///
/// A failed write aborts the stream, so a closed pipe stops the download.
pub async fn write_stream(stream: &mut FrameStream, out: &mut impl Write) -> Result<(), CliError> {
    while let Some(event) = stream.next_event().await {
        let event = event?;
        let Some(text) = event.content() else {
            if !event.is_done() {
                tracing::debug!(event = "cli.event_skipped", event_type = ?event.event_type());
            }
            continue;
        };
        if let Err(err) = write!(out, "{text}").and_then(|()| out.flush()) {
            stream.abort_handle().abort();
            return Err(err.into());
        }
    }
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use reqwest::header::HeaderMap;
    use searchlink::TransportError;
    use searchlink::transport::{HttpBody, HttpRequest, HttpResponse, HttpTransport};
    use serde_json::json;
    use std::sync::Arc;

    struct SseTransport(&'static str);

    #[async_trait::async_trait]
    impl HttpTransport for SseTransport {
        async fn execute(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status: 200,
                headers: HeaderMap::new(),
                body: HttpBody::Full(Bytes::from_static(self.0.as_bytes())),
            })
        }
    }

    /// Accepts nothing, like stdout after the reader closed the pipe.
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    async fn open_stream(body: &'static str) -> FrameStream {
        Client::builder()
            .api_key("k")
            .transport(Arc::new(SseTransport(body)))
            .build()
            .expect("client")
            .answer_stream(&AnswerRequest::new("q"))
            .await
            .expect("stream")
    }

    const BODY: &str = concat!(
        "data: {\"type\":\"answer\",\"content\":\"Hel\"}\n\n",
        "data: {\"type\":\"sources\",\"items\":[]}\n\n",
        "data: {\"type\":\"answer\",\"content\":\"lo\"}\n\n",
        "data: {\"type\":\"done\"}\n\n",
    );

    #[tokio::test]
    async fn streamed_text_is_written_in_order() {
        let mut stream = open_stream(BODY).await;
        let mut out = Vec::new();
        write_stream(&mut stream, &mut out).await.expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "Hello\n");
    }

    #[tokio::test]
    async fn write_failure_stops_and_aborts_the_stream() {
        let mut stream = open_stream(BODY).await;
        let err = write_stream(&mut stream, &mut ClosedPipe)
            .await
            .expect_err("broken pipe");
        assert!(matches!(
            &err,
            CliError::Output(source) if source.kind() == io::ErrorKind::BrokenPipe
        ));
        assert_eq!(err.label(), "output");
        assert!(stream.abort_handle().is_aborted());
        assert!(matches!(stream.next_event().await, Some(Err(ClientError::Cancelled))));
    }

    #[tokio::test]
    async fn error_event_is_reported_with_its_kind() {
        let mut stream =
            open_stream("data: {\"type\":\"error\",\"error\":\"missing_query\"}\n\n").await;
        let err = write_stream(&mut stream, &mut Vec::new())
            .await
            .expect_err("error event");
        assert_eq!(err.label(), "invalid_request");
    }

    #[test]
    fn json_is_pretty_printed() {
        let mut out = Vec::new();
        write_json(&mut out, &json!({"results": []})).expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "{\n  \"results\": []\n}\n");
    }

    #[test]
    fn json_write_failure_is_an_output_error() {
        let err = write_json(&mut ClosedPipe, &json!({"a": 1})).expect_err("broken pipe");
        assert!(matches!(err, CliError::Output(_)));
    }
}

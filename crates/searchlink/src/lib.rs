//! Client for a remote search/answer service with blocking and streamed calls.
//!
//! Streaming answers arrive as server-sent events. The body is decoded
//! lazily, one event per pull, and every call runs under a single deadline
//! that also covers consumption of the stream.
//!
//! # Blocking search
//!
//! ```no_run
//! use searchlink::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = Client::from_env()?;
//! let results = client
//!     .search(&SearchRequest::new("rust async streams").max_results(5))
//!     .await?;
//! println!("{results}");
//! # Ok(())
//! # }
//! ```
//!
//! # Streamed answer
//!
//! ```no_run
//! use searchlink::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = Client::builder()
//!     .timeout(std::time::Duration::from_secs(30))
//!     .build()?;
//! let mut stream = client
//!     .answer_stream(&AnswerRequest::new("what is a borrow checker?"))
//!     .await?;
//! while let Some(event) = stream.next_event().await {
//!     if let Some(text) = event?.content() {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Success/failure classification of decoded payloads.
pub mod classify;
/// Client, builder, and call orchestration.
pub mod client;
/// Immutable client configuration.
pub mod config;
/// Per-call deadline.
pub mod deadline;
/// Outbound request body and parameter name transliteration.
pub mod envelope;
/// Public error types.
pub mod errors;
/// Tracing subscriber setup for binaries.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Typed request parameters.
pub mod requests;
/// Server-sent-events decoding.
pub mod sse;
/// Streaming call handle and decoded events.
pub mod stream;
/// HTTP execution seam.
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use errors::{ApiError, ClientError, ErrorKind, TransportError};
pub use requests::{AnswerRequest, SearchRequest};
pub use stream::{AbortHandle, FrameStream, StreamEvent};
pub use transport::{HttpTransport, ReqwestTransport};

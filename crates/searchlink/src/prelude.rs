//! `use searchlink::prelude::*;` brings in the client, its request types,
//! the stream handle and the error types.
pub use crate::{
    AbortHandle, AnswerRequest, ApiError, Client, ClientBuilder, ClientConfig, ClientError,
    ErrorKind, FrameStream, SearchRequest, StreamEvent,
};

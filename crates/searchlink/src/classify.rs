//! Success/failure classification shared by blocking and streaming calls.
//!
//! A payload is first decoded into an [`ErrorShape`] (or found to carry no
//! error signal at all), then the shape is resolved to an [`ApiError`]:
//! explicit `error_type` tag, then HTTP status, then, for streaming frames
//! that carry neither, known substrings of the bare reason text.

use reqwest::header::HeaderMap;
use serde_json::{Map, Value};

use crate::errors::{ApiError, ErrorKind};

/// Field wrapping an error object or text (`{"detail": ...}`).
const ENVELOPE_FIELD: &str = "detail";
const TAG_FIELD: &str = "error_type";
const MESSAGE_FIELD: &str = "message";
const ERROR_FIELD: &str = "error";

/// Response headers checked, in order, for a correlation id.
const CORRELATION_HEADERS: &[&str] = &["x-request-id", "request-id", "x-correlation-id"];

/// Reason substrings that identify an invalid request when a streaming
/// error frame carries no type tag.
const INVALID_REQUEST_REASONS: &[&str] = &[
    "missing_query",
    "missing required field",
    "invalid selection",
    "invalid_request",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ErrorFields {
    pub tag: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
}

/// Decoded error signal of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ErrorShape {
    /// Error object, possibly unwrapped from the `detail` envelope.
    Structured(ErrorFields),
    /// The envelope carried plain text only.
    Text(String),
}

impl ErrorShape {
    fn tag(&self) -> Option<&str> {
        match self {
            ErrorShape::Structured(fields) => fields.tag.as_deref(),
            ErrorShape::Text(_) => None,
        }
    }

    fn message(&self) -> Option<&str> {
        let text = match self {
            ErrorShape::Structured(fields) => {
                fields.message.as_deref().or(fields.error.as_deref())
            }
            ErrorShape::Text(text) => Some(text.as_str()),
        };
        text.map(str::trim).filter(|text| !text.is_empty())
    }
}

/// Classifies a decoded payload.
///
/// `status` is the HTTP status for blocking calls and `None` for individual
/// streaming frames. On success the payload is handed back unchanged.
pub fn classify(
    payload: Value,
    status: Option<u16>,
    correlation_id: Option<&str>,
) -> Result<Value, ApiError> {
    let failed_status = status.is_some_and(|code| code >= 400);
    let shape = match decode_shape(&payload) {
        Some(shape) => shape,
        None if failed_status => ErrorShape::Structured(ErrorFields::default()),
        None => return Ok(payload),
    };
    Err(resolve(&shape, status, correlation_id))
}

/// Decodes the error signal of `payload`, or `None` if it is a success.
pub(crate) fn decode_shape(payload: &Value) -> Option<ErrorShape> {
    let object = payload.as_object()?;
    match object.get(ENVELOPE_FIELD) {
        Some(Value::Object(inner)) => return Some(ErrorShape::Structured(fields_of(inner))),
        Some(Value::String(text)) => return Some(ErrorShape::Text(text.clone())),
        Some(Value::Array(items)) => return Some(ErrorShape::Text(validation_summary(items))),
        Some(Value::Null) | None => {}
        Some(other) => return Some(ErrorShape::Text(other.to_string())),
    }
    if is_error_marked(object) {
        Some(ErrorShape::Structured(fields_of(object)))
    } else {
        None
    }
}

fn is_error_marked(object: &Map<String, Value>) -> bool {
    object.contains_key(TAG_FIELD)
        || object.get("type").and_then(Value::as_str) == Some("error")
        || object.get(ERROR_FIELD).is_some_and(is_error_value)
}

// Falsy values mean "no error".
fn is_error_value(value: &Value) -> bool {
    match value {
        Value::String(text) => !text.trim().is_empty(),
        Value::Object(_) => true,
        Value::Bool(flag) => *flag,
        _ => false,
    }
}

fn fields_of(object: &Map<String, Value>) -> ErrorFields {
    let error = object.get(ERROR_FIELD);
    ErrorFields {
        tag: object
            .get(TAG_FIELD)
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        message: object
            .get(MESSAGE_FIELD)
            .and_then(Value::as_str)
            .or_else(|| error.and_then(|e| e.get(MESSAGE_FIELD)).and_then(Value::as_str))
            .map(ToOwned::to_owned),
        error: error.and_then(Value::as_str).map(ToOwned::to_owned),
    }
}

// `detail: [{"loc": [...], "msg": "..."}]` validation lists.
fn validation_summary(items: &[Value]) -> String {
    let messages: Vec<&str> = items
        .iter()
        .filter_map(|item| item.get("msg").and_then(Value::as_str))
        .collect();
    if messages.is_empty() {
        Value::Array(items.to_vec()).to_string()
    } else {
        messages.join("; ")
    }
}

fn resolve(shape: &ErrorShape, status: Option<u16>, correlation_id: Option<&str>) -> ApiError {
    let reason = shape.message();
    let kind = shape
        .tag()
        .and_then(kind_for_tag)
        .or_else(|| status.map(kind_for_status))
        .unwrap_or_else(|| reason.map_or(ErrorKind::Generic, kind_for_reason));
    let message = match (reason, status) {
        (Some(text), _) => text.to_string(),
        (None, Some(code)) => format!("HTTP {code}"),
        (None, None) => "unknown error".to_string(),
    };
    ApiError::new(kind, message)
        .with_status(status)
        .with_correlation_id(correlation_id)
}

/// Maps an explicit `error_type` tag.
pub fn kind_for_tag(tag: &str) -> Option<ErrorKind> {
    let normalized = tag.trim().to_ascii_lowercase().replace('-', "_");
    let kind = match normalized.as_str() {
        "validation" | "validation_error" | "invalid_request" | "invalid_request_error" => {
            ErrorKind::InvalidRequest
        }
        "authentication" | "authentication_error" | "unauthorized" | "forbidden" => {
            ErrorKind::AuthenticationError
        }
        "provider" | "provider_error" => ErrorKind::ProviderError,
        "rate_limit" | "rate_limit_error" | "rate_limited" => ErrorKind::RateLimitError,
        "internal" | "internal_error" | "internal_server_error" | "server_error"
        | "search_error" | "answer_error" | "upstream_error" => ErrorKind::InternalServerError,
        _ => return None,
    };
    Some(kind)
}

/// Maps an HTTP status when no tag matched.
pub fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::InvalidRequest,
        401 | 403 => ErrorKind::AuthenticationError,
        429 => ErrorKind::RateLimitError,
        code if code >= 500 => ErrorKind::InternalServerError,
        _ => ErrorKind::Generic,
    }
}

fn kind_for_reason(reason: &str) -> ErrorKind {
    let reason = reason.to_ascii_lowercase();
    if INVALID_REQUEST_REASONS
        .iter()
        .any(|needle| reason.contains(needle))
    {
        ErrorKind::InvalidRequest
    } else {
        ErrorKind::Generic
    }
}

/// Reads the first non-empty correlation id header.
pub fn correlation_id(headers: &HeaderMap) -> Option<String> {
    CORRELATION_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    })
}

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::{ApiError, ClientError, ErrorKind};

/// Rewrites a camelCase/PascalCase parameter name to the snake_case wire name.
///
/// Every uppercase ASCII letter after the first character gets a `_`
/// inserted before it and is lowercased. Names already in wire form pass
/// through unchanged.
pub fn to_wire_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (idx, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Outbound JSON object for one call. Built once, serialized once, dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    fields: Map<String, Value>,
}

impl RequestEnvelope {
    /// Serializes caller params into wire form.
    ///
    /// Top-level names are transliterated with [`to_wire_name`] and `null`
    /// fields are omitted. Params must serialize to a JSON object.
    pub fn from_params<P: Serialize + ?Sized>(params: &P) -> Result<Self, ClientError> {
        let value = serde_json::to_value(params).map_err(|e| {
            ApiError::new(
                ErrorKind::InvalidRequest,
                format!("failed to serialize request params: {e}"),
            )
        })?;
        let object = match value {
            Value::Object(object) => object,
            Value::Null => Map::new(),
            other => {
                return Err(ApiError::new(
                    ErrorKind::InvalidRequest,
                    format!("request params must be a JSON object, got {}", json_type(&other)),
                )
                .into());
            }
        };
        let fields = object
            .into_iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(name, value)| (to_wire_name(&name), value))
            .collect();
        Ok(Self { fields })
    }

    /// Sets a field that the client controls (for example `stream`).
    pub(crate) fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn into_body(self) -> Result<Bytes, ClientError> {
        serde_json::to_vec(&Value::Object(self.fields))
            .map(Bytes::from)
            .map_err(|e| {
                ClientError::from(ApiError::new(
                    ErrorKind::InvalidRequest,
                    format!("failed to encode request body: {e}"),
                ))
            })
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn camel_case_is_transliterated() {
        assert_eq!(to_wire_name("maxResults"), "max_results");
        assert_eq!(to_wire_name("includeDomainsList"), "include_domains_list");
        assert_eq!(to_wire_name("Query"), "query");
    }

    #[test]
    fn canonical_names_pass_through() {
        for name in ["query", "max_results", "stream", "search_depth_2"] {
            assert_eq!(to_wire_name(name), name);
            assert_eq!(to_wire_name(&to_wire_name(name)), name);
        }
    }

    #[test]
    fn unset_fields_are_omitted() {
        let envelope = RequestEnvelope::from_params(&json!({
            "query": "rust sse",
            "maxResults": 5,
            "searchDepth": null,
        }))
        .expect("envelope");
        assert_eq!(envelope.get("query"), Some(&json!("rust sse")));
        assert_eq!(envelope.get("max_results"), Some(&json!(5)));
        assert_eq!(envelope.get("search_depth"), None);
        assert_eq!(envelope.get("searchDepth"), None);
    }

    #[test]
    fn nested_values_are_left_untouched() {
        let envelope =
            RequestEnvelope::from_params(&json!({"filterSpec": {"siteName": "docs.rs"}}))
                .expect("envelope");
        assert_eq!(
            envelope.get("filter_spec"),
            Some(&json!({"siteName": "docs.rs"}))
        );
    }

    #[test]
    fn non_object_params_are_rejected() {
        let err = RequestEnvelope::from_params(&json!(["a"])).expect_err("array");
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn body_encodes_client_fields() {
        let mut envelope = RequestEnvelope::from_params(&json!({"query": "q"})).expect("envelope");
        envelope.set("stream", json!(true));
        let body = envelope.into_body().expect("body");
        let decoded: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(decoded, json!({"query": "q", "stream": true}));
    }
}

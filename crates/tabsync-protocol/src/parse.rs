//! Parsing of inbound page messages.
//!
//! Pages occasionally post messages without a `data` object (a bare ping)
//! or with types this coordinator does not know. Both are handled here so
//! that callers only ever see a well-formed [`Request`] or a typed error.

use serde_json::Value;
use thiserror::Error;

use crate::message::Request;

/// Message types understood by [`parse_request_value`].
pub const KNOWN_REQUEST_TYPES: &[&str] =
    &["spe:open", "spe:close", "spe:ping", "spe:update", "spe:send"];

/// Errors that can occur while parsing a page message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The message was not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// The message has no string `type` field.
    #[error("message has no type")]
    MissingType,

    /// The message type is not one this coordinator handles.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The `data` payload did not match the message type.
    #[error("invalid {kind} payload: {reason}")]
    InvalidData { kind: String, reason: String },
}

/// Parses a page message from its JSON text.
pub fn parse_request(text: &str) -> Result<Request, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    parse_request_value(value)
}

/// Parses a page message from an already decoded JSON value.
pub fn parse_request_value(mut value: Value) -> Result<Request, ProtocolError> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProtocolError::MissingType)?;

    if !KNOWN_REQUEST_TYPES.contains(&kind.as_str()) {
        return Err(ProtocolError::UnknownType(kind));
    }

    if let Some(object) = value.as_object_mut() {
        let missing = object.get("data").map_or(true, Value::is_null);
        if missing {
            object.insert("data".to_string(), Value::Object(serde_json::Map::new()));
        }
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidData {
        kind,
        reason: e.to_string(),
    })
}

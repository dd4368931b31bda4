use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::payload::Payload;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Text,
    Form,
    Other,
    Missing,
}

impl ContentKind {
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return ContentKind::Missing;
        };
        let media = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if media.is_empty() {
            ContentKind::Missing
        } else if media == "application/json" || media.ends_with("+json") {
            ContentKind::Json
        } else if media == "application/x-www-form-urlencoded" {
            ContentKind::Form
        } else if media.starts_with("text/") {
            ContentKind::Text
        } else {
            ContentKind::Other
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RawBody {
    Text(String),
    Bytes(Bytes),
    Structured(Map<String, Value>),
}

impl RawBody {
    pub fn from_transport(kind: ContentKind, body: Bytes) -> Self {
        match kind {
            ContentKind::Form => match std::str::from_utf8(&body) {
                // JSON sent with a form type; let the text sniff decide.
                Ok(text) if text.trim_start().starts_with('{') => {
                    RawBody::Text(text.to_string())
                }
                _ => match serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body) {
                    Ok(pairs) => RawBody::Structured(
                        pairs
                            .into_iter()
                            .map(|(key, value)| (key, Value::String(value)))
                            .collect(),
                    ),
                    Err(_) => RawBody::Bytes(body),
                },
            },
            ContentKind::Json | ContentKind::Text => match String::from_utf8(body.to_vec()) {
                Ok(text) => RawBody::Text(text),
                Err(_) => RawBody::Bytes(body),
            },
            ContentKind::Other | ContentKind::Missing => RawBody::Bytes(body),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeFailure {
    #[error("request body is empty")]
    Empty,
    #[error("JSON object has no fields")]
    EmptyObject,
    #[error("malformed JSON: {0}")]
    Malformed(String),
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("body is not valid UTF-8")]
    InvalidUtf8,
    #[error("body is plain text, not a JSON object")]
    Unstructured,
}

impl DecodeFailure {
    pub fn code(&self) -> &'static str {
        match self {
            DecodeFailure::Empty => "empty_body",
            DecodeFailure::EmptyObject => "empty_object",
            DecodeFailure::Malformed(_) => "malformed_json",
            DecodeFailure::NotAnObject(_) => "not_an_object",
            DecodeFailure::InvalidUtf8 => "invalid_utf8",
            DecodeFailure::Unstructured => "unstructured_text",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedBody {
    pub payload: Payload,
    pub structured: bool,
    pub failure: Option<DecodeFailure>,
}

impl DecodedBody {
    fn object(fields: Map<String, Value>) -> Self {
        if fields.is_empty() {
            return Self::failed(DecodeFailure::EmptyObject);
        }
        Self {
            payload: Payload::new(fields),
            structured: true,
            failure: None,
        }
    }

    fn failed(failure: DecodeFailure) -> Self {
        Self {
            payload: Payload::default(),
            structured: false,
            failure: Some(failure),
        }
    }
}

pub fn decode(body: RawBody, kind: ContentKind) -> DecodedBody {
    let declared_json = kind == ContentKind::Json;
    match body {
        RawBody::Structured(fields) => DecodedBody::object(fields),
        RawBody::Text(text) => decode_text(&text, declared_json),
        RawBody::Bytes(bytes) => match std::str::from_utf8(&bytes) {
            Ok(text) => decode_text(text, declared_json),
            Err(_) => DecodedBody::failed(DecodeFailure::InvalidUtf8),
        },
    }
}

fn decode_text(text: &str, declared_json: bool) -> DecodedBody {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DecodedBody::failed(DecodeFailure::Empty);
    }

    if declared_json {
        return match parse_object(trimmed) {
            Ok(fields) => DecodedBody::object(fields),
            Err(failure) => DecodedBody::failed(failure),
        };
    }

    // Mislabelled JSON: only trust it if it actually parses.
    if trimmed.starts_with('{') {
        if let Ok(fields) = parse_object(trimmed) {
            return DecodedBody::object(fields);
        }
    }

    DecodedBody::failed(DecodeFailure::Unstructured)
}

fn parse_object(text: &str) -> Result<Map<String, Value>, DecodeFailure> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(DecodeFailure::NotAnObject(json_kind(&other))),
        Err(err) => Err(DecodeFailure::Malformed(err.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

//! Event algebra for the framing engine
//!
//! Everything that crosses the `Connection` boundary is an [`Event`]: header
//! events carry the parsed header block, data events carry one body chunk,
//! and `MessageEnd`/`Close` are pure signals. [`Event::to_data`] turns an
//! event into its wire bytes.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FrameError, Result};

/// Content type assumed when the peer does not send one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/vscode-jsonrpc; charset=utf-8";

/// Parsed header block of one framed message.
///
/// `Content-Length` is required; `Content-Type` falls back to
/// [`DEFAULT_CONTENT_TYPE`]. Unrecognized fields are dropped with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(rename = "Content-Length")]
    pub content_length: usize,
    #[serde(rename = "Content-Type", default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

impl Header {
    pub fn new(content_length: usize) -> Self {
        Self {
            content_length,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }

    pub fn with_content_type(content_length: usize, content_type: impl Into<String>) -> Self {
        Self {
            content_length,
            content_type: content_type.into(),
        }
    }

    /// Build a header from parsed `(name, value)` pairs.
    ///
    /// Fails when `Content-Length` is missing or not an unsigned integer.
    pub fn from_fields(fields: &[(String, String)]) -> Result<Self> {
        let mut content_length = None;
        let mut content_type = None;
        for (name, value) in fields {
            match name.as_str() {
                "Content-Length" => {
                    let parsed = value.parse::<usize>().map_err(|_| {
                        FrameError::MalformedHeader(format!(
                            "Content-Length is not an unsigned integer: {value:?}"
                        ))
                    })?;
                    content_length = Some(parsed);
                }
                "Content-Type" => content_type = Some(value.clone()),
                other => {
                    tracing::warn!(field = other, "ignoring unrecognized header field");
                }
            }
        }
        let content_length = content_length.ok_or_else(|| {
            FrameError::MalformedHeader("missing required Content-Length field".to_string())
        })?;
        Ok(Self {
            content_length,
            content_type: content_type.unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
        })
    }

    /// Serialize to the wire: one `Name: Value\r\n` line per field,
    /// `Content-Length` first, then the terminating blank line.
    pub fn to_data(&self) -> Vec<u8> {
        format!(
            "Content-Length: {}\r\nContent-Type: {}\r\n\r\n",
            self.content_length, self.content_type
        )
        .into_bytes()
    }
}

/// One body chunk in whichever shape the caller has it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Raw bytes, passed through untouched.
    Bytes(Bytes),
    /// Text, encoded as UTF-8.
    Text(String),
    /// Structured value, serialized as UTF-8 JSON.
    Json(Value),
}

impl Payload {
    /// Wire bytes for this chunk, using the default JSON encoder.
    pub fn to_data(&self) -> Result<Bytes> {
        self.to_data_with(|value| serde_json::to_vec(value))
    }

    /// Wire bytes for this chunk; `encode` overrides the JSON encoder for
    /// the [`Payload::Json`] shape (the other shapes never invoke it).
    pub fn to_data_with<F>(&self, encode: F) -> Result<Bytes>
    where
        F: FnOnce(&Value) -> serde_json::Result<Vec<u8>>,
    {
        match self {
            Payload::Bytes(data) => Ok(data.clone()),
            Payload::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Payload::Json(value) => Ok(Bytes::from(encode(value)?)),
        }
    }
}

impl From<Bytes> for Payload {
    fn from(data: Bytes) -> Self {
        Payload::Bytes(data)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(data: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(data))
    }
}

impl From<&[u8]> for Payload {
    fn from(data: &[u8]) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(data))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

/// Everything that can happen on a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A request header arrived (server side).
    RequestReceived(Header),
    /// A request header is being sent (client side).
    RequestSent(Header),
    /// A response header arrived (client side).
    ResponseReceived(Header),
    /// A response header is being sent (server side).
    ResponseSent(Header),
    /// One chunk of the peer's body arrived.
    DataReceived(Payload),
    /// One chunk of our body is being sent.
    DataSent(Payload),
    /// The current body is complete.
    MessageEnd,
    /// Connection termination.
    Close,
}

impl Event {
    /// Discriminant used by the state machine.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::RequestReceived(_) => EventKind::RequestReceived,
            Event::RequestSent(_) => EventKind::RequestSent,
            Event::ResponseReceived(_) => EventKind::ResponseReceived,
            Event::ResponseSent(_) => EventKind::ResponseSent,
            Event::DataReceived(_) => EventKind::DataReceived,
            Event::DataSent(_) => EventKind::DataSent,
            Event::MessageEnd => EventKind::MessageEnd,
            Event::Close => EventKind::Close,
        }
    }

    /// The header block, for the four header-carrying variants.
    pub fn header(&self) -> Option<&Header> {
        match self {
            Event::RequestReceived(h)
            | Event::RequestSent(h)
            | Event::ResponseReceived(h)
            | Event::ResponseSent(h) => Some(h),
            _ => None,
        }
    }

    /// Serialize this event to wire bytes.
    ///
    /// Header events emit their header block, data events their chunk, and
    /// the two signal events emit nothing.
    pub fn to_data(&self) -> Result<Bytes> {
        match self {
            Event::RequestReceived(h)
            | Event::RequestSent(h)
            | Event::ResponseReceived(h)
            | Event::ResponseSent(h) => Ok(Bytes::from(h.to_data())),
            Event::DataReceived(p) | Event::DataSent(p) => p.to_data(),
            Event::MessageEnd | Event::Close => Ok(Bytes::new()),
        }
    }

    /// Like [`Event::to_data`], with a caller-supplied JSON encoder for
    /// structured payloads.
    pub fn to_data_with<F>(&self, encode: F) -> Result<Bytes>
    where
        F: FnOnce(&Value) -> serde_json::Result<Vec<u8>>,
    {
        match self {
            Event::DataReceived(p) | Event::DataSent(p) => p.to_data_with(encode),
            other => other.to_data(),
        }
    }
}

/// Variant tag of an [`Event`], used as the state-machine input symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RequestReceived,
    RequestSent,
    ResponseReceived,
    ResponseSent,
    DataReceived,
    DataSent,
    MessageEnd,
    Close,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::RequestReceived => "RequestReceived",
            EventKind::RequestSent => "RequestSent",
            EventKind::ResponseReceived => "ResponseReceived",
            EventKind::ResponseSent => "ResponseSent",
            EventKind::DataReceived => "DataReceived",
            EventKind::DataSent => "DataSent",
            EventKind::MessageEnd => "MessageEnd",
            EventKind::Close => "Close",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn parse_header_block(data: &[u8]) -> Vec<(String, String)> {
        let text = std::str::from_utf8(data).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        // header block ends with a blank line, so the split yields two
        // trailing empty strings
        assert_eq!(lines[lines.len() - 1], "");
        assert_eq!(lines[lines.len() - 2], "");
        lines[..lines.len() - 2]
            .iter()
            .map(|line| {
                let (name, value) = line.split_once(": ").unwrap();
                (name.to_string(), value.to_string())
            })
            .collect()
    }

    #[rstest]
    #[case::request_received(Event::RequestReceived(Header::new(100)))]
    #[case::request_sent(Event::RequestSent(Header::new(100)))]
    #[case::response_received(Event::ResponseReceived(Header::new(100)))]
    #[case::response_sent(Event::ResponseSent(Header::new(100)))]
    fn test_header_event_to_data(#[case] event: Event) {
        let data = event.to_data().unwrap();
        let fields = parse_header_block(&data);
        assert_eq!(
            fields,
            vec![
                ("Content-Length".to_string(), "100".to_string()),
                ("Content-Type".to_string(), DEFAULT_CONTENT_TYPE.to_string()),
            ]
        );
    }

    #[test]
    fn test_header_field_order_is_stable() {
        let data = Header::new(42).to_data();
        let text = String::from_utf8(data).unwrap();
        assert!(text.starts_with("Content-Length: 42\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_header_from_fields_defaults_content_type() {
        let fields = vec![("Content-Length".to_string(), "30".to_string())];
        let header = Header::from_fields(&fields).unwrap();
        assert_eq!(header.content_length, 30);
        assert_eq!(header.content_type, DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_header_from_fields_keeps_explicit_content_type() {
        let fields = vec![
            ("Content-Length".to_string(), "30".to_string()),
            ("Content-Type".to_string(), "text/plain".to_string()),
        ];
        let header = Header::from_fields(&fields).unwrap();
        assert_eq!(header.content_type, "text/plain");
    }

    #[test]
    fn test_header_from_fields_missing_length_fails() {
        let fields = vec![("Content-Type".to_string(), "text/plain".to_string())];
        let err = Header::from_fields(&fields).unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeader(_)));
    }

    #[test]
    fn test_header_from_fields_bad_length_fails() {
        let fields = vec![("Content-Length".to_string(), "-1".to_string())];
        let err = Header::from_fields(&fields).unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeader(_)));
    }

    #[test]
    fn test_header_from_fields_drops_unknown_field() {
        let fields = vec![
            ("Content-Length".to_string(), "30".to_string()),
            ("X-Custom".to_string(), "1".to_string()),
        ];
        let header = Header::from_fields(&fields).unwrap();
        assert_eq!(header, Header::new(30));
    }

    #[rstest]
    #[case::data_received(true)]
    #[case::data_sent(false)]
    fn test_data_event_payload_shapes(#[case] received: bool) {
        let wrap = |payload: Payload| {
            if received {
                Event::DataReceived(payload)
            } else {
                Event::DataSent(payload)
            }
        };

        // raw bytes pass through
        let event = wrap(Payload::from(b"test_data".as_slice()));
        assert_eq!(event.to_data().unwrap(), Bytes::from_static(b"test_data"));

        // text encodes UTF-8
        let event = wrap(Payload::from("test_data"));
        assert_eq!(event.to_data().unwrap(), Bytes::from_static(b"test_data"));

        // structured values serialize as JSON
        let event = wrap(Payload::from(json!({"method": "didOpen"})));
        let decoded: Value = serde_json::from_slice(&event.to_data().unwrap()).unwrap();
        assert_eq!(decoded, json!({"method": "didOpen"}));
    }

    #[test]
    fn test_data_event_custom_encoder() {
        let event = Event::DataSent(Payload::Json(json!({"n": 1})));
        let data = event
            .to_data_with(|value| {
                let mut out = serde_json::to_vec(value)?;
                out.push(b'\n');
                Ok(out)
            })
            .unwrap();
        assert_eq!(data, Bytes::from_static(b"{\"n\":1}\n"));
    }

    #[rstest]
    #[case::message_end(Event::MessageEnd)]
    #[case::close(Event::Close)]
    fn test_signal_events_have_no_data(#[case] event: Event) {
        assert_eq!(event.to_data().unwrap(), Bytes::new());
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(Event::MessageEnd.kind().to_string(), "MessageEnd");
        assert_eq!(
            Event::RequestSent(Header::new(1)).kind().to_string(),
            "RequestSent"
        );
    }
}

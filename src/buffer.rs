//! Incremental receive buffer
//!
//! Accumulates whatever bytes the caller has read off the wire and extracts
//! the header block and body bytes from them. The header/body separator may
//! straddle any number of appends; extraction only succeeds once the full
//! `\r\n\r\n` has arrived.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{FrameError, Result};

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Growing inbound byte buffer with header/body extraction.
///
/// After the header is split off, `raw` holds only body bytes and
/// `body_pointer` marks how far [`ReceiveBuffer::try_extract_data`] has
/// handed them out.
#[derive(Debug, Default)]
pub struct ReceiveBuffer {
    raw: BytesMut,
    header_bytes: Option<Bytes>,
    body_pointer: usize,
}

impl ReceiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes read off the wire. Never fails.
    pub fn append(&mut self, data: &[u8]) {
        self.raw.extend_from_slice(data);
    }

    /// Try to split the header block off the front of the buffer.
    ///
    /// Returns `None` until the `\r\n\r\n` separator has fully arrived.
    /// Once the header has been split off, further calls re-parse it and
    /// return the same field list. The separator itself is discarded; any
    /// bytes after it stay in the buffer as body bytes.
    pub fn try_extract_header(&mut self) -> Result<Option<Vec<(String, String)>>> {
        if let Some(header) = &self.header_bytes {
            return parse_header_fields(header).map(Some);
        }
        let Some(at) = self
            .raw
            .windows(HEADER_SEPARATOR.len())
            .position(|window| window == HEADER_SEPARATOR)
        else {
            return Ok(None);
        };
        // Split off the header, drop the separator; the tail stays put as
        // unread body bytes.
        let header = self.raw.split_to(at).freeze();
        self.raw.advance(HEADER_SEPARATOR.len());
        let fields = parse_header_fields(&header)?;
        self.header_bytes = Some(header);
        Ok(Some(fields))
    }

    /// Hand out the body bytes that arrived since the last call.
    ///
    /// Returns `None` when no new bytes are buffered. Fails if the header
    /// has not been extracted yet.
    pub fn try_extract_data(&mut self) -> Result<Option<Bytes>> {
        if self.header_bytes.is_none() {
            return Err(FrameError::Invariant(
                "header is not extracted yet; call try_extract_header() first".to_string(),
            ));
        }
        if self.body_pointer == self.raw.len() {
            return Ok(None);
        }
        let data = Bytes::copy_from_slice(&self.raw[self.body_pointer..]);
        self.body_pointer = self.raw.len();
        Ok(Some(data))
    }

    /// Whether the header block has been split off.
    pub fn header_extracted(&self) -> bool {
        self.header_bytes.is_some()
    }

    /// Reset to the initial empty state.
    pub fn clear(&mut self) {
        self.raw.clear();
        self.header_bytes = None;
        self.body_pointer = 0;
    }

    #[cfg(test)]
    pub(crate) fn raw(&self) -> &[u8] {
        &self.raw
    }
}

/// Decode a header block: ASCII text, `\r\n`-separated lines, each split
/// exactly once on `": "`. No whitespace trimming beyond that split.
fn parse_header_fields(header: &[u8]) -> Result<Vec<(String, String)>> {
    if !header.is_ascii() {
        return Err(FrameError::MalformedHeader(
            "header block contains non-ASCII bytes".to_string(),
        ));
    }
    // is_ascii() makes this infallible
    let text = std::str::from_utf8(header)
        .map_err(|e| FrameError::MalformedHeader(e.to_string()))?;
    text.split("\r\n")
        .map(|line| {
            let (name, value) = line.split_once(": ").ok_or_else(|| {
                FrameError::MalformedHeader(format!("header line without \": \": {line:?}"))
            })?;
            Ok((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_append_accumulates() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"asdf");
        assert_eq!(buffer.raw(), b"asdf");
        buffer.append(b"ghjk");
        assert_eq!(buffer.raw(), b"asdfghjk");
    }

    #[test]
    fn test_extract_header() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"Content-Length: 123\r\n\r\n");
        let header = buffer.try_extract_header().unwrap();
        assert_eq!(header, Some(fields(&[("Content-Length", "123")])));
    }

    #[test]
    fn test_extract_header_separator_straddles_appends() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"Content-Length: 123\r\n\r");
        assert_eq!(buffer.try_extract_header().unwrap(), None);

        buffer.append(b"\n");
        let header = buffer.try_extract_header().unwrap();
        assert_eq!(header, Some(fields(&[("Content-Length", "123")])));
    }

    #[test]
    fn test_extract_header_is_idempotent() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"Content-Length: 5\r\nContent-Type: text/plain\r\n\r\n");
        let first = buffer.try_extract_header().unwrap();
        let second = buffer.try_extract_header().unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            Some(fields(&[
                ("Content-Length", "5"),
                ("Content-Type", "text/plain"),
            ]))
        );
    }

    #[test]
    fn test_extract_header_keeps_early_body_bytes() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"Content-Length: 9\r\n\r\nbody here");
        buffer.try_extract_header().unwrap().unwrap();
        assert_eq!(buffer.raw(), b"body here");
        let data = buffer.try_extract_data().unwrap();
        assert_eq!(data, Some(Bytes::from_static(b"body here")));
    }

    #[test]
    fn test_extract_data_in_arrival_order() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"Content-Length: 123\r\n\r\n");
        buffer.try_extract_header().unwrap();

        buffer.append(b"first data");
        assert_eq!(
            buffer.try_extract_data().unwrap(),
            Some(Bytes::from_static(b"first data"))
        );
        // drained: nothing new to hand out
        assert_eq!(buffer.try_extract_data().unwrap(), None);

        buffer.append(b"second data");
        assert_eq!(
            buffer.try_extract_data().unwrap(),
            Some(Bytes::from_static(b"second data"))
        );
    }

    #[test]
    fn test_extract_data_before_header_fails() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"Content-Length: 123\r\n\r\n");
        let err = buffer.try_extract_data().unwrap_err();
        assert!(matches!(err, FrameError::Invariant(_)));
    }

    #[test]
    fn test_extract_data_with_no_body_yet() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"Content-Length: 123\r\n\r\n");
        buffer.try_extract_header().unwrap();
        assert_eq!(buffer.try_extract_data().unwrap(), None);
    }

    #[test]
    fn test_header_line_without_separator_is_fatal() {
        let mut buffer = ReceiveBuffer::new();
        // ":" without the following space does not count
        buffer.append(b"Content-Length:123\r\n\r\n");
        let err = buffer.try_extract_header().unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeader(_)));
    }

    #[test]
    fn test_empty_header_block_is_fatal() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"\r\n\r\n");
        let err = buffer.try_extract_header().unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeader(_)));
    }

    #[test]
    fn test_non_ascii_header_is_fatal() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append("Content-Length: 1\u{fe}\r\n\r\n".as_bytes());
        let err = buffer.try_extract_header().unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeader(_)));
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut buffer = ReceiveBuffer::new();
        buffer.append(b"Content-Length: 3\r\n\r\nabc");
        buffer.try_extract_header().unwrap();
        buffer.try_extract_data().unwrap();

        buffer.clear();
        assert!(!buffer.header_extracted());
        assert_eq!(buffer.raw(), b"");
        assert_eq!(buffer.try_extract_header().unwrap(), None);
    }
}

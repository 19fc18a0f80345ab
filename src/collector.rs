//! Bounded byte accumulator
//!
//! LSP frames are length-prefixed, so any overrun can and should be caught
//! at the earliest possible write. The collector is the single enforcement
//! point for the `Content-Length` contract on each direction of a
//! `Connection`.

use bytes::BytesMut;

use crate::error::{FrameError, Result};

/// Byte accumulator with a declared capacity.
///
/// Lifecycle: created empty, `set_length` exactly once, `append` while the
/// remaining capacity allows, `clear` to start over. `full` reports whether
/// the declared length has been reached.
#[derive(Debug, Default)]
pub struct FixedLengthCollector {
    remain: usize,
    data: BytesMut,
    length_set: bool,
}

impl FixedLengthCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the total number of bytes this collector will hold.
    ///
    /// Fails if a length is already declared; `clear` first to reuse.
    pub fn set_length(&mut self, length: usize) -> Result<()> {
        if self.length_set {
            return Err(FrameError::Invariant(
                "collector length is already set; call clear() before setting it again".to_string(),
            ));
        }
        self.remain = length;
        self.length_set = true;
        Ok(())
    }

    /// Append bytes, checked against the remaining capacity.
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        if !self.length_set {
            return Err(FrameError::Invariant(
                "collector has no length; call set_length() first".to_string(),
            ));
        }
        if data.len() > self.remain {
            return Err(FrameError::Invariant(format!(
                "too much data: got {} bytes with only {} remaining",
                data.len(),
                self.remain
            )));
        }
        self.remain -= data.len();
        self.data.extend_from_slice(data);
        Ok(())
    }

    /// Reset to the initial empty state. Idempotent.
    pub fn clear(&mut self) {
        self.remain = 0;
        self.data.clear();
        self.length_set = false;
    }

    /// True once every declared byte has been appended.
    pub fn full(&self) -> bool {
        self.length_set && self.remain == 0
    }

    /// Bytes accumulated so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes still owed before the collector is full.
    pub fn remain(&self) -> usize {
        self.remain
    }

    pub fn length_set(&self) -> bool {
        self.length_set
    }

    /// The accumulated bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

use bytes::{Buf, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::codec::DELIMITER;
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Default limit on bytes buffered without seeing a delimiter: 64 KiB.
pub const DEFAULT_MAX_BUFFERED: usize = 64 * 1024;

/// Splits an arbitrary byte stream into still-stuffed frame candidates.
///
/// Transport reads can end anywhere, so bytes are buffered until a
/// delimiter arrives. Each delimiter closes one candidate; the candidate and
/// its delimiter are then removed from the buffer.
#[derive(Debug)]
pub struct FrameAccumulator {
    buf: BytesMut,
    // Bytes of `buf` already known to hold no delimiter.
    scanned: usize,
    max_buffered: usize,
}

impl FrameAccumulator {
    /// Create an accumulator with the default buffer limit.
    pub fn new() -> Self {
        Self::with_max_buffered(DEFAULT_MAX_BUFFERED)
    }

    /// Create an accumulator that discards its buffer once it grows past
    /// `max_buffered` bytes without a delimiter.
    pub fn with_max_buffered(max_buffered: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY.min(max_buffered.max(1))),
            scanned: 0,
            max_buffered,
        }
    }

    /// Append freshly read transport bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Split off the next candidate, if a delimiter has been buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed. When the buffer exceeds
    /// the limit with no delimiter in it, the buffered bytes are discarded and
    /// [`FrameError::Overflow`] is returned; the accumulator stays usable.
    pub fn next_candidate(&mut self) -> Result<Option<Bytes>> {
        if let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == DELIMITER) {
            let candidate = self.buf.split_to(self.scanned + offset).freeze();
            self.buf.advance(1);
            self.scanned = 0;
            trace!(len = candidate.len(), "frame candidate split");
            return Ok(Some(candidate));
        }
        self.scanned = self.buf.len();

        if self.buf.len() > self.max_buffered {
            let discarded = self.buf.len();
            self.buf.clear();
            self.scanned = 0;
            warn!(
                discarded,
                max = self.max_buffered,
                "no delimiter in buffered bytes; discarding"
            );
            return Err(FrameError::Overflow {
                discarded,
                max: self.max_buffered,
            });
        }

        Ok(None)
    }

    /// Append `bytes` and return every candidate completed by them.
    ///
    /// Overflow is handled by discarding, as in [`Self::next_candidate`].
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Bytes> {
        self.extend(bytes);
        let mut candidates = Vec::new();
        loop {
            match self.next_candidate() {
                Ok(Some(candidate)) => candidates.push(candidate),
                Ok(None) => break,
                Err(_) => continue,
            }
        }
        candidates
    }

    /// Bytes currently buffered (an incomplete candidate).
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl Default for FrameAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

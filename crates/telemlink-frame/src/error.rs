/// Errors that can occur while encoding or decoding a frame.
///
/// None of these are fatal to a stream: the offending frame is dropped and
/// reading continues at the next delimiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The byte-stuffing structure is inconsistent.
    #[error("malformed frame ({len} stuffed bytes)")]
    Malformed { len: usize },

    /// The frame decodes to (or would encode) a zero-length payload.
    #[error("empty frame")]
    Empty,

    /// The accumulator hit its buffer limit without seeing a delimiter.
    #[error("no delimiter within {max} buffered bytes ({discarded} discarded)")]
    Overflow { discarded: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;

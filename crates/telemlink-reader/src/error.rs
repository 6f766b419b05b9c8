use telemlink_schema::PrimitiveType;
use telemlink_transport::TransportError;

use crate::state::PipelineState;

/// Errors turning a payload into values, or values into a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Payload length differs from the schema's byte size.
    #[error("payload size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Wrong number of channels or values handed to the encoder.
    #[error("channel {channel}: expected {expected} values, got {actual}")]
    ValueCount {
        channel: usize,
        expected: usize,
        actual: usize,
    },

    /// A value cannot be represented in its field's primitive type.
    #[error("channel {channel}, value {index}: not representable as {primitive}")]
    ValueType {
        channel: usize,
        index: usize,
        primitive: PrimitiveType,
    },
}

/// The record queue was full when the reader tried to enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("record queue overrun (capacity {capacity}); consumer is draining too slowly")]
pub struct QueueOverrunError {
    pub capacity: usize,
}

/// Errors surfaced by the reader pipeline to its owner.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The transport failed while connecting.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The consumer fell behind and the session was ended.
    #[error(transparent)]
    QueueOverrun(#[from] QueueOverrunError),

    /// The transport was lost while streaming. `elapsed` is the carry-over a
    /// reconnect continues from.
    #[error("disconnected after {elapsed:.3}s: {source}")]
    Disconnected {
        elapsed: f64,
        source: TransportError,
    },

    /// The requested transition is not valid from the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    /// The reader thread could not be started.
    #[error("failed to spawn reader thread: {0}")]
    Spawn(std::io::Error),

    /// The reader thread panicked.
    #[error("reader thread panicked")]
    Panicked,
}

pub type Result<T> = std::result::Result<T, PipelineError>;

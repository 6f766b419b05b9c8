use std::time::Duration;

use telemlink_frame::DEFAULT_MAX_BUFFERED;

use crate::clock::ClockKind;
use crate::queue::DEFAULT_QUEUE_CAPACITY;

/// Default bytes requested per transport read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Default transport read timeout: 1 second. Bounds stop latency.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Reader pipeline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Records held before the reader reports an overrun.
    pub queue_capacity: usize,
    /// Bytes requested per transport read.
    pub read_chunk_size: usize,
    /// Applied to the transport on connect.
    pub read_timeout: Duration,
    /// Bytes buffered without a delimiter before they are discarded.
    pub max_buffered_bytes: usize,
    pub clock: ClockKind,
    /// Send START on connect and STOP on shutdown.
    pub send_control_tokens: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED,
            clock: ClockKind::Monotonic,
            send_control_tokens: true,
        }
    }
}

//! Turns a framed telemetry byte stream into timestamped records.
//!
//! A [`ReaderPipeline`] owns a [`Transport`](telemlink_transport::Transport)
//! and one reader thread that loops read, accumulate, split, decode and
//! enqueue. Corrupt frames are counted and skipped. A lost transport ends
//! the session but not the pipeline: [`ReaderPipeline::reconnect`] resumes
//! on a new transport and record timestamps continue from where the last
//! session left off.
//!
//! Records land in a bounded [`RecordQueue`]. The reader never blocks on
//! it; a full queue ends the session with [`QueueOverrunError`].

pub mod clock;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod record;
mod session;
pub mod state;
pub mod stats;

pub use clock::{ClockKind, SessionClock};
pub use config::PipelineConfig;
pub use error::{DecodeError, PipelineError, QueueOverrunError, Result};
pub use pipeline::ReaderPipeline;
pub use queue::{RecordQueue, DEFAULT_QUEUE_CAPACITY};
pub use record::{decode_record, decode_values, encode_values, Record, RecordDecoder, Value};
pub use state::PipelineState;
pub use stats::StatsSnapshot;

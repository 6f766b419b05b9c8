//! Delimiter framing for telemetry streams.
//!
//! Every frame on the wire is a COBS-stuffed payload followed by a single
//! `0x00` delimiter. The stuffed bytes never contain the delimiter, so a
//! receiver can always resynchronize at the next `0x00` after corruption:
//! a bad frame costs exactly one frame.
//!
//! - [`codec`] encodes and decodes single frames.
//! - [`accumulator`] splits a raw byte stream into frame candidates.
//! - [`control`] holds the raw START/STOP tokens sent to the device.

pub mod accumulator;
pub mod codec;
pub mod control;
pub mod error;

pub use accumulator::{FrameAccumulator, DEFAULT_MAX_BUFFERED};
pub use codec::{decode_frame, encode_frame, encode_frame_to_vec, max_encoded_len, DELIMITER};
pub use control::{ControlToken, START_TOKEN, STOP_TOKEN};
pub use error::{FrameError, Result};

//! Schema-driven telemetry receiver.
//!
//! telemlink reads COBS-framed binary telemetry from a serial line or a UDP
//! socket, decodes each frame against a runtime-loaded schema and hands
//! timestamped records to a consumer through a bounded queue.
//!
//! # Crate Structure
//!
//! - [`transport`]: Byte-oriented duplex transports (serial, UDP)
//! - [`frame`]: COBS framing, stream accumulation and control tokens
//! - [`schema`]: Wire-layout schema and its YAML source
//! - [`reader`]: Record decoding and the reconnecting reader pipeline

/// Re-export transport types.
pub mod transport {
    pub use telemlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use telemlink_frame::*;
}

/// Re-export schema types.
pub mod schema {
    pub use telemlink_schema::*;
}

/// Re-export reader types.
pub mod reader {
    pub use telemlink_reader::*;
}

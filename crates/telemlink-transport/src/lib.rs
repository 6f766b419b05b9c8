//! Byte-oriented duplex transports.
//!
//! Provides a unified interface over the links a telemetry device is
//! reached through:
//! - Serial ports (feature `serial`, on by default)
//! - UDP datagrams
//!
//! This is the lowest layer of telemlink. The reader pipeline only ever
//! sees the [`Transport`] trait.

pub mod error;
pub mod traits;
pub mod udp;

#[cfg(feature = "serial")]
pub mod serial;

pub use error::{Result, TransportError};
pub use traits::Transport;
pub use udp::{UdpConfig, UdpTransport};

#[cfg(feature = "serial")]
pub use serial::{
    find_port, list_ports, PortInfo, SerialConfig, SerialTransport, DEFAULT_PORT_PATTERN,
};

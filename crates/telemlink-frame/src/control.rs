//! Out-of-band control tokens.
//!
//! Tokens are written raw on the same transport as the data stream. They are
//! not COBS-encoded and are only ever sent receiver to device.

/// Ask the device to start transmitting frames.
pub const START_TOKEN: [u8; 2] = [0x41, 0x00];

/// Ask the device to stop transmitting frames.
pub const STOP_TOKEN: [u8; 2] = [0x42, 0x00];

/// A control token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToken {
    Start,
    Stop,
}

impl ControlToken {
    /// Wire bytes of this token.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Start => &START_TOKEN,
            Self::Stop => &STOP_TOKEN,
        }
    }

    /// Recognize a token. Anything other than an exact token is `None`.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes == START_TOKEN {
            Some(Self::Start)
        } else if bytes == STOP_TOKEN {
            Some(Self::Stop)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Stop => "STOP",
        }
    }
}

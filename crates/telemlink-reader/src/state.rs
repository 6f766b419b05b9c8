use std::fmt;

use serde::Serialize;

/// Lifecycle of a reader pipeline.
///
/// ```text
/// Idle -> Connecting -> Streaming -> Disconnected <-> Connecting
///                           |              |
///                           +---> Closed <-+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Connecting,
    Streaming,
    Disconnected,
    Closed,
}

impl PipelineState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Disconnected => "disconnected",
            Self::Closed => "closed",
        }
    }

    /// Closed is terminal.
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

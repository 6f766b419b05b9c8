/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the transport.
    #[error("failed to open {target}: {source}")]
    Open {
        target: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on an open transport (e.g. device removed).
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote peer went away (datagram peer unreachable or reset).
    #[error("peer gone: {0}")]
    PeerGone(std::io::Error),

    /// The transport has already been closed.
    #[error("transport closed")]
    Closed,
}

impl TransportError {
    /// True when the error means the link is lost and a reconnect may help.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Io(_) | Self::PeerGone(_) | Self::Closed)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

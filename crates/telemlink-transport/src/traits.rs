use std::io::ErrorKind;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A byte-oriented duplex channel to the device.
///
/// Reads are bounded by the transport's read timeout: a read that sees no
/// data within the timeout returns `Ok(0)` rather than an error, so the
/// caller can check for cancellation and retry.
pub trait Transport: Send {
    /// Read available bytes into `buf`, waiting at most the read timeout.
    ///
    /// Returns `Ok(0)` on timeout.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write bytes, returning how many were accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Close the transport. Further reads and writes fail with
    /// [`TransportError::Closed`]. Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Change the read timeout.
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Current read timeout.
    fn read_timeout(&self) -> Duration;

    /// Human-readable endpoint description for diagnostics.
    fn describe(&self) -> String;

    /// Write all of `data`, retrying partial writes.
    fn write_all(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => {
                    return Err(TransportError::Io(std::io::Error::new(
                        ErrorKind::WriteZero,
                        "transport accepted zero bytes",
                    )))
                }
                n => data = &data[n..],
            }
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        (**self).set_read_timeout(timeout)
    }

    fn read_timeout(&self) -> Duration {
        (**self).read_timeout()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// True for error kinds that only mean "no data within the timeout".
pub(crate) fn is_timeout(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

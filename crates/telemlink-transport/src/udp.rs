use std::io::ErrorKind;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::traits::{is_timeout, Transport};

/// Default read timeout for UDP transports: 1 second.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Largest datagram accepted by default: the IPv4 UDP payload limit.
pub const DEFAULT_MAX_DATAGRAM: usize = 65_507;

/// UDP transport settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    /// Local address to bind. `None` binds an ephemeral port on the
    /// unspecified address of the peer's family.
    pub bind_addr: Option<SocketAddr>,
    pub read_timeout: Duration,
    /// Size of the receive buffer. Each datagram is received whole into it
    /// and handed out across as many `read` calls as the caller's buffer
    /// needs; bytes beyond this size are lost.
    pub max_datagram: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind_addr: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_datagram: DEFAULT_MAX_DATAGRAM,
        }
    }
}

/// Datagram transport connected to a single peer.
///
/// Datagrams are delivered as a byte stream; frame boundaries are recovered
/// by the framing layer, not by datagram boundaries.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    peer: SocketAddr,
    local: SocketAddr,
    read_timeout: Duration,
    datagram: Vec<u8>,
    // Unread bytes of the last datagram are `datagram[pending..filled]`.
    pending: usize,
    filled: usize,
}

impl UdpTransport {
    /// Connect to a device at `peer` with default settings.
    pub fn connect(peer: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_config(peer, &UdpConfig::default())
    }

    /// Connect to a device at `peer`.
    ///
    /// UDP has no handshake, so this only binds a local socket and fixes the
    /// remote address; an absent peer shows up later as
    /// [`TransportError::PeerGone`] on read or write.
    pub fn connect_with_config(peer: impl ToSocketAddrs, config: &UdpConfig) -> Result<Self> {
        let peer = resolve(peer)?;
        let bind_addr = config.bind_addr.unwrap_or_else(|| unspecified_for(&peer));
        let socket = UdpSocket::bind(bind_addr).map_err(|source| TransportError::Open {
            target: bind_addr.to_string(),
            source,
        })?;
        socket
            .connect(peer)
            .map_err(|source| TransportError::Open {
                target: peer.to_string(),
                source,
            })?;

        Self::from_connected(socket, peer, config)
    }

    /// Bind `bind_addr` and wait for the first datagram; the sender becomes
    /// the peer.
    ///
    /// The first datagram's bytes are returned alongside the transport so
    /// they can be fed to the framing layer. `wait` bounds the total wait;
    /// `None` waits indefinitely.
    pub fn accept(
        bind_addr: impl ToSocketAddrs,
        wait: Option<Duration>,
        config: &UdpConfig,
    ) -> Result<(Self, Vec<u8>)> {
        Self::accept_until(bind_addr, wait, config, || false)
    }

    /// Like [`accept`](Self::accept), but gives up with
    /// [`ErrorKind::Interrupted`] once `cancelled` returns true. The check
    /// runs once per read timeout.
    pub fn accept_until(
        bind_addr: impl ToSocketAddrs,
        wait: Option<Duration>,
        config: &UdpConfig,
        mut cancelled: impl FnMut() -> bool,
    ) -> Result<(Self, Vec<u8>)> {
        let bind_addr = resolve(bind_addr)?;
        let socket = UdpSocket::bind(bind_addr).map_err(|source| TransportError::Open {
            target: bind_addr.to_string(),
            source,
        })?;
        socket.set_read_timeout(Some(poll_interval(config.read_timeout)))?;
        info!(local = %bind_addr, "waiting for first datagram");

        let deadline = wait.map(|w| Instant::now() + w);
        let mut buf = vec![0u8; config.max_datagram.max(1)];
        let (n, peer) = loop {
            match socket.recv_from(&mut buf) {
                Ok(received) => break received,
                Err(e) if is_timeout(e.kind()) || is_unreachable(e.kind()) => {}
                Err(e) => return Err(TransportError::Io(e)),
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(TransportError::Open {
                    target: bind_addr.to_string(),
                    source: std::io::Error::new(
                        ErrorKind::TimedOut,
                        "no datagram received before deadline",
                    ),
                });
            }
            if cancelled() {
                return Err(TransportError::Open {
                    target: bind_addr.to_string(),
                    source: std::io::Error::new(ErrorKind::Interrupted, "wait cancelled"),
                });
            }
        };
        buf.truncate(n);

        socket
            .connect(peer)
            .map_err(|source| TransportError::Open {
                target: peer.to_string(),
                source,
            })?;
        let transport = Self::from_connected(socket, peer, config)?;
        Ok((transport, buf))
    }

    fn from_connected(socket: UdpSocket, peer: SocketAddr, config: &UdpConfig) -> Result<Self> {
        let read_timeout = config.read_timeout;
        socket.set_read_timeout(Some(poll_interval(read_timeout)))?;
        let local = socket.local_addr()?;
        debug!(%local, %peer, "udp transport ready");
        Ok(Self {
            socket: Some(socket),
            peer,
            local,
            read_timeout,
            datagram: vec![0u8; config.max_datagram.max(1)],
            pending: 0,
            filled: 0,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn socket(&self) -> Result<&UdpSocket> {
        self.socket.as_ref().ok_or(TransportError::Closed)
    }
}

impl Transport for UdpTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pending == self.filled {
            let socket = self.socket.as_ref().ok_or(TransportError::Closed)?;
            let n = match socket.recv(&mut self.datagram) {
                Ok(n) => n,
                Err(e) if is_timeout(e.kind()) => return Ok(0),
                Err(e) if is_unreachable(e.kind()) => return Err(TransportError::PeerGone(e)),
                Err(e) => return Err(TransportError::Io(e)),
            };
            if n == self.datagram.len() {
                warn!(
                    max_datagram = n,
                    "datagram filled the receive buffer and may be truncated"
                );
            }
            self.pending = 0;
            self.filled = n;
        }

        let n = buf.len().min(self.filled - self.pending);
        buf[..n].copy_from_slice(&self.datagram[self.pending..self.pending + n]);
        self.pending += n;
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match self.socket()?.send(data) {
            Ok(n) => Ok(n),
            Err(e) if is_unreachable(e.kind()) => Err(TransportError::PeerGone(e)),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.pending = 0;
        self.filled = 0;
        if self.socket.take().is_some() {
            debug!(peer = %self.peer, "udp transport closed");
        }
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.socket()?.set_read_timeout(Some(poll_interval(timeout)))?;
        self.read_timeout = timeout;
        Ok(())
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn describe(&self) -> String {
        format!("udp://{}", self.peer)
    }
}

fn resolve(addr: impl ToSocketAddrs) -> Result<SocketAddr> {
    let mut addrs = addr.to_socket_addrs().map_err(|source| TransportError::Open {
        target: "<address>".to_string(),
        source,
    })?;
    addrs.next().ok_or_else(|| TransportError::Open {
        target: "<address>".to_string(),
        source: std::io::Error::new(ErrorKind::AddrNotAvailable, "address resolved to nothing"),
    })
}

fn unspecified_for(peer: &SocketAddr) -> SocketAddr {
    match peer {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    }
}

// A zero timeout means "block forever" to the socket API.
fn poll_interval(timeout: Duration) -> Duration {
    timeout.max(Duration::from_millis(1))
}

fn is_unreachable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
    )
}

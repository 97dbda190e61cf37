//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that is
//! connected to exactly one peer.  All protocol logic lives elsewhere; this
//! module owns only byte I/O and the bounded-timeout receive that every
//! retransmission loop is built on.

use std::io;
use std::net::SocketAddr;

use tokio::net::{lookup_host, UdpSocket};
use tokio::time::{timeout_at, Instant};

use crate::packet::Segment;

/// Largest datagram we are prepared to read.
pub const MAX_DATAGRAM: usize = 65_535;

/// Result of a receive bounded by a deadline.
#[derive(Debug, PartialEq, Eq)]
pub enum Recv {
    /// A datagram of this many bytes was written into the buffer.
    Datagram(usize),
    /// The deadline passed with nothing received.
    TimedOut,
}

/// A datagram channel exclusively owned by one connection.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new, not yet connected socket to `local_addr`.
    ///
    /// Passing `127.0.0.1:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> io::Result<Self> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Bind to `local_port` on all interfaces and connect to `host:remote_port`.
    pub async fn open(host: &str, remote_port: u16, local_port: u16) -> io::Result<Self> {
        let peer = lookup_host((host, remote_port))
            .await?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no IPv4 address for {host}"))
            })?;
        let socket = Self::bind(SocketAddr::from(([0, 0, 0, 0], local_port))).await?;
        socket.connect(peer).await?;
        Ok(socket)
    }

    /// Restrict the socket to datagrams from and to `peer`.
    pub async fn connect(&self, peer: SocketAddr) -> io::Result<()> {
        self.inner.connect(peer).await
    }

    /// Send raw, already-encoded bytes to the connected peer.
    ///
    /// A refused datagram (ICMP port unreachable from an earlier send) counts
    /// as lost rather than as a transport failure.
    pub async fn send(&self, bytes: &[u8]) -> io::Result<()> {
        match self.inner.send(bytes).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
                log::debug!("[socket] send refused by peer; treating as lost");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Encode `segment` and send it to the connected peer.
    pub async fn send_segment(&self, segment: &Segment) -> io::Result<()> {
        self.send(&segment.encode()).await
    }

    /// Wait until `deadline` for the next datagram from the connected peer.
    ///
    /// The three outcomes are kept apart: a datagram, a timeout, or an `Err`
    /// meaning the channel itself has failed.
    pub async fn recv_until(&self, buf: &mut [u8], deadline: Instant) -> io::Result<Recv> {
        loop {
            match timeout_at(deadline, self.inner.recv(buf)).await {
                Err(_elapsed) => return Ok(Recv::TimedOut),
                Ok(Ok(n)) => return Ok(Recv::Datagram(n)),
                Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
                    // Peer not listening yet; keep waiting out the deadline.
                    log::debug!("[socket] recv refused by peer; still waiting");
                }
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    /// Block until any datagram arrives, returning its length and origin.
    ///
    /// Used by the receiver before it knows who its peer is.
    pub async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf).await
    }
}

//! Scripted peer used by the integration tests.
//!
//! A [`Peer`] is a bare socket plus the crate's codec: each test decides
//! exactly which segments to answer, drop or corrupt.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use stcp::packet::{flags, Segment};
use stcp::socket::{Recv, MAX_DATAGRAM};
use stcp::{Socket, StcpConfig};
use tokio::time::Instant;

pub const PEER_ISN: u32 = 7000;

/// Bind a socket to an OS-assigned port on loopback.
pub async fn ephemeral() -> Socket {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    Socket::bind(addr).await.expect("bind failed")
}

/// Bind a client socket already connected to `peer`.
pub async fn client_for(peer: SocketAddr) -> Socket {
    let sock = ephemeral().await;
    sock.connect(peer).await.expect("connect failed");
    sock
}

/// Small, fast settings so timeout paths finish quickly.
pub fn fast_config() -> StcpConfig {
    StcpConfig {
        initial_rto: Duration::from_millis(50),
        max_rto: Duration::from_millis(400),
        max_retries: 6,
        ..StcpConfig::default()
    }
}

pub struct Peer {
    pub socket: Socket,
    buf: Vec<u8>,
}

impl Peer {
    pub async fn bind() -> Self {
        Self {
            socket: ephemeral().await,
            buf: vec![0u8; MAX_DATAGRAM],
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    /// Wait for the first datagram from anyone and connect to its sender.
    pub async fn first(&mut self) -> Segment {
        let (n, from) = self.socket.recv_from(&mut self.buf).await.unwrap();
        self.socket.connect(from).await.unwrap();
        Segment::decode(&self.buf[..n]).expect("client sent a corrupt segment")
    }

    /// Next valid segment within `within`, or `None` on timeout.
    pub async fn recv(&mut self, within: Duration) -> Option<Segment> {
        let deadline = Instant::now() + within;
        loop {
            match self.socket.recv_until(&mut self.buf, deadline).await.unwrap() {
                Recv::TimedOut => return None,
                Recv::Datagram(n) => {
                    if let Ok(seg) = Segment::decode(&self.buf[..n]) {
                        return Some(seg);
                    }
                }
            }
        }
    }

    pub async fn send(&self, seg: &Segment) {
        self.socket.send_segment(seg).await.unwrap();
    }

    pub async fn send_raw(&self, bytes: &[u8]) {
        self.socket.send(bytes).await.unwrap();
    }

    /// Complete a handshake: answer the SYN and swallow the final ACK.
    ///
    /// Returns the client's first data sequence number.
    pub async fn accept(&mut self, window: u16) -> u32 {
        let syn = self.first().await;
        assert!(syn.has(flags::SYN));
        let next = syn.header.seq.wrapping_add(1);
        self.send(&synack(syn.header.seq, window)).await;
        let ack = loop {
            let seg = self.recv(Duration::from_secs(2)).await.expect("handshake ACK");
            if !seg.has(flags::SYN) {
                break seg;
            }
            // SYN retransmitted before our answer landed.
            self.send(&synack(syn.header.seq, window)).await;
        };
        assert!(ack.has(flags::ACK));
        assert_eq!(ack.header.ack, PEER_ISN + 1);
        next
    }

    /// Cumulative ACK for `ack` advertising `window`.
    pub async fn ack(&self, ack: u32, window: u16) {
        self.send(&Segment::new(PEER_ISN + 1, ack, flags::ACK, window, vec![]))
            .await;
    }
}

pub fn synack(client_isn: u32, window: u16) -> Segment {
    Segment::new(
        PEER_ISN,
        client_isn.wrapping_add(1),
        flags::SYN | flags::ACK,
        window,
        vec![],
    )
}

pub fn fin_ack(ack: u32) -> Segment {
    Segment::new(PEER_ISN + 1, ack, flags::FIN | flags::ACK, 0, vec![])
}

//! Receive side: passive open, in-order delivery and cumulative ACKs.
//!
//! [`Receiver`] is a pure state machine in the same style as the send
//! window: it consumes validated [`Segment`]s and returns the reply to put on
//! the wire, leaving all socket I/O to [`receive`].
//!
//! - Only **in-order** payload is accepted (seq == `rcv_nxt`); anything else
//!   is discarded and answered with the unchanged cumulative ACK, which is
//!   what drives the sender's duplicate-ACK fast retransmit.
//! - Every data segment and every zero-length probe gets an ACK carrying the
//!   advertised window.
//! - An in-order FIN is answered with FIN-ACK; the final ACK closes.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::StcpConfig;
use crate::error::ConnError;
use crate::packet::{flags, Segment};
use crate::socket::{Recv, Socket, MAX_DATAGRAM};
use crate::state::ConnectionState;
use crate::timer::RetransmitTimer;

/// Receive-side state for one connection.
#[derive(Debug)]
pub struct Receiver {
    /// Current FSM state.
    pub state: ConnectionState,
    /// Our initial sequence number, used in SYN-ACK and FIN-ACK.
    isn: u32,
    /// Next expected sequence number (`RCV.NXT`).
    rcv_nxt: u32,
    /// Advertised receive window.
    window: u16,
    /// In-order payload not yet handed to the application.
    app_buffer: Vec<u8>,
}

impl Receiver {
    /// A receiver in `Listen` with a random initial sequence number.
    pub fn listen(window: u16) -> Self {
        Self::with_isn(rand::random(), window)
    }

    pub fn with_isn(isn: u32, window: u16) -> Self {
        Self {
            state: ConnectionState::Listen,
            isn,
            rcv_nxt: 0,
            window,
            app_buffer: Vec::new(),
        }
    }

    /// Cumulative ACK number (`RCV.NXT`).
    pub fn ack_number(&self) -> u32 {
        self.rcv_nxt
    }

    pub fn set_window(&mut self, window: u16) {
        self.window = window;
    }

    /// Take all in-order bytes received so far.
    pub fn take_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.app_buffer)
    }

    /// Feed one validated segment; returns the reply to send, if any.
    pub fn on_segment(&mut self, seg: &Segment) -> Option<Segment> {
        let h = &seg.header;
        match self.state {
            ConnectionState::Listen => {
                if !seg.has(flags::SYN) {
                    return None;
                }
                self.rcv_nxt = h.seq.wrapping_add(1);
                self.state = ConnectionState::SynReceived;
                log::info!("[rcv] LISTEN → SYN_RECEIVED peer_isn={}", h.seq);
                Some(self.syn_ack())
            }
            ConnectionState::SynReceived | ConnectionState::Established => {
                if seg.has(flags::SYN) {
                    // Our SYN-ACK was lost; the peer is still in SYN_SENT.
                    return (self.state == ConnectionState::SynReceived).then(|| self.syn_ack());
                }
                if self.state == ConnectionState::SynReceived {
                    let acks_syn = seg.has(flags::ACK) && h.ack == self.isn.wrapping_add(1);
                    if !acks_syn && h.seq != self.rcv_nxt {
                        return None;
                    }
                    self.state = ConnectionState::Established;
                    log::info!("[rcv] SYN_RECEIVED → ESTABLISHED");
                    if seg.payload.is_empty() && !seg.has(flags::FIN) {
                        return None;
                    }
                }

                if seg.has(flags::FIN) {
                    if h.seq != self.rcv_nxt {
                        return Some(self.ack());
                    }
                    self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
                    self.state = ConnectionState::LastAck;
                    log::info!("[rcv] ESTABLISHED → LAST_ACK");
                    return Some(self.fin_ack());
                }

                if !seg.payload.is_empty() {
                    let accepted = h.seq == self.rcv_nxt;
                    if accepted {
                        self.app_buffer.extend_from_slice(&seg.payload);
                        self.rcv_nxt = self.rcv_nxt.wrapping_add(seg.payload.len() as u32);
                    }
                    log::debug!(
                        "[rcv] ← DATA seq={} len={} accepted={}; → ACK ack={}",
                        h.seq,
                        seg.payload.len(),
                        accepted,
                        self.rcv_nxt
                    );
                }
                // Data or window probe: answer with the cumulative ACK.
                Some(self.ack())
            }
            ConnectionState::LastAck => {
                if seg.has(flags::FIN) {
                    return Some(self.fin_ack());
                }
                if seg.has(flags::ACK) && h.ack == self.isn.wrapping_add(2) {
                    self.state = ConnectionState::Closed;
                    log::info!("[rcv] LAST_ACK → CLOSED");
                    return None;
                }
                (!seg.payload.is_empty()).then(|| self.ack())
            }
            _ => None,
        }
    }

    /// Reply worth repeating when the peer goes quiet in a handshake state.
    pub fn pending_retransmit(&self) -> Option<Segment> {
        match self.state {
            ConnectionState::SynReceived => Some(self.syn_ack()),
            ConnectionState::LastAck => Some(self.fin_ack()),
            _ => None,
        }
    }

    fn syn_ack(&self) -> Segment {
        Segment::new(
            self.isn,
            self.rcv_nxt,
            flags::SYN | flags::ACK,
            self.window,
            vec![],
        )
    }

    fn ack(&self) -> Segment {
        Segment::new(
            self.isn.wrapping_add(1),
            self.rcv_nxt,
            flags::ACK,
            self.window,
            vec![],
        )
    }

    fn fin_ack(&self) -> Segment {
        Segment::new(
            self.isn.wrapping_add(1),
            self.rcv_nxt,
            flags::FIN | flags::ACK,
            self.window,
            vec![],
        )
    }
}

/// Accept one connection on `socket` and copy its stream into `sink`.
///
/// Blocks until a SYN arrives, connects the socket to that peer, then writes
/// in-order payload to `sink` as it is received.  Returns the number of bytes
/// delivered once the peer's final ACK arrives, or once the peer has gone
/// quiet after our FIN-ACK.
pub async fn receive<W>(
    socket: &Socket,
    sink: &mut W,
    config: &StcpConfig,
) -> Result<u64, ConnError>
where
    W: AsyncWrite + Unpin,
{
    config.validate()?;
    let mut receiver = Receiver::listen(config.max_window);
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (n, from) = socket.recv_from(&mut buf).await?;
        let seg = match Segment::decode(&buf[..n]) {
            Ok(seg) => seg,
            Err(e) => {
                log::debug!("[rcv] dropping datagram from {from}: {e}");
                continue;
            }
        };
        if let Some(reply) = receiver.on_segment(&seg) {
            socket.connect(from).await?;
            socket.send_segment(&reply).await?;
            log::info!("[rcv] accepted connection from {from}");
            break;
        }
    }

    let mut timer = RetransmitTimer::new(config);
    let mut delivered = 0u64;
    while receiver.state != ConnectionState::Closed {
        match socket.recv_until(&mut buf, timer.deadline()).await? {
            Recv::TimedOut => {
                if !timer.back_off() {
                    if receiver.state == ConnectionState::LastAck {
                        log::info!("[rcv] final ACK never arrived; closing");
                        break;
                    }
                    log::warn!("[rcv] peer silent; giving up");
                    return Err(ConnError::MaxRetriesExceeded(timer.timeouts()));
                }
                if let Some(reply) = receiver.pending_retransmit() {
                    socket.send_segment(&reply).await?;
                }
            }
            Recv::Datagram(n) => {
                let seg = match Segment::decode(&buf[..n]) {
                    Ok(seg) => seg,
                    Err(e) => {
                        log::debug!("[rcv] dropping datagram: {e}");
                        continue;
                    }
                };
                timer.reset();
                if let Some(reply) = receiver.on_segment(&seg) {
                    socket.send_segment(&reply).await?;
                }
                let data = receiver.take_data();
                if !data.is_empty() {
                    sink.write_all(&data).await.map_err(ConnError::Sink)?;
                    delivered += data.len() as u64;
                }
            }
        }
    }

    sink.flush().await.map_err(ConnError::Sink)?;
    Ok(delivered)
}

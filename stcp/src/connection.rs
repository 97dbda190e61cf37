//! Sender-side connection: handshake, windowed transfer, retransmission and
//! teardown.
//!
//! A [`Connection`] is the control block for one outbound stream.  It owns the
//! socket, the [`SendWindow`] and the [`RetransmitTimer`], and is driven by a
//! single caller: nothing here runs in the background.  Every wait for input
//! is a bounded receive whose timeout follows the timer's back-off.
//!
//! ```ignore
//! let mut conn = Connection::open(socket, StcpConfig::default()).await?;
//! conn.send(b"hello").await?;
//! conn.close().await?;
//! ```
//!
//! # Retransmission
//!
//! - **Timeout**: the oldest unacknowledged segment is resent and the RTO
//!   doubles.  With nothing in flight (a zero window), an empty probe is sent
//!   instead so the peer re-advertises its window.
//! - **Fast retransmit**: after [`DUP_ACK_THRESHOLD`] identical ACKs the
//!   segment starting at that ACK number is resent at once, and the sender
//!   waits for a fresh ACK before carrying on.
//!
//! A fresh ACK resets the RTO.  `max_retries` consecutive timeouts end the
//! current operation with an error.  While the peer advertises a zero
//! window, each answered probe clears the timeout count but keeps the
//! backed-off RTO, so probing continues at the capped interval.

use crate::ack::{self, AckEvent};
use crate::config::{StcpConfig, DUP_ACK_THRESHOLD};
use crate::error::ConnError;
use crate::packet::{flags, Segment};
use crate::socket::{Recv, Socket, MAX_DATAGRAM};
use crate::state::ConnectionState;
use crate::timer::RetransmitTimer;
use crate::window::SendWindow;

/// Control block for one sending connection.
///
/// Created by [`Connection::open`] and consumed by [`Connection::close`];
/// dropping it on any error path releases the socket and window.
pub struct Connection {
    /// Current FSM state.
    pub state: ConnectionState,
    /// Outbound window (sequence numbers, in-flight segments, dup-ACK count).
    pub window: SendWindow,
    socket: Socket,
    config: StcpConfig,
    timer: RetransmitTimer,
    /// Scratch space for inbound datagrams.
    buf: Vec<u8>,
}

impl Connection {
    // -----------------------------------------------------------------------
    // Open
    // -----------------------------------------------------------------------

    /// Active open: send SYN and wait for a matching SYN-ACK.
    ///
    /// The SYN is retransmitted with exponential back-off; after
    /// `max_retries` unanswered retransmissions the open fails.
    pub async fn open(socket: Socket, config: StcpConfig) -> Result<Self, ConnError> {
        config.validate()?;
        let isn: u32 = rand::random();
        let mut timer = RetransmitTimer::new(&config);
        let mut buf = vec![0u8; MAX_DATAGRAM];

        let syn = Segment::new(isn, 0, flags::SYN, 0, vec![]).encode();
        socket.send(&syn).await?;
        log::info!("[stcp] CLOSED → SYN_SENT isn={isn}");

        let mut deadline = timer.deadline();
        let synack = loop {
            match socket.recv_until(&mut buf, deadline).await? {
                Recv::TimedOut => {
                    if !timer.back_off() {
                        log::warn!("[stcp] no SYN-ACK; giving up");
                        return Err(ConnError::HandshakeFailed(timer.timeouts()));
                    }
                    log::debug!("[stcp] timeout: resending SYN (rto={:?})", timer.rto());
                    socket.send(&syn).await?;
                    deadline = timer.deadline();
                }
                Recv::Datagram(n) => match Segment::decode(&buf[..n]) {
                    Ok(seg)
                        if seg.has(flags::SYN | flags::ACK)
                            && seg.header.ack == isn.wrapping_add(1) =>
                    {
                        break seg;
                    }
                    Ok(seg) => log::debug!("[stcp] waiting for SYN-ACK; ignoring {seg}"),
                    Err(e) => log::debug!("[stcp] dropping datagram: {e}"),
                },
            }
        };

        let next_seq = synack.header.ack;
        let rcv_ack = synack.header.seq.wrapping_add(1);
        let mut window = SendWindow::new(next_seq, rcv_ack, config.mss, config.max_window);
        window.set_peer_window(synack.header.window);

        let ack = Segment::new(next_seq, rcv_ack, flags::ACK, 0, vec![]);
        socket.send_segment(&ack).await?;
        log::info!(
            "[stcp] SYN_SENT → ESTABLISHED seq={} ack={} win={}",
            next_seq,
            rcv_ack,
            window.max_window()
        );

        timer.reset();
        Ok(Self {
            state: ConnectionState::Established,
            window,
            socket,
            config,
            timer,
            buf,
        })
    }

    // -----------------------------------------------------------------------
    // Data transfer
    // -----------------------------------------------------------------------

    /// Admit all of `data` into the send window.
    ///
    /// Segments are cut at the MSS (and at the operative window when that is
    /// smaller) and transmitted as they are admitted.  While the window is
    /// full, the call services acknowledgements and retransmissions until
    /// room frees up.  Returns once every byte is in the window or
    /// acknowledged; use [`flush`](Self::flush) to wait for the rest.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ConnError> {
        if self.state != ConnectionState::Established {
            return Err(ConnError::BadState(self.state));
        }

        let mut rest = data;
        while !rest.is_empty() {
            let Some(len) = self.window.admit(rest) else {
                self.await_ack().await?;
                continue;
            };
            if let Some(entry) = self.window.newest() {
                log::debug!(
                    "[stcp] → DATA seq={} len={} in_flight={}/{}",
                    entry.seq,
                    len,
                    self.window.bytes_in_flight(),
                    self.window.max_window()
                );
                self.socket.send(&entry.wire).await?;
            }
            rest = &rest[len..];
        }
        Ok(())
    }

    /// Wait until every in-flight byte has been acknowledged.
    pub async fn flush(&mut self) -> Result<(), ConnError> {
        if !matches!(
            self.state,
            ConnectionState::Established | ConnectionState::Closing
        ) {
            return Err(ConnError::BadState(self.state));
        }
        while self.window.bytes_in_flight() > 0 {
            self.await_ack().await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Close
    // -----------------------------------------------------------------------

    /// Drain the window, then exchange FIN / FIN-ACK / ACK with the peer.
    ///
    /// Consumes the control block: it is released whether or not the
    /// teardown handshake completes.
    pub async fn close(mut self) -> Result<(), ConnError> {
        if self.state != ConnectionState::Established {
            return Err(ConnError::BadState(self.state));
        }

        self.state = ConnectionState::Closing;
        log::info!(
            "[stcp] ESTABLISHED → CLOSING in_flight={}",
            self.window.bytes_in_flight()
        );
        self.flush().await?;

        let fin_seq = self.window.next_seq;
        let fin = Segment::new(fin_seq, self.window.rcv_ack, flags::FIN, 0, vec![]).encode();
        self.socket.send(&fin).await?;
        self.state = ConnectionState::FinWait;
        log::info!("[stcp] CLOSING → FIN_WAIT seq={fin_seq}");

        self.timer.reset();
        let mut deadline = self.timer.deadline();
        loop {
            match self.socket.recv_until(&mut self.buf, deadline).await? {
                Recv::TimedOut => {
                    if !self.timer.back_off() {
                        log::warn!("[stcp] FIN never acknowledged; releasing connection");
                        self.state = ConnectionState::Closed;
                        return Err(ConnError::TeardownFailed(self.timer.timeouts()));
                    }
                    log::debug!("[stcp] timeout: resending FIN (rto={:?})", self.timer.rto());
                    self.socket.send(&fin).await?;
                    deadline = self.timer.deadline();
                }
                Recv::Datagram(n) => match Segment::decode(&self.buf[..n]) {
                    Ok(seg) if seg.has(flags::FIN | flags::ACK) => {
                        let last = Segment::new(
                            fin_seq.wrapping_add(1),
                            seg.header.seq.wrapping_add(1),
                            flags::ACK,
                            0,
                            vec![],
                        );
                        self.socket.send_segment(&last).await?;
                        self.state = ConnectionState::Closed;
                        log::info!("[stcp] FIN_WAIT → CLOSED");
                        return Ok(());
                    }
                    Ok(seg) => log::debug!("[stcp] waiting for FIN-ACK; ignoring {seg}"),
                    Err(e) => log::debug!("[stcp] dropping datagram: {e}"),
                },
            }
        }
    }

    // -----------------------------------------------------------------------
    // Retransmission engine
    // -----------------------------------------------------------------------

    /// One blocking wait for acknowledgement traffic.
    ///
    /// Returns after the window advanced, the operative window changed, a
    /// fast retransmit completed, or a timeout was handled.  Corrupt and
    /// irrelevant datagrams do not extend the deadline.
    async fn await_ack(&mut self) -> Result<(), ConnError> {
        let deadline = self.timer.deadline();
        loop {
            let n = match self.socket.recv_until(&mut self.buf, deadline).await? {
                Recv::TimedOut => return self.on_timeout().await,
                Recv::Datagram(n) => n,
            };
            let window_before = self.window.max_window();
            match ack::process(&mut self.window, &self.buf[..n]) {
                AckEvent::Corrupt | AckEvent::Ignored => {}
                AckEvent::Advanced { .. } => {
                    self.timer.reset();
                    return Ok(());
                }
                AckEvent::Duplicate { .. } if self.window.max_window() == 0 => {
                    // Zero-window stall: an answered probe is not a timeout.
                    self.timer.clear_timeouts();
                    return Ok(());
                }
                AckEvent::Duplicate { ack, count } => {
                    if count == DUP_ACK_THRESHOLD {
                        return self.fast_retransmit(ack).await;
                    }
                    if self.window.max_window() != window_before {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handle an expired RTO: back off and resend the window head.
    async fn on_timeout(&mut self) -> Result<(), ConnError> {
        if !self.timer.back_off() {
            log::warn!(
                "[stcp] {} consecutive timeouts; giving up",
                self.timer.timeouts()
            );
            return Err(ConnError::MaxRetriesExceeded(self.timer.timeouts()));
        }

        match self.window.head_mut() {
            Some(head) => {
                head.tx_count += 1;
                log::debug!(
                    "[stcp] timeout: retransmitting seq={} (tx={}, rto={:?})",
                    head.seq,
                    head.tx_count,
                    self.timer.rto()
                );
                self.socket.send(&head.wire).await?;
            }
            None => {
                let probe = Segment::new(
                    self.window.next_seq,
                    self.window.rcv_ack,
                    flags::ACK,
                    0,
                    vec![],
                );
                log::debug!("[stcp] zero window: probing (rto={:?})", self.timer.rto());
                self.socket.send_segment(&probe).await?;
            }
        }
        Ok(())
    }

    /// Resend the segment starting at `ack` and wait for a fresh ACK.
    ///
    /// Runs its own back-off loop, resending the window head on each timeout.
    async fn fast_retransmit(&mut self, ack: u32) -> Result<(), ConnError> {
        let Some(entry) = self.window.find_mut(ack) else {
            log::debug!("[stcp] dup ACK {ack} matches no in-flight segment");
            return Ok(());
        };
        entry.tx_count += 1;
        log::debug!(
            "[stcp] fast retransmit seq={} (tx={})",
            entry.seq,
            entry.tx_count
        );
        self.socket.send(&entry.wire).await?;

        let mut timer = RetransmitTimer::new(&self.config);
        let mut deadline = timer.deadline();
        loop {
            match self.socket.recv_until(&mut self.buf, deadline).await? {
                Recv::TimedOut => {
                    if !timer.back_off() {
                        log::warn!("[stcp] fast retransmit never acknowledged; giving up");
                        return Err(ConnError::MaxRetriesExceeded(timer.timeouts()));
                    }
                    let Some(head) = self.window.head_mut() else {
                        return Ok(());
                    };
                    head.tx_count += 1;
                    log::debug!("[stcp] timeout after fast retransmit: resending seq={}", head.seq);
                    self.socket.send(&head.wire).await?;
                    deadline = timer.deadline();
                }
                Recv::Datagram(n) => {
                    if let AckEvent::Advanced { .. } = ack::process(&mut self.window, &self.buf[..n])
                    {
                        self.timer.reset();
                        return Ok(());
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current retransmission timeout of the main timer.
    pub fn rto(&self) -> std::time::Duration {
        self.timer.rto()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        log::debug!(
            "[stcp] releasing control block in {} ({} bytes unacknowledged)",
            self.state,
            self.window.bytes_in_flight()
        );
    }
}

//! Connection finite-state machine (FSM) types.
//!
//! This module defines every state a sender [`crate::connection::Connection`]
//! or a [`crate::receiver::Receiver`] can occupy.  Transitions live with their
//! owners; this enum only names the states so both sides log them the same way.

/// All possible states of the connection FSM.
///
/// ```text
///  sender:    CLOSED ──SYN──▶ SYN_SENT ──SYN-ACK──▶ ESTABLISHED
///                                                       │ close()
///                                                       ▼
///             CLOSED ◀──FIN-ACK── FIN_WAIT ◀──drained── CLOSING
///
///  receiver:  LISTEN ──SYN──▶ SYN_RECEIVED ──ACK/data──▶ ESTABLISHED
///                                                       │ FIN
///                                                       ▼
///                                     CLOSED ◀──ACK── LAST_ACK
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection exists; initial and terminal state.
    #[default]
    Closed,
    /// Receiver waiting for a SYN.
    Listen,
    /// SYN has been sent; waiting for SYN-ACK.
    SynSent,
    /// SYN received; SYN-ACK sent; waiting for ACK or data.
    SynReceived,
    /// Handshake complete; data transfer in progress.
    Established,
    /// Local close requested; draining the send window.
    Closing,
    /// FIN sent; waiting for FIN-ACK.
    FinWait,
    /// Peer's FIN answered with FIN-ACK; waiting for the final ACK.
    LastAck,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Closed => "CLOSED",
            Self::Listen => "LISTEN",
            Self::SynSent => "SYN_SENT",
            Self::SynReceived => "SYN_RECEIVED",
            Self::Established => "ESTABLISHED",
            Self::Closing => "CLOSING",
            Self::FinWait => "FIN_WAIT",
            Self::LastAck => "LAST_ACK",
        };
        f.write_str(name)
    }
}

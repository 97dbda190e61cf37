//! Error taxonomy for connection-level operations.
//!
//! Corrupt segments and protocol mismatches never show up here: they are
//! dropped where they are detected.  Timeouts only surface once the retry
//! budget is spent.

use crate::state::ConnectionState;

#[derive(Debug, thiserror::Error)]
pub enum ConnError {
    /// The datagram channel can no longer send or receive.
    #[error("transport failure: {0}")]
    Io(#[from] std::io::Error),
    /// Writing delivered payload to the application's sink failed.
    #[error("writing received data failed: {0}")]
    Sink(#[source] std::io::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    // The counts below are consecutive timeouts, i.e. `max_retries + 1`.
    #[error("no valid SYN-ACK after {0} timeouts")]
    HandshakeFailed(u32),
    #[error("no acknowledgement after {0} timeouts")]
    MaxRetriesExceeded(u32),
    #[error("no FIN-ACK after {0} timeouts")]
    TeardownFailed(u32),
    #[error("operation not valid in state {0}")]
    BadState(ConnectionState),
}

//! Tunable protocol constants.
//!
//! None of these are negotiated with the peer; both ends simply agree to use
//! sane values.  The binary exposes every field as a CLI flag.

use std::time::Duration;

use crate::error::ConnError;

/// Default retransmission timeout before any backoff.
pub const INITIAL_RTO: Duration = Duration::from_millis(150);
/// Backoff ceiling for a single wait.
pub const MAX_RTO: Duration = Duration::from_secs(5);
/// Consecutive timeouts tolerated before an operation fails permanently.
pub const MAX_RETRIES: u32 = 6;
/// Largest payload carried by one segment.
pub const MSS: usize = 1000;
/// Implementation ceiling applied to every advertised window.
pub const MAX_WINDOW: u16 = 5000;
/// Identical ACKs in a row that trigger a fast retransmit.
pub const DUP_ACK_THRESHOLD: u32 = 3;

/// Settings shared by the sender and the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StcpConfig {
    /// RTO used for the first wait and after every fresh ACK.
    pub initial_rto: Duration,
    /// Maximum RTO after repeated back-off.
    pub max_rto: Duration,
    /// Timeouts allowed in a row before giving up.
    pub max_retries: u32,
    /// Maximum segment payload size in bytes.
    pub mss: usize,
    /// Window ceiling; also the window the receiver advertises.
    pub max_window: u16,
}

impl StcpConfig {
    /// Reject settings no connection can run with.
    pub fn validate(&self) -> Result<(), ConnError> {
        if self.mss == 0 {
            return Err(ConnError::InvalidConfig("mss must be at least 1"));
        }
        if self.initial_rto.is_zero() {
            return Err(ConnError::InvalidConfig("initial_rto must be non-zero"));
        }
        if self.max_rto < self.initial_rto {
            return Err(ConnError::InvalidConfig("max_rto is below initial_rto"));
        }
        Ok(())
    }
}

impl Default for StcpConfig {
    fn default() -> Self {
        Self {
            initial_rto: INITIAL_RTO,
            max_rto: MAX_RTO,
            max_retries: MAX_RETRIES,
            mss: MSS,
            max_window: MAX_WINDOW,
        }
    }
}

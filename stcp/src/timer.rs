//! Retransmission timeout management.
//!
//! One [`RetransmitTimer`] governs every blocking wait a connection makes.
//! The RTO starts at `initial_rto`, doubles on each consecutive timeout
//! (exponential back-off) up to `max_rto`, and snaps back to `initial_rto`
//! as soon as a fresh acknowledgement arrives.  The timer also counts the
//! consecutive timeouts so callers can give up after `max_retries`.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::StcpConfig;

/// Backoff state for one sequence of waits.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    initial_rto: Duration,
    max_rto: Duration,
    max_retries: u32,
    /// RTO applied to the next wait.
    current_rto: Duration,
    /// Timeouts since the last reset.
    timeouts: u32,
}

impl RetransmitTimer {
    pub fn new(config: &StcpConfig) -> Self {
        Self {
            initial_rto: config.initial_rto,
            max_rto: config.max_rto,
            max_retries: config.max_retries,
            current_rto: config.initial_rto,
            timeouts: 0,
        }
    }

    /// RTO to apply to the next blocking wait.
    pub fn rto(&self) -> Duration {
        self.current_rto
    }

    /// Absolute deadline for a wait starting now.
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.current_rto
    }

    /// Record a timeout and double the RTO, capped at `max_rto`.
    ///
    /// Returns `false` once more than `max_retries` timeouts have happened in
    /// a row; the caller should stop retransmitting and fail.
    pub fn back_off(&mut self) -> bool {
        self.timeouts += 1;
        self.current_rto = (self.current_rto * 2).min(self.max_rto);
        self.timeouts <= self.max_retries
    }

    /// Restore `initial_rto` and clear the timeout count.
    pub fn reset(&mut self) {
        self.current_rto = self.initial_rto;
        self.timeouts = 0;
    }

    /// Forget the consecutive timeouts but keep the backed-off RTO.
    ///
    /// Used when the peer answers without letting any data through, as with
    /// a window probe on a zero window.
    pub fn clear_timeouts(&mut self) {
        self.timeouts = 0;
    }

    /// Consecutive timeouts since the last reset.
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }
}

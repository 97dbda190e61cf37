//! Inbound acknowledgement processing.
//!
//! Every datagram the sender reads while it has data outstanding goes
//! through [`process`].  The raw bytes are checksum-validated before any
//! header field is looked at; corrupt datagrams leave the window untouched.

use crate::packet::{flags, Segment};
use crate::window::SendWindow;

/// What a single inbound datagram did to the send window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckEvent {
    /// Failed validation; dropped without effect.
    Corrupt,
    /// Valid, but not an acknowledgement for the current window (handshake
    /// leftovers, FIN traffic, stale or out-of-range ACK numbers).
    Ignored,
    /// A new acknowledgement number; `retired` segments left the window.
    Advanced { ack: u32, retired: usize },
    /// The same acknowledgement number as last time, `count` times in a row.
    Duplicate { ack: u32, count: u32 },
}

/// Validate a raw datagram and apply it to `window`.
pub fn process(window: &mut SendWindow, raw: &[u8]) -> AckEvent {
    match Segment::decode(raw) {
        Ok(segment) => process_segment(window, &segment),
        Err(e) => {
            log::debug!("[ack] dropping datagram: {e}");
            AckEvent::Corrupt
        }
    }
}

/// Apply an already validated segment to `window`.
pub fn process_segment(window: &mut SendWindow, segment: &Segment) -> AckEvent {
    let h = &segment.header;
    if !segment.has(flags::ACK) || h.flags & (flags::SYN | flags::FIN) != 0 {
        log::debug!("[ack] ignoring {segment}");
        return AckEvent::Ignored;
    }

    let Some(retired) = window.acknowledge(h.ack) else {
        log::debug!("[ack] ack={} outside window; ignored", h.ack);
        return AckEvent::Ignored;
    };
    window.set_peer_window(h.window);

    let fresh = h.ack != window.last_ack;
    let count = window.record_ack(h.ack);
    if fresh {
        log::debug!(
            "[ack] ← ACK ack={} retired={} in_flight={} win={}",
            h.ack,
            retired,
            window.bytes_in_flight(),
            window.max_window()
        );
        AckEvent::Advanced { ack: h.ack, retired }
    } else {
        log::debug!("[ack] ← dup ACK ack={} count={}", h.ack, count);
        AckEvent::Duplicate { ack: h.ack, count }
    }
}

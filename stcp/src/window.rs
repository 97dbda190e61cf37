//! Send-side sliding window.
//!
//! [`SendWindow`] holds every segment that has been transmitted but not yet
//! acknowledged, oldest first, together with the scalars the sender needs to
//! admit new data and recognise duplicate acknowledgements.
//!
//! # Invariants
//!
//! - `bytes_in_flight` always equals the sum of payload lengths still held.
//! - A segment is only admitted if `bytes_in_flight + len <= max_window`,
//!   so bytes in flight never exceed the operative window.
//! - Segment bytes are kept in wire form; retransmission resends them as-is.
//!
//! Sequence numbers are u32 and wrap; comparisons treat two numbers as
//! ordered when they are less than `u32::MAX / 2` apart.
//!
//! This module only manages state; all socket I/O is the caller's responsibility.

use std::collections::VecDeque;

use crate::packet::{flags, Segment};

/// Returns `true` when sequence number `a` is ≤ `b` in wrap-around space.
#[inline]
pub(crate) fn seq_le(a: u32, b: u32) -> bool {
    b.wrapping_sub(a) <= (u32::MAX / 2)
}

/// A single in-flight segment.
#[derive(Debug, Clone)]
pub struct WindowEntry {
    /// Sequence number of the first payload byte.
    pub seq: u32,
    /// Payload length in bytes.
    pub payload_len: usize,
    /// The encoded segment, resent verbatim on retransmission.
    pub wire: Vec<u8>,
    /// Total number of times this segment has been transmitted.
    pub tx_count: u32,
}

impl WindowEntry {
    /// First sequence number after this segment's payload.
    pub fn seq_end(&self) -> u32 {
        self.seq.wrapping_add(self.payload_len as u32)
    }
}

/// Sliding-window state for one connection.
///
/// ```text
///  head.seq            next_seq
///      │                  │
///  ────┼──────────────────┼──────────────────▶ seq space
///      │ <── in flight ──▶│ <── admissible while room remains
/// ```
#[derive(Debug)]
pub struct SendWindow {
    /// Sequence number assigned to the next admitted byte.
    pub next_seq: u32,
    /// Acknowledgement number carried in every outbound segment.
    pub rcv_ack: u32,
    /// Last acknowledgement number seen from the peer.
    pub last_ack: u32,
    /// How many acknowledgements in a row carried `last_ack`.
    pub dup_acks: u32,
    bytes_in_flight: usize,
    /// Operative window: peer's advertisement clamped to `ceiling`.
    max_window: u16,
    ceiling: u16,
    mss: usize,
    entries: VecDeque<WindowEntry>,
}

impl SendWindow {
    /// Create an empty window.
    ///
    /// `next_seq` is the first data sequence number (`ISN + 1` after the
    /// handshake) and `rcv_ack` the peer's `ISN + 1`.  The operative window
    /// starts at `ceiling` until the peer advertises otherwise.
    pub fn new(next_seq: u32, rcv_ack: u32, mss: usize, ceiling: u16) -> Self {
        Self {
            next_seq,
            rcv_ack,
            last_ack: next_seq,
            dup_acks: 0,
            bytes_in_flight: 0,
            max_window: ceiling,
            ceiling,
            mss: mss.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn bytes_in_flight(&self) -> usize {
        self.bytes_in_flight
    }

    pub fn max_window(&self) -> u16 {
        self.max_window
    }

    /// Number of segments awaiting acknowledgement.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adopt the peer's advertised window, clamped to the ceiling.
    pub fn set_peer_window(&mut self, advertised: u16) {
        self.max_window = advertised.min(self.ceiling);
    }

    /// Bytes that may still be admitted before the window is full.
    pub fn room(&self) -> usize {
        usize::from(self.max_window).saturating_sub(self.bytes_in_flight)
    }

    /// Size of the next segment cut from `remaining` bytes of caller data.
    ///
    /// Bounded by the MSS and by the operative window itself, so a window
    /// smaller than one MSS still makes progress.
    fn next_segment_len(&self, remaining: usize) -> usize {
        remaining.min(self.mss).min(usize::from(self.max_window))
    }

    /// Cut the next segment from the front of `data` and append it to the
    /// window.
    ///
    /// Returns the number of payload bytes admitted, or `None` when the
    /// window has no room for it (including a zero window).  The new entry
    /// is available through [`newest`](Self::newest) for transmission.
    pub fn admit(&mut self, data: &[u8]) -> Option<usize> {
        let len = self.next_segment_len(data.len());
        if len == 0 || self.bytes_in_flight + len > usize::from(self.max_window) {
            return None;
        }

        let segment = Segment::new(
            self.next_seq,
            self.rcv_ack,
            flags::ACK,
            0,
            data[..len].to_vec(),
        );
        self.entries.push_back(WindowEntry {
            seq: self.next_seq,
            payload_len: len,
            wire: segment.encode(),
            tx_count: 1,
        });
        self.bytes_in_flight += len;
        self.next_seq = self.next_seq.wrapping_add(len as u32);
        debug_assert!(self.bytes_in_flight <= usize::from(self.max_window));
        Some(len)
    }

    /// Most recently admitted segment.
    pub fn newest(&self) -> Option<&WindowEntry> {
        self.entries.back()
    }

    /// Oldest unacknowledged segment.
    pub fn head(&self) -> Option<&WindowEntry> {
        self.entries.front()
    }

    pub fn head_mut(&mut self) -> Option<&mut WindowEntry> {
        self.entries.front_mut()
    }

    /// Locate the in-flight segment starting at `seq`.
    pub fn find_mut(&mut self, seq: u32) -> Option<&mut WindowEntry> {
        self.entries.iter_mut().find(|e| e.seq == seq)
    }

    /// Iterate over all in-flight segments from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &WindowEntry> {
        self.entries.iter()
    }

    /// Retire every segment fully covered by the cumulative `ack`.
    ///
    /// Segments ending at or before `ack` are removed from the head; the
    /// segment starting at `ack` stays as the new head.  Returns the number
    /// of segments retired, or `None` when `ack` lies behind the window or
    /// beyond anything sent.
    pub fn acknowledge(&mut self, ack: u32) -> Option<usize> {
        let base = self.head().map_or(self.next_seq, |e| e.seq);
        if !seq_le(base, ack) || !seq_le(ack, self.next_seq) {
            return None;
        }

        let mut retired = 0usize;
        while let Some(front) = self.entries.front() {
            if !seq_le(front.seq_end(), ack) {
                break;
            }
            self.bytes_in_flight -= front.payload_len;
            self.entries.pop_front();
            retired += 1;
        }
        Some(retired)
    }

    /// Track repetition of acknowledgement numbers.
    ///
    /// An unchanged number bumps the duplicate count; a new one is recorded
    /// and the count restarts at one.  Returns the updated count.
    pub fn record_ack(&mut self, ack: u32) -> u32 {
        if ack == self.last_ack {
            self.dup_acks += 1;
        } else {
            self.last_ack = ack;
            self.dup_acks = 1;
        }
        self.dup_acks
    }
}

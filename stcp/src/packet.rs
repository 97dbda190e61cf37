//! Wire-format definitions for STCP segments.
//!
//! Every datagram exchanged between peers is a [`Segment`].  This module is
//! responsible for:
//! - Defining the on-wire binary layout (TCP-shaped header, flags, payload).
//! - Serialising a [`Segment`] into a byte buffer ready for transmission.
//! - Validating and deserialising a raw datagram back into a [`Segment`].
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       Source Port (0)         |     Destination Port (0)      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Sequence Number                        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                    Acknowledgment Number                      |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Offset|  Reserved |   Flags   |            Window             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Checksum            |      Urgent Pointer (0)       |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 20 bytes, so the data offset nibble is
//! always 5.  The payload length is implied by the datagram length.

/// Bit-flag constants for the low bits of the offset/flags word.
pub mod flags {
    /// Finish: sender has no more data to send.
    pub const FIN: u16 = 0x0001;
    /// Synchronise sequence numbers (handshake initiation).
    pub const SYN: u16 = 0x0002;
    /// Acknowledgement field is valid.
    pub const ACK: u16 = 0x0010;

    /// Mask covering every flag bit we understand.
    pub const MASK: u16 = 0x003f;
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 20;

/// Header length in 32-bit words, as carried in the top nibble.
const DATA_OFFSET_WORDS: u16 = (HEADER_LEN / 4) as u16;

// Byte offsets of each field within the serialised header.
const OFF_SRC_PORT: usize = 0;
const OFF_DST_PORT: usize = 2;
const OFF_SEQ: usize = 4;
const OFF_ACK: usize = 8;
const OFF_FLAGS: usize = 12;
const OFF_WINDOW: usize = 14;
const OFF_CHECKSUM: usize = 16;
const OFF_URGENT: usize = 18;

/// Fixed-size segment header.
///
/// Fields are in host byte order; [`Segment::encode`] converts to big-endian
/// on the wire and [`Segment::decode`] converts back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Header {
    /// Unused by the protocol; always zero on the wire we produce.
    pub src_port: u16,
    /// Unused by the protocol; always zero on the wire we produce.
    pub dst_port: u16,
    /// Sequence number of the first payload byte in this segment.
    pub seq: u32,
    /// Acknowledgement number (next expected sequence number from the peer).
    pub ack: u32,
    /// Bitmask of [`flags`] constants (data offset stripped).
    pub flags: u16,
    /// Advertised receive-window size in bytes.
    pub window: u16,
    /// Internet checksum (RFC 1071) as found on the wire.
    ///
    /// Ignored by encode, which always computes a fresh value.
    pub checksum: u16,
}

/// A complete protocol datagram: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Segment {
    /// Build a segment with zeroed ports and checksum.
    pub fn new(seq: u32, ack: u32, flags: u16, window: u16, payload: Vec<u8>) -> Self {
        Self {
            header: Header {
                seq,
                ack,
                flags,
                window,
                ..Header::default()
            },
            payload,
        }
    }

    /// `true` when every bit in `mask` is set on this segment.
    pub fn has(&self, mask: u16) -> bool {
        self.header.flags & mask == mask
    }

    /// Sequence number immediately after this segment's payload.
    pub fn seq_end(&self) -> u32 {
        self.header.seq.wrapping_add(self.payload.len() as u32)
    }

    /// Serialise this segment into a newly allocated byte vector.
    ///
    /// The checksum is computed over the full wire image with the checksum
    /// field zeroed, then written in place.  The returned bytes can be resent
    /// verbatim on retransmission.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        let h = &self.header;

        buf[OFF_SRC_PORT..OFF_SRC_PORT + 2].copy_from_slice(&h.src_port.to_be_bytes());
        buf[OFF_DST_PORT..OFF_DST_PORT + 2].copy_from_slice(&h.dst_port.to_be_bytes());
        buf[OFF_SEQ..OFF_SEQ + 4].copy_from_slice(&h.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 4].copy_from_slice(&h.ack.to_be_bytes());
        let word = (DATA_OFFSET_WORDS << 12) | (h.flags & flags::MASK);
        buf[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&word.to_be_bytes());
        buf[OFF_WINDOW..OFF_WINDOW + 2].copy_from_slice(&h.window.to_be_bytes());
        // Checksum and urgent pointer stay zero while summing.
        buf[HEADER_LEN..].copy_from_slice(&self.payload);

        let csum = internet_checksum(&buf);
        buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());
        buf
    }

    /// Validate and parse a [`Segment`] from a raw datagram.
    ///
    /// The checksum is verified over the bytes exactly as received, before any
    /// field is interpreted.  Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - the checksum does not fold to zero, or
    /// - the data offset points outside the datagram.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort(buf.len()));
        }
        if !verify_checksum(buf) {
            return Err(PacketError::ChecksumFailed);
        }

        let word = read_u16(buf, OFF_FLAGS);
        let data_offset = usize::from(word >> 12) * 4;
        if data_offset < HEADER_LEN || data_offset > buf.len() {
            return Err(PacketError::BadDataOffset(data_offset));
        }

        Ok(Segment {
            header: Header {
                src_port: read_u16(buf, OFF_SRC_PORT),
                dst_port: read_u16(buf, OFF_DST_PORT),
                seq: read_u32(buf, OFF_SEQ),
                ack: read_u32(buf, OFF_ACK),
                flags: word & flags::MASK,
                window: read_u16(buf, OFF_WINDOW),
                checksum: read_u16(buf, OFF_CHECKSUM),
            },
            payload: buf[data_offset..].to_vec(),
        })
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = &self.header;
        let mut names = Vec::with_capacity(3);
        if h.flags & flags::SYN != 0 {
            names.push("SYN");
        }
        if h.flags & flags::FIN != 0 {
            names.push("FIN");
        }
        if h.flags & flags::ACK != 0 {
            names.push("ACK");
        }
        write!(
            f,
            "[{}] seq={} ack={} win={} len={}",
            names.join("|"),
            h.seq,
            h.ack,
            h.window,
            self.payload.len()
        )
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("datagram of {0} bytes is too short to contain a header")]
    BufferTooShort(usize),
    #[error("checksum verification failed")]
    ChecksumFailed,
    #[error("data offset {0} is outside the datagram")]
    BadDataOffset(usize),
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// Sum consecutive 16-bit big-endian words, fold the carry, return the
/// one's-complement.  The caller must zero any checksum field within `data`
/// before calling this function when producing a checksum.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for pair in &mut chunks {
        sum += u32::from(u16::from_be_bytes([pair[0], pair[1]]));
    }
    // Odd trailing byte: pad with a zero byte on the right.
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}

/// `true` when the checksum over the as-received bytes folds to zero.
pub fn verify_checksum(raw: &[u8]) -> bool {
    internet_checksum(raw) == 0
}

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([buf[off], buf[off + 1]])
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

//! `stcp`: a reliable byte stream implemented over UDP.
//!
//! # Architecture
//!
//! ```text
//!  caller ── send(data) ──▶ ┌──────────────────────────────┐
//!                           │          Connection          │
//!                           │  state machine + retransmit  │
//!                           ├──────────────┬───────────────┤
//!                           │  SendWindow  │ ack::process  │
//!                           └──────┬───────┴───────▲───────┘
//!                          segments│               │ACKs
//!                           ┌──────▼───────────────┴───────┐
//!                           │   Socket (connected UDP)     │
//!                           └──────┬───────────────▲───────┘
//!                                  │               │
//!                           ┌──────▼───────────────┴───────┐
//!                           │    Receiver / receive()      │
//!                           └──────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]:      wire format and Internet checksum
//! - [`window`]:      sliding send window and admission control
//! - [`ack`]:         validation and application of inbound ACKs
//! - [`timer`]:       retransmission timeout back-off
//! - [`connection`]:  sender control block (open, send, flush, close)
//! - [`receiver`]:    receive-side state machine and accept loop
//! - [`state`]:       finite-state-machine types
//! - [`socket`]:      async UDP socket with deadline-bounded receive
//! - [`config`]:      protocol constants and tunables
//! - [`error`]:       connection error type

pub mod ack;
pub mod config;
pub mod connection;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod socket;
pub mod state;
pub mod timer;
pub mod window;

pub use config::StcpConfig;
pub use connection::Connection;
pub use error::ConnError;
pub use packet::{PacketError, Segment};
pub use receiver::{receive, Receiver};
pub use socket::Socket;
pub use state::ConnectionState;

//! The command channel.
//!
//! Text commands arrive fragmented by the transport that carries them, get
//! reassembled per connection, cross from event context into the main loop
//! when needed, run against the board, and are acknowledged where the
//! transport allows it.
//!
//! ```text
//!  transport bytes ──▶ CommandBuffer ──▶ (BLE) CommandQueue ──▶ Evaluator ──▶ reply
//!                         (frame)          (queue)               (board)     (response)
//!                            │                                       ▲
//!                            └────────── (UART / TCP) ───────────────┘
//! ```
//!
//! All of the pieces are owned by a [`Session`](session::Session), which the
//! main loop holds and lends to the transport adapters.

use core::fmt;

pub mod command;
pub mod evaluator;
pub mod frame;
pub mod queue;
pub mod registry;
pub mod response;
pub mod session;

pub use evaluator::{Board, Evaluator, ExecutionResult};
pub use frame::{CommandBuffer, CommandText};
pub use queue::{CommandQueue, PendingCommand, QueuePolicy};
pub use registry::{ConnectionId, ConnectionRegistry, Peer};
pub use session::Session;

/// The transport a connection arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Serial-over-Bluetooth (HC-05) or any other UART link.
    Uart,
    /// An accepted WiFi TCP socket.
    Tcp,
    /// A BLE central writing to the command characteristic.
    Ble,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Uart => write!(f, "uart"),
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::Ble => write!(f, "ble"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TransportKind {
    fn format(&self, f: defmt::Formatter) {
        match self {
            TransportKind::Uart => defmt::write!(f, "uart"),
            TransportKind::Tcp => defmt::write!(f, "tcp"),
            TransportKind::Ble => defmt::write!(f, "ble"),
        }
    }
}

//! Transport adapters.
//!
//! Each adapter moves bytes between one kind of link and a
//! [`Session`](crate::channel::Session):
//!
//! - [`uart`]: polled serial port (HC-05 serial Bluetooth), line framing,
//!   `\r\n` replies.
//! - [`tcp`]: one accepted socket at a time, line framing, `\n` replies.
//! - [`ble`]: GATT write events, sentinel framing, queued evaluation, no
//!   replies.
//!
//! The adapters only see the [`network`](crate::network) traits and the
//! [`BleEvent`](ble::BleEvent) enum, so the concrete UART, socket and radio
//! drivers stay with the platform.

pub mod ble;
pub mod tcp;
pub mod uart;

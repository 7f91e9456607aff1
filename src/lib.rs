//! # boardlink - remote command channel for the BitDogLab board
//!
//! A companion app drives the board (LED matrix, RGB LED, buzzer, OLED, the
//! Snake game) by sending short text commands over one of three links:
//!
//! - serial Bluetooth through an HC-05 module (UART),
//! - a WiFi TCP socket,
//! - a BLE GATT characteristic.
//!
//! This crate is the channel between those links and the hardware. It
//! reassembles commands from each transport's fragments, moves them from
//! radio event context into the main loop, runs them against a [`Board`]
//! implementation, and acknowledges them where the transport allows it.
//!
//! ## Layout
//!
//! - [`channel`]: framing, connection registry, queue, command vocabulary,
//!   evaluator, replies, and the [`Session`] that owns them.
//! - [`transport`]: UART, TCP and BLE adapters.
//! - [`network`]: the byte-stream traits the adapters are written against.
//! - [`config`]: [`ChannelConfig`] and its JSON loader.
//!
//! ## Usage
//!
//! ```rust
//! use boardlink::channel::command::{LedAction, PixelWrite, RgbDuty, DisplayLine};
//! use boardlink::channel::evaluator::HardwareError;
//! use boardlink::channel::{Board, ExecutionResult, Session};
//! use boardlink::config::ChannelConfig;
//!
//! #[derive(Default)]
//! struct Leds {
//!     on: bool,
//! }
//!
//! impl Board for Leds {
//!     fn set_led(&mut self, action: LedAction) -> Result<(), HardwareError> {
//!         self.on = match action {
//!             LedAction::On => true,
//!             LedAction::Off => false,
//!             LedAction::Toggle => !self.on,
//!         };
//!         Ok(())
//!     }
//!     # fn set_rgb(&mut self, _: RgbDuty) -> Result<(), HardwareError> { Ok(()) }
//!     # fn write_pixels(&mut self, _: &[PixelWrite]) -> Result<(), HardwareError> { Ok(()) }
//!     # fn clear_pixels(&mut self) -> Result<(), HardwareError> { Ok(()) }
//!     # fn play_tone(&mut self, _: u32, _: u32, _: u16) -> Result<(), HardwareError> { Ok(()) }
//!     # fn show_text(&mut self, _: &[DisplayLine]) -> Result<(), HardwareError> { Ok(()) }
//!     # fn clear_display(&mut self) -> Result<(), HardwareError> { Ok(()) }
//!     # fn start_game(&mut self) -> Result<(), HardwareError> { Ok(()) }
//!     # fn stop_game(&mut self) -> Result<(), HardwareError> { Ok(()) }
//! }
//!
//! let mut session = Session::new(ChannelConfig::default(), Leds::default());
//! assert_eq!(session.evaluate("led.on()"), Some(ExecutionResult::Success));
//! assert!(session.board().on);
//! assert_eq!(session.evaluate("   "), None);
//! ```
//!
//! ## Optional Features
//!
//! - `std` (default): `std::net` TCP server and `std::error::Error` impls
//! - `async`: async connection traits and an async TCP driver
//! - `defmt`: defmt formatting for every error type

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// The command channel: framing, registry, queue, evaluation and replies.
pub mod channel;

/// Runtime configuration.
pub mod config;

/// Byte-stream traits shared by the line-framed transports.
pub mod network;

/// UART, TCP and BLE adapters.
pub mod transport;

pub use channel::{Board, ExecutionResult, Session};
pub use config::ChannelConfig;

//! BLE GATT adapter.
//!
//! The device is a peripheral exposing one custom service with one
//! write-only characteristic. A central writes a command as one or more
//! chunks followed by the sentinel chunk. There is no read or notify path,
//! so results only appear in the log.
//!
//! The radio stack calls [`BlePeripheral::handle_event`] from its event
//! context. That path only updates buffers and queues completed commands,
//! except for urgent commands, which run inline. The main loop calls
//! [`BlePeripheral::service_queue`] every
//! [`poll_interval_ms`](crate::config::ChannelConfig::poll_interval_ms) to run
//! the queued ones.

use core::fmt::Debug;

use log::{debug, info, warn};

use crate::channel::TransportKind;
use crate::channel::evaluator::{Board, ExecutionResult};
use crate::channel::registry::Peer;
use crate::channel::session::{Dispatch, Session};

/// Custom command service.
pub const SERVICE_UUID: &str = "71153466-1910-4388-A310-000B17D061AB";

/// Write-only command characteristic.
pub const COMMAND_CHARACTERISTIC_UUID: &str = "834E4EDC-2012-42AB-B3D7-001B17D061AB";

/// Events delivered by the radio stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleEvent<'a> {
    /// A central connected.
    CentralConnect {
        /// Stack-assigned connection handle.
        conn_handle: u16,
    },
    /// A central went away.
    CentralDisconnect {
        /// Handle of the departed central.
        conn_handle: u16,
    },
    /// A central wrote `data` to the attribute `value_handle`.
    GattsWrite {
        /// Writing central.
        conn_handle: u16,
        /// Attribute written.
        value_handle: u16,
        /// Written bytes.
        data: &'a [u8],
    },
}

/// Starts advertising on the platform's radio.
pub trait Advertiser {
    /// Radio error.
    type Error: Debug;

    /// Advertise the command service as `name` every `interval_us`.
    fn advertise(&mut self, name: &str, interval_us: u32) -> Result<(), Self::Error>;
}

/// The command peripheral.
#[derive(Debug)]
pub struct BlePeripheral<A> {
    advertiser: A,
    command_handle: u16,
}

impl<A: Advertiser> BlePeripheral<A> {
    /// Create the peripheral and start advertising.
    ///
    /// `command_handle` is the value handle the stack assigned to the command
    /// characteristic when the service was registered.
    pub fn new<B: Board>(advertiser: A, command_handle: u16, session: &mut Session<B>) -> Self {
        let mut peripheral = Self {
            advertiser,
            command_handle,
        };
        peripheral.advertise(session);
        peripheral
    }

    /// Value handle of the command characteristic.
    pub fn command_handle(&self) -> u16 {
        self.command_handle
    }

    /// The radio's advertiser.
    pub fn advertiser(&self) -> &A {
        &self.advertiser
    }

    fn advertise<B: Board>(&mut self, session: &mut Session<B>) {
        let config = session.config();
        let outcome = self
            .advertiser
            .advertise(config.device_name.as_str(), config.advertise_interval_us);
        match outcome {
            Ok(()) => {
                info!("advertising as '{}'", session.config().device_name);
                session.registry_mut().set_advertising(true);
            }
            Err(error) => warn!("advertising failed: {:?}", error),
        }
    }

    /// Handle one radio event. Runs in event context.
    ///
    /// Returns what happened to a command completed by a write, if any.
    pub fn handle_event<B: Board>(
        &mut self,
        session: &mut Session<B>,
        event: BleEvent<'_>,
    ) -> Option<Dispatch> {
        match event {
            BleEvent::CentralConnect { conn_handle } => {
                if let Err(error) = session.open(TransportKind::Ble, Peer::Central(conn_handle)) {
                    warn!("central {} refused: {}", conn_handle, error);
                }
                None
            }
            BleEvent::CentralDisconnect { conn_handle } => {
                match session.registry().find_central(conn_handle) {
                    Some(id) => {
                        if let Err(error) = session.close(id) {
                            warn!("central {} close failed: {}", conn_handle, error);
                        }
                    }
                    None => debug!("disconnect from unknown central {}", conn_handle),
                }
                self.advertise(session);
                None
            }
            BleEvent::GattsWrite {
                conn_handle,
                value_handle,
                data,
            } => {
                if value_handle != self.command_handle {
                    debug!("ignoring write to handle {}", value_handle);
                    return None;
                }
                let Some(id) = session.registry().find_central(conn_handle) else {
                    warn!("write from unknown central {}", conn_handle);
                    return None;
                };
                match session.ble_chunk(id, data) {
                    Ok(dispatch) => {
                        if let Some(Dispatch::Immediate(result)) = &dispatch {
                            log_outcome("priority", result);
                        }
                        dispatch
                    }
                    Err(error) => {
                        warn!("central {}: {}", conn_handle, error);
                        None
                    }
                }
            }
        }
    }

    /// Run every queued command. Call from the main loop.
    ///
    /// Returns how many ran.
    pub fn service_queue<B: Board>(&mut self, session: &mut Session<B>) -> usize {
        let mut ran = 0;
        while let Some((pending, result)) = session.poll_queue() {
            debug!("ran queued command #{} from {}", pending.seq, pending.origin);
            log_outcome("queued", &result);
            ran += 1;
        }
        ran
    }
}

fn log_outcome(path: &str, result: &ExecutionResult) {
    match result {
        ExecutionResult::Success => info!("ble {} command ok", path),
        ExecutionResult::Failure(message) => warn!("ble {} command failed: {}", path, message),
    }
}

//! Polled serial adapter.
//!
//! The HC-05 firmware has no connect or disconnect signal: there is a single
//! implicit peer, and the main loop checks the port for data every few
//! milliseconds. [`UartLink::poll`] is that check.

use core::fmt;

use log::{info, warn};

use crate::channel::TransportKind;
use crate::channel::evaluator::Board;
use crate::channel::registry::{ClosedConnection, ConnectionId, Peer};
use crate::channel::response::{self, ReplyStyle};
use crate::channel::session::{Session, SessionError};
use crate::network::{Read, Write};

/// Sent once when the link starts.
pub const GREETING: &str = "System started\r\n";

/// Bytes requested from the port per read.
pub const READ_CHUNK: usize = 64;

/// Serial command link.
#[derive(Debug)]
pub struct UartLink<S> {
    serial: S,
    id: Option<ConnectionId>,
    greeted: bool,
}

impl<S: Read + Write> UartLink<S> {
    /// Wrap a serial port. Nothing is sent until [`start`](Self::start).
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            id: None,
            greeted: false,
        }
    }

    /// Register the serial connection and send the greeting.
    ///
    /// Safe to call repeatedly; the greeting is only sent once.
    pub fn start<B: Board>(&mut self, session: &mut Session<B>) -> Result<ConnectionId, SessionError> {
        let id = session.open(TransportKind::Uart, Peer::Implicit)?;
        if !self.greeted {
            response::send(&mut self.serial, GREETING);
            self.greeted = true;
            info!("uart link {} started", id);
        }
        self.id = Some(id);
        Ok(id)
    }

    /// Drain whatever the port has buffered.
    ///
    /// Each complete line is evaluated and acknowledged. Partial lines stay
    /// buffered until a later poll. A read failure drops the partial line and
    /// answers `Read Error: …`. Returns how many commands ran.
    pub fn poll<B: Board>(&mut self, session: &mut Session<B>) -> Result<usize, SessionError>
    where
        <S as Read>::Error: fmt::Display,
    {
        let id = match self.id {
            Some(id) if session.is_open(id) => id,
            _ => self.start(session)?,
        };

        let mut chunk = [0u8; READ_CHUNK];
        let mut evaluated = 0;
        loop {
            match self.serial.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    evaluated += session.feed_line(id, &chunk[..n], &mut self.serial, ReplyStyle::Serial)?;
                }
                Err(error) => {
                    warn!("uart read failed: {}", error);
                    if let Some(buffer) = session.registry_mut().buffer_mut(id) {
                        buffer.reset();
                    }
                    response::send(&mut self.serial, &ReplyStyle::Serial.read_error(&error));
                    break;
                }
            }
        }
        Ok(evaluated)
    }

    /// Leave command mode, dropping any partial line.
    pub fn stop<B: Board>(
        &mut self,
        session: &mut Session<B>,
    ) -> Result<Option<ClosedConnection>, SessionError> {
        match self.id.take() {
            Some(id) if session.is_open(id) => session.close(id).map(Some),
            _ => Ok(None),
        }
    }

    /// The port.
    pub fn serial(&self) -> &S {
        &self.serial
    }

    /// The port, mutably.
    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    /// Give the port back.
    pub fn into_inner(self) -> S {
        self.serial
    }
}

//! The explicit session object.
//!
//! A [`Session`] owns everything the command channel shares between
//! transports: the registry with its per-connection buffers, the BLE queue,
//! and the evaluator with its board. The main loop owns the session and lends
//! it to each adapter as `&mut Session<B>`.
//!
//! The session also enforces the lifecycle cascade. Closing a connection
//! clears its buffer and discards every queued command it produced.

use core::fmt;

use log::{debug, info, warn};

use super::TransportKind;
use super::evaluator::{Board, Evaluator, ExecutionResult, LinkEvent};
use super::frame::FrameError;
use super::queue::{CommandQueue, PendingCommand, SubmitOutcome, is_urgent};
use super::registry::{ClosedConnection, ConnectionId, ConnectionRegistry, Peer, RegistryError};
use super::response::{self, ReplyLine, ReplyStyle};
use crate::config::ChannelConfig;
use crate::network::Write;

/// What happened to a command completed by a BLE chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Priority bypass: it already ran.
    Immediate(ExecutionResult),
    /// It was handed to the queue.
    Queued(SubmitOutcome),
}

/// Errors from session operations. None of them is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// Opening, closing or finding a connection failed.
    Registry(RegistryError),
    /// A BLE frame was dropped.
    Frame(FrameError),
}

impl From<RegistryError> for SessionError {
    fn from(error: RegistryError) -> Self {
        SessionError::Registry(error)
    }
}

impl From<FrameError> for SessionError {
    fn from(error: FrameError) -> Self {
        SessionError::Frame(error)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Registry(error) => write!(f, "{}", error),
            SessionError::Frame(error) => write!(f, "{}", error),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SessionError {}

#[cfg(feature = "defmt")]
impl defmt::Format for SessionError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SessionError::Registry(error) => defmt::write!(f, "Registry({})", error),
            SessionError::Frame(error) => defmt::write!(f, "Frame({})", error),
        }
    }
}

/// Shared state of the command channel.
#[derive(Debug)]
pub struct Session<B> {
    config: ChannelConfig,
    registry: ConnectionRegistry,
    queue: CommandQueue,
    evaluator: Evaluator<B>,
    seq: u32,
}

impl<B: Board> Session<B> {
    /// A session with no connections and an empty queue.
    pub fn new(config: ChannelConfig, board: B) -> Self {
        Self {
            queue: CommandQueue::new(config.queue_policy),
            registry: ConnectionRegistry::new(),
            evaluator: Evaluator::new(board),
            config,
            seq: 0,
        }
    }

    /// Settings the session was built with.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Open connections.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Open connections, mutably.
    pub fn registry_mut(&mut self) -> &mut ConnectionRegistry {
        &mut self.registry
    }

    /// Commands waiting for [`poll_queue`](Self::poll_queue).
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// The board commands run against.
    pub fn board(&self) -> &B {
        self.evaluator.board()
    }

    /// The board, mutably.
    pub fn board_mut(&mut self) -> &mut B {
        self.evaluator.board_mut()
    }

    /// Open a connection.
    ///
    /// A connection retired by this open (the previous TCP client, or a stale
    /// BLE entry with the same handle) goes through the full close cascade
    /// first. Reopening UART returns the existing id without a new link event.
    pub fn open(&mut self, kind: TransportKind, peer: Peer) -> Result<ConnectionId, SessionError> {
        let retiring = match (kind, peer) {
            (TransportKind::Uart, Peer::Implicit) => {
                let existing = self.registry.iter().find(|c| c.kind() == kind).map(|c| c.id());
                if let Some(id) = existing {
                    return Ok(id);
                }
                None
            }
            (TransportKind::Tcp, Peer::Socket(_)) => {
                self.registry.iter().find(|c| c.kind() == kind).map(|c| c.id())
            }
            (TransportKind::Ble, Peer::Central(handle)) => self.registry.find_central(handle),
            _ => return Err(RegistryError::PeerMismatch.into()),
        };
        if let Some(stale) = retiring {
            self.close(stale)?;
        }

        let id = self.registry.open(kind, peer)?;
        self.evaluator.board_mut().link_event(kind, LinkEvent::Connected);
        Ok(id)
    }

    /// Close a connection, dropping its partial input and its queued commands.
    pub fn close(&mut self, id: ConnectionId) -> Result<ClosedConnection, SessionError> {
        let closed = self.registry.close(id)?;
        let dropped = self.queue.discard_from(id);
        if dropped > 0 {
            info!("discarded {} queued command(s) from {}", dropped, id);
        }
        self.evaluator
            .board_mut()
            .link_event(closed.kind, LinkEvent::Disconnected);
        Ok(closed)
    }

    /// Whether `id` is still registered.
    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.registry.is_open(id)
    }

    /// Evaluate a command directly. `None` for blank text.
    pub fn evaluate(&mut self, text: &str) -> Option<ExecutionResult> {
        self.evaluator.evaluate(text)
    }

    /// Line-framed input (UART, TCP).
    ///
    /// Every command completed by `bytes` is evaluated in arrival order and
    /// acknowledged on `writer` in `style`. A frame that fails to decode is
    /// dropped and reported on `writer`. Returns how many commands ran.
    pub fn feed_line<W: Write>(
        &mut self,
        id: ConnectionId,
        bytes: &[u8],
        writer: &mut W,
        style: ReplyStyle,
    ) -> Result<usize, SessionError> {
        let limit = self.config.reply_message_limit;
        let buffer = self
            .registry
            .buffer_mut(id)
            .ok_or(RegistryError::UnknownConnection(id))?;

        let mut evaluated = 0;
        for frame in buffer.line_frames(bytes) {
            match frame {
                Ok(text) => {
                    let Some(result) = self.evaluator.evaluate(&text) else {
                        continue;
                    };
                    evaluated += 1;
                    response::reply(writer, style, &result, limit);
                }
                Err(error) => {
                    warn!("{}: frame dropped: {}", id, error);
                    response::send(writer, &frame_error_line(style, error, limit));
                }
            }
        }
        Ok(evaluated)
    }

    /// Line-framed input, one byte at a time.
    ///
    /// Returns the rendered acknowledgment when `byte` completes a command,
    /// for drivers that write replies themselves (the async TCP driver).
    pub fn line_byte(
        &mut self,
        id: ConnectionId,
        byte: u8,
        style: ReplyStyle,
    ) -> Result<Option<ReplyLine>, SessionError> {
        let limit = self.config.reply_message_limit;
        let buffer = self
            .registry
            .buffer_mut(id)
            .ok_or(RegistryError::UnknownConnection(id))?;

        let line = match buffer.push_line_byte(byte) {
            None => None,
            Some(Ok(text)) => self
                .evaluator
                .evaluate(&text)
                .map(|result| style.render(&result, limit)),
            Some(Err(error)) => {
                warn!("{}: frame dropped: {}", id, error);
                Some(frame_error_line(style, error, limit))
            }
        };
        Ok(line)
    }

    /// Sentinel-framed input (BLE). Runs in event context.
    ///
    /// A completed command is queued for [`poll_queue`](Self::poll_queue),
    /// unless it is on the urgent allow-list, in which case it runs here and
    /// now. Returns `Ok(None)` while the command is still incomplete.
    pub fn ble_chunk(
        &mut self,
        id: ConnectionId,
        chunk: &[u8],
    ) -> Result<Option<Dispatch>, SessionError> {
        let buffer = self
            .registry
            .buffer_mut(id)
            .ok_or(RegistryError::UnknownConnection(id))?;
        if buffer.transport() != TransportKind::Ble {
            return Err(RegistryError::PeerMismatch.into());
        }
        debug!("{}: chunk of {} bytes", id, chunk.len());

        let text = match buffer.push_chunk(chunk, self.config.sentinel.as_bytes()) {
            None => return Ok(None),
            Some(Ok(text)) => text,
            Some(Err(error)) => {
                warn!("{}: frame dropped: {}", id, error);
                return Err(error.into());
            }
        };

        if is_urgent(&text, &self.config.urgent_commands) {
            info!("{}: priority command '{}'", id, text);
            return Ok(self.evaluator.evaluate(&text).map(Dispatch::Immediate));
        }

        let pending = PendingCommand {
            text,
            origin: id,
            seq: self.next_seq(),
        };
        let outcome = self.queue.submit(pending);
        match &outcome {
            SubmitOutcome::Accepted => debug!("{}: command queued", id),
            SubmitOutcome::Replaced(old) => warn!(
                "{}: replaced unexecuted command '{}' from {}",
                id, old.text, old.origin
            ),
            SubmitOutcome::Rejected(new) => {
                warn!("{}: queue full, dropped '{}'", id, new.text)
            }
        }
        Ok(Some(Dispatch::Queued(outcome)))
    }

    /// Main-loop side of the BLE queue: run the oldest waiting command.
    ///
    /// There is no reply path, so the outcome is logged and returned.
    pub fn poll_queue(&mut self) -> Option<(PendingCommand, ExecutionResult)> {
        let pending = self.queue.take()?;
        let result = self.evaluator.evaluate(&pending.text)?;
        if result.is_success() {
            info!("{}: '{}' ok", pending.origin, pending.text);
        }
        Some((pending, result))
    }

    fn next_seq(&mut self) -> u32 {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }
}

/// Reply for a dropped frame: `Read Error: …` on serial, a failure on sockets.
fn frame_error_line(style: ReplyStyle, error: FrameError, limit: Option<u16>) -> ReplyLine {
    match style {
        ReplyStyle::Serial => style.read_error(&error),
        ReplyStyle::Socket => style.render(&ExecutionResult::failure(&error), limit),
    }
}

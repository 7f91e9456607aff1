//! Frame assembly: turning transport bytes into complete command strings.
//!
//! Two framing disciplines share one buffer type:
//!
//! - **Line framing** (UART, TCP): bytes are consumed one at a time and `\r`
//!   or `\n` ends the command. A line that is blank after trimming is dropped
//!   without producing anything.
//! - **Sentinel framing** (BLE): every GATT write is one chunk. A chunk equal
//!   to the sentinel (`_EOT_` by default) ends the command. Any other chunk is
//!   appended verbatim.
//!
//! Bytes are stored raw and decoded once, when the frame completes, so a
//! multi-byte character split across two chunks still decodes. A frame that is
//! not valid UTF-8 is discarded with [`FrameError::Decode`].
//!
//! # Example
//!
//! ```rust
//! use boardlink::channel::TransportKind;
//! use boardlink::channel::frame::CommandBuffer;
//!
//! let mut buffer = CommandBuffer::new(TransportKind::Ble);
//! assert!(buffer.push_chunk(b"pri", b"_EOT_").is_none());
//! assert!(buffer.push_chunk(b"nt(1)", b"_EOT_").is_none());
//! let frame = buffer.push_chunk(b"_EOT_", b"_EOT_").unwrap().unwrap();
//! assert_eq!(frame.as_str(), "print(1)");
//! ```

use core::fmt;
use core::slice;

use heapless::{String, Vec};

use super::TransportKind;

/// Maximum length in bytes of a single command.
///
/// A full 25-pixel `neopixel("…")` batch is under 400 bytes.
pub const MAX_COMMAND_LEN: usize = 1024;

/// Default end-of-command sentinel for chunked (BLE) input.
pub const DEFAULT_SENTINEL: &str = "_EOT_";

/// ASCII line feed character (0x0A).
pub const ASCII_LF: u8 = 0x0A;
/// ASCII carriage return character (0x0D).
pub const ASCII_CR: u8 = 0x0D;

/// A complete, trimmed command string.
pub type CommandText = String<MAX_COMMAND_LEN>;

/// Where a buffer is in assembling the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// Nothing buffered.
    Idle,
    /// Part of a frame is buffered.
    Accumulating,
    /// A frame was just emitted; the buffer is empty.
    Complete,
    /// The frame outgrew [`MAX_COMMAND_LEN`]; input is dropped until the next
    /// terminator or sentinel.
    Overflowed,
}

/// Framing failures. Both reset the buffer and neither is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The completed frame was not valid UTF-8.
    Decode,
    /// The frame exceeded [`MAX_COMMAND_LEN`].
    Overflow,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Decode => write!(f, "invalid UTF-8 in command"),
            FrameError::Overflow => write!(f, "command too long"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameError {}

#[cfg(feature = "defmt")]
impl defmt::Format for FrameError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            FrameError::Decode => defmt::write!(f, "Decode"),
            FrameError::Overflow => defmt::write!(f, "Overflow"),
        }
    }
}

/// Outcome of feeding one unit (byte or chunk) to a buffer.
pub type Feed = Option<Result<CommandText, FrameError>>;

/// Per-connection reassembly buffer.
#[derive(Debug, Clone)]
pub struct CommandBuffer {
    bytes: Vec<u8, MAX_COMMAND_LEN>,
    transport: TransportKind,
    state: AssemblyState,
}

impl CommandBuffer {
    /// Create an empty buffer for a connection on `transport`.
    pub const fn new(transport: TransportKind) -> Self {
        Self {
            bytes: Vec::new(),
            transport,
            state: AssemblyState::Idle,
        }
    }

    /// The transport this buffer frames for.
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Current assembly state.
    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Number of bytes buffered for the frame in progress.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether no partial frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Drop any partial frame and return to [`AssemblyState::Idle`].
    ///
    /// Returns the number of bytes discarded.
    pub fn reset(&mut self) -> usize {
        let discarded = self.bytes.len();
        self.bytes.clear();
        self.state = AssemblyState::Idle;
        discarded
    }

    /// Line framing: feed a single byte.
    ///
    /// Returns a frame when `byte` is a terminator and the buffered text is not
    /// blank. Returns [`FrameError::Overflow`] once, at the byte that overflows
    /// the buffer.
    pub fn push_line_byte(&mut self, byte: u8) -> Feed {
        match byte {
            ASCII_CR | ASCII_LF => {
                if self.state == AssemblyState::Overflowed {
                    self.reset();
                    None
                } else {
                    self.complete()
                }
            }
            _ => self.append(&[byte]).map(Err),
        }
    }

    /// Line framing over a whole chunk.
    ///
    /// A single `recv` can carry several commands; the iterator yields each
    /// completed frame in arrival order. Bytes after the last terminator stay
    /// buffered for the next chunk.
    pub fn line_frames<'b, 'c>(&'b mut self, chunk: &'c [u8]) -> LineFrames<'b, 'c> {
        LineFrames {
            buffer: self,
            input: chunk.iter(),
        }
    }

    /// Sentinel framing: feed one chunk.
    ///
    /// A chunk equal to `sentinel` completes the frame. Anything else is
    /// appended verbatim.
    pub fn push_chunk(&mut self, chunk: &[u8], sentinel: &[u8]) -> Feed {
        if chunk == sentinel {
            if self.state == AssemblyState::Overflowed {
                self.reset();
                return None;
            }
            return self.complete();
        }
        self.append(chunk).map(Err)
    }

    fn append(&mut self, data: &[u8]) -> Option<FrameError> {
        if self.state == AssemblyState::Overflowed {
            return None;
        }
        if self.bytes.extend_from_slice(data).is_err() {
            self.bytes.clear();
            self.state = AssemblyState::Overflowed;
            return Some(FrameError::Overflow);
        }
        if !self.bytes.is_empty() {
            self.state = AssemblyState::Accumulating;
        }
        None
    }

    fn complete(&mut self) -> Feed {
        let outcome = match core::str::from_utf8(&self.bytes) {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => Some(CommandText::try_from(text.trim()).map_err(|_| FrameError::Overflow)),
            Err(_) => Some(Err(FrameError::Decode)),
        };

        self.bytes.clear();
        self.state = match outcome {
            Some(Ok(_)) => AssemblyState::Complete,
            _ => AssemblyState::Idle,
        };
        outcome
    }
}

/// Iterator over the frames completed by one line-framed chunk.
///
/// Created by [`CommandBuffer::line_frames`].
#[derive(Debug)]
pub struct LineFrames<'b, 'c> {
    buffer: &'b mut CommandBuffer,
    input: slice::Iter<'c, u8>,
}

impl Iterator for LineFrames<'_, '_> {
    type Item = Result<CommandText, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        for &byte in self.input.by_ref() {
            if let Some(frame) = self.buffer.push_line_byte(byte) {
                return Some(frame);
            }
        }
        None
    }
}

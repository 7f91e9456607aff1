//! Command evaluation.
//!
//! The [`Evaluator`] is the only place a command touches hardware. It parses
//! the text against the closed vocabulary in [`command`](super::command),
//! dispatches the result to a [`Board`], and folds every error into an
//! [`ExecutionResult::Failure`]. Nothing escapes it as an `Err`, so the
//! transport loops and the queue consumer keep running whatever the command
//! does.

use core::fmt::{self, Write as _};

use heapless::String;
use log::{debug, warn};

use super::TransportKind;
use super::command::{
    Command, DisplayLine, LedAction, MAX_NAME_LEN, PixelWrite, RgbDuty, SyntaxError,
};

/// Longest failure message carried by an [`ExecutionResult`].
pub const MAX_FAILURE_LEN: usize = 64;

/// Failure text, clipped to [`MAX_FAILURE_LEN`] bytes.
pub type FailureMessage = String<MAX_FAILURE_LEN>;

/// Connection lifecycle notifications delivered to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A peer attached.
    Connected,
    /// A peer went away.
    Disconnected,
}

/// The hardware a command can drive.
///
/// Implementations wrap the platform's LED, PWM, NeoPixel, OLED and buzzer
/// drivers. Every method is expected to return quickly; `play_tone` may block
/// for the tone duration, as the firmware does.
pub trait Board {
    /// Onboard LED.
    fn set_led(&mut self, action: LedAction) -> Result<(), HardwareError>;

    /// RGB LED PWM duties.
    fn set_rgb(&mut self, duty: RgbDuty) -> Result<(), HardwareError>;

    /// Write pixels to the matrix and latch them. Indices are in hardware
    /// order.
    fn write_pixels(&mut self, pixels: &[PixelWrite]) -> Result<(), HardwareError>;

    /// Turn every matrix pixel off.
    fn clear_pixels(&mut self) -> Result<(), HardwareError>;

    /// Sound the buzzer.
    fn play_tone(
        &mut self,
        frequency_hz: u32,
        duration_ms: u32,
        volume: u16,
    ) -> Result<(), HardwareError>;

    /// Replace the OLED contents with `lines`, one per 8 px row.
    fn show_text(&mut self, lines: &[DisplayLine]) -> Result<(), HardwareError>;

    /// Blank the OLED.
    fn clear_display(&mut self) -> Result<(), HardwareError>;

    /// Start the Snake game.
    fn start_game(&mut self) -> Result<(), HardwareError>;

    /// Stop the running game. Stopping an idle board is not an error.
    fn stop_game(&mut self) -> Result<(), HardwareError>;

    /// Connect/disconnect feedback hook. Does nothing by default.
    fn link_event(&mut self, kind: TransportKind, event: LinkEvent) {
        let _ = (kind, event);
    }
}

/// Hardware faults reported by a [`Board`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    /// The peripheral is in use (e.g. a game owns the display).
    Busy,
    /// The peripheral has not been initialized.
    NotReady,
    /// I2C/PIO/PWM bus fault.
    Bus,
    /// The board has no such peripheral.
    Unsupported,
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareError::Busy => write!(f, "device busy"),
            HardwareError::NotReady => write!(f, "device not ready"),
            HardwareError::Bus => write!(f, "bus error"),
            HardwareError::Unsupported => write!(f, "not supported on this board"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HardwareError {}

#[cfg(feature = "defmt")]
impl defmt::Format for HardwareError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            HardwareError::Busy => defmt::write!(f, "Busy"),
            HardwareError::NotReady => defmt::write!(f, "NotReady"),
            HardwareError::Bus => defmt::write!(f, "Bus"),
            HardwareError::Unsupported => defmt::write!(f, "Unsupported"),
        }
    }
}

/// Why a command failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The text is not a well-formed call.
    Syntax(SyntaxError),
    /// The name is not in the vocabulary (clipped to 24 bytes).
    UnknownCommand(String<MAX_NAME_LEN>),
    /// Too few or too many arguments.
    WrongArity {
        /// Command name.
        command: &'static str,
        /// Fewest arguments accepted.
        min: usize,
        /// Most arguments accepted.
        max: usize,
        /// Arguments given.
        found: usize,
    },
    /// An argument has the wrong type or shape (0-based position).
    InvalidArgument {
        /// Command name.
        command: &'static str,
        /// Argument index.
        position: usize,
    },
    /// An argument is outside the hardware's range (0-based position).
    OutOfRange {
        /// Command name.
        command: &'static str,
        /// Argument index.
        position: usize,
    },
    /// The board rejected the command.
    Hardware(HardwareError),
}

impl EvalError {
    pub(crate) fn unknown(name: &str) -> Self {
        let mut clipped = String::new();
        for ch in name.chars() {
            if clipped.push(ch).is_err() {
                break;
            }
        }
        EvalError::UnknownCommand(clipped)
    }
}

impl From<HardwareError> for EvalError {
    fn from(error: HardwareError) -> Self {
        EvalError::Hardware(error)
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Syntax(error) => write!(f, "syntax error: {}", error),
            EvalError::UnknownCommand(name) => write!(f, "unknown command '{}'", name),
            EvalError::WrongArity {
                command,
                min,
                max,
                found,
            } => {
                if min == max {
                    write!(f, "{}() takes {} arguments ({} given)", command, min, found)
                } else {
                    write!(
                        f,
                        "{}() takes {} to {} arguments ({} given)",
                        command, min, max, found
                    )
                }
            }
            EvalError::InvalidArgument { command, position } => {
                write!(f, "invalid argument {} to {}()", position + 1, command)
            }
            EvalError::OutOfRange { command, position } => {
                write!(f, "argument {} to {}() out of range", position + 1, command)
            }
            EvalError::Hardware(error) => write!(f, "hardware error: {}", error),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EvalError {}

#[cfg(feature = "defmt")]
impl defmt::Format for EvalError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            EvalError::Syntax(error) => defmt::write!(f, "Syntax({})", error),
            EvalError::UnknownCommand(name) => defmt::write!(f, "UnknownCommand({})", name.as_str()),
            EvalError::WrongArity { command, found, .. } => {
                defmt::write!(f, "WrongArity({}, {})", command, found)
            }
            EvalError::InvalidArgument { command, position } => {
                defmt::write!(f, "InvalidArgument({}, {})", command, position)
            }
            EvalError::OutOfRange { command, position } => {
                defmt::write!(f, "OutOfRange({}, {})", command, position)
            }
            EvalError::Hardware(error) => defmt::write!(f, "Hardware({})", error),
        }
    }
}

/// Outcome of evaluating one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The command ran.
    Success,
    /// The message is never empty.
    Failure(FailureMessage),
}

impl ExecutionResult {
    /// Build a failure from any displayable error, clipping the text to
    /// [`MAX_FAILURE_LEN`] on a character boundary.
    pub fn failure(error: &dyn fmt::Display) -> Self {
        let mut message = FailureMessage::new();
        let _ = write!(Clipped(&mut message), "{}", error);
        if message.is_empty() {
            let _ = message.push_str("command failed");
        }
        ExecutionResult::Failure(message)
    }

    /// Whether this is [`ExecutionResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success)
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionResult::Success => write!(f, "ok"),
            ExecutionResult::Failure(message) => write!(f, "failed: {}", message),
        }
    }
}

/// `fmt::Write` into a fixed string that drops whatever does not fit.
pub(crate) struct Clipped<'a, const N: usize>(pub(crate) &'a mut String<N>);

impl<const N: usize> fmt::Write for Clipped<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.0.push(ch).is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Runs commands against a [`Board`].
#[derive(Debug)]
pub struct Evaluator<B> {
    board: B,
}

impl<B: Board> Evaluator<B> {
    /// Wrap `board`.
    pub fn new(board: B) -> Self {
        Self { board }
    }

    /// Evaluate one command.
    ///
    /// Returns `None` for blank text: nothing runs and nothing should be
    /// replied.
    pub fn evaluate(&mut self, text: &str) -> Option<ExecutionResult> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let outcome = Command::parse(text).and_then(|command| self.execute(&command));
        Some(match outcome {
            Ok(()) => {
                debug!("command '{}' ok", text);
                ExecutionResult::Success
            }
            Err(error) => {
                warn!("command '{}' failed: {}", text, error);
                ExecutionResult::failure(&error)
            }
        })
    }

    /// Dispatch an already-parsed command.
    pub fn execute(&mut self, command: &Command) -> Result<(), EvalError> {
        let board = &mut self.board;
        match command {
            Command::Led(action) => board.set_led(*action)?,
            Command::Rgb(duty) => board.set_rgb(*duty)?,
            Command::SetPixel { index, color } => board.write_pixels(&[PixelWrite {
                index: *index,
                color: *color,
            }])?,
            Command::Pixels(batch) => board.write_pixels(batch)?,
            Command::ClearPixels => board.clear_pixels()?,
            Command::PlayTone {
                frequency_hz,
                duration_ms,
                volume,
            } => board.play_tone(*frequency_hz, *duration_ms, *volume)?,
            Command::ShowText(lines) => board.show_text(lines)?,
            Command::ClearDisplay => board.clear_display()?,
            Command::StartGame => board.start_game()?,
            Command::StopGame => board.stop_game()?,
        }
        Ok(())
    }

    /// The driven board.
    pub fn board(&self) -> &B {
        &self.board
    }

    /// The driven board, mutably.
    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// Give the board back.
    pub fn into_board(self) -> B {
        self.board
    }
}

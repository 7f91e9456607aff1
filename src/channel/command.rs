//! The closed command vocabulary.
//!
//! Commands keep the call syntax the companion app already sends
//! (`led.on()`, `set_pixel(3, 255, 0, 0)`, `update_oled(["Hi"])`), but only
//! the names in [`COMMANDS`] are accepted. Each name maps to one tagged
//! [`Command`] variant. There is no free-form execution.
//!
//! # Grammar
//!
//! ```text
//! command  = name '(' [ arg { ',' arg } ] ')' [ ';' ]
//! name     = ident { '.' ident }
//! arg      = integer | decimal | string | list
//! string   = '"' chars '"' | "'" chars "'"    escapes: \" \' \\ \n \t \r
//! list     = '[' [ string { ',' string } ] ']'
//! ```
//!
//! # Example
//!
//! ```rust
//! use boardlink::channel::command::{Color, Command};
//!
//! let command = Command::parse("set_pixel(3, 255, 0, 0)").unwrap();
//! assert_eq!(
//!     command,
//!     Command::SetPixel { index: 3, color: Color { r: 255, g: 0, b: 0 } }
//! );
//! ```

use core::fmt;

use heapless::{String, Vec};

use super::evaluator::EvalError;

/// Maximum number of arguments in one call.
pub const MAX_ARGS: usize = 8;

/// Number of pixels on the 5x5 LED matrix.
pub const NUM_PIXELS: usize = 25;

/// Text lines on the 128x64 OLED (8 px font).
pub const DISPLAY_LINES: usize = 8;

/// Characters per OLED line (8 px font).
pub const DISPLAY_COLUMNS: usize = 16;

/// Longest unknown command name echoed back in an error.
pub const MAX_NAME_LEN: usize = 24;

/// Longest tone accepted by `play_tone`, in milliseconds.
pub const MAX_TONE_MS: u32 = 60_000;

/// Default `play_tone` duration (0.1 s).
pub const DEFAULT_TONE_MS: u32 = 100;

/// Default `play_tone` PWM duty.
pub const DEFAULT_TONE_VOLUME: u16 = 500;

/// Onboard LED operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedAction {
    /// `led.on()`
    On,
    /// `led.off()`
    Off,
    /// `led.toggle()`
    Toggle,
}

/// An 8-bit RGB color for a matrix pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

/// 16-bit PWM duties for the RGB LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RgbDuty {
    /// Red channel duty.
    pub red: u16,
    /// Green channel duty.
    pub green: u16,
    /// Blue channel duty.
    pub blue: u16,
}

/// One pixel write, with the index already mapped to hardware order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWrite {
    /// Hardware pixel index, `0..NUM_PIXELS`.
    pub index: u8,
    /// Color to latch.
    pub color: Color,
}

/// Pixel writes of one `neopixel` call.
pub type PixelBatch = Vec<PixelWrite, NUM_PIXELS>;
/// One OLED line, clipped to [`DISPLAY_COLUMNS`] bytes.
pub type DisplayLine = String<DISPLAY_COLUMNS>;
/// The lines of one `update_oled` call.
pub type DisplayText = Vec<DisplayLine, DISPLAY_LINES>;

/// A parsed, validated command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `led.on()`, `led.off()`, `led.toggle()`
    Led(LedAction),
    /// `rgb(r, g, b)`
    Rgb(RgbDuty),
    /// `set_pixel(index, r, g, b)`; the index is used as-is.
    SetPixel {
        /// Pixel index, used as-is.
        index: u8,
        /// Pixel color.
        color: Color,
    },
    /// `neopixel("pos:r,g,b;…")`; positions go through [`matrix_index`].
    Pixels(PixelBatch),
    /// `clear_neopixels()` / `clear_matrix()`
    ClearPixels,
    /// `play_tone(freq[, seconds[, volume]])`
    PlayTone {
        /// Tone frequency.
        frequency_hz: u32,
        /// How long the buzzer sounds.
        duration_ms: u32,
        /// PWM duty.
        volume: u16,
    },
    /// `update_oled([lines])`; lines are clipped to the display.
    ShowText(DisplayText),
    /// `clear_oled()`
    ClearDisplay,
    /// `snake_start()`
    StartGame,
    /// `snake_stop()`
    StopGame,
}

impl Command {
    /// Parse and validate one command.
    pub fn parse(text: &str) -> Result<Self, EvalError> {
        let invocation = Invocation::parse(text).map_err(EvalError::Syntax)?;
        let spec = lookup(invocation.name).ok_or_else(|| EvalError::unknown(invocation.name))?;

        let found = invocation.args.len();
        if found < spec.min_args || found > spec.max_args {
            return Err(EvalError::WrongArity {
                command: spec.name,
                min: spec.min_args,
                max: spec.max_args,
                found,
            });
        }

        (spec.build)(&invocation.args).map_err(|fault| match fault {
            ArgFault::Invalid(position) => EvalError::InvalidArgument {
                command: spec.name,
                position,
            },
            ArgFault::OutOfRange(position) => EvalError::OutOfRange {
                command: spec.name,
                position,
            },
        })
    }
}

/// Entry in the command lookup table.
#[derive(Clone)]
pub struct CommandSpec {
    /// Name as written before the parenthesis.
    pub name: &'static str,
    /// Short help text.
    pub description: &'static str,
    /// Fewest arguments accepted.
    pub min_args: usize,
    /// Most arguments accepted.
    pub max_args: usize,
    build: fn(&[Arg<'_>]) -> Result<Command, ArgFault>,
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish()
    }
}

/// Every command the channel accepts.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "led.on",
        description: "Turn the onboard LED on",
        min_args: 0,
        max_args: 0,
        build: |_| Ok(Command::Led(LedAction::On)),
    },
    CommandSpec {
        name: "led.off",
        description: "Turn the onboard LED off",
        min_args: 0,
        max_args: 0,
        build: |_| Ok(Command::Led(LedAction::Off)),
    },
    CommandSpec {
        name: "led.toggle",
        description: "Toggle the onboard LED",
        min_args: 0,
        max_args: 0,
        build: |_| Ok(Command::Led(LedAction::Toggle)),
    },
    CommandSpec {
        name: "rgb",
        description: "Set RGB LED duties (0-65535 each)",
        min_args: 3,
        max_args: 3,
        build: build_rgb,
    },
    CommandSpec {
        name: "set_pixel",
        description: "Set one matrix pixel: index, r, g, b",
        min_args: 4,
        max_args: 4,
        build: build_set_pixel,
    },
    CommandSpec {
        name: "neopixel",
        description: "Batch pixel update: \"pos:r,g,b;pos:r,g,b\"",
        min_args: 1,
        max_args: 1,
        build: build_neopixel,
    },
    CommandSpec {
        name: "clear_neopixels",
        description: "Turn every matrix pixel off",
        min_args: 0,
        max_args: 0,
        build: |_| Ok(Command::ClearPixels),
    },
    CommandSpec {
        name: "clear_matrix",
        description: "Turn every matrix pixel off",
        min_args: 0,
        max_args: 0,
        build: |_| Ok(Command::ClearPixels),
    },
    CommandSpec {
        name: "play_tone",
        description: "Beep: frequency [, seconds [, volume]]",
        min_args: 1,
        max_args: 3,
        build: build_play_tone,
    },
    CommandSpec {
        name: "update_oled",
        description: "Show up to 8 lines of text",
        min_args: 1,
        max_args: DISPLAY_LINES,
        build: build_update_oled,
    },
    CommandSpec {
        name: "clear_oled",
        description: "Blank the display",
        min_args: 0,
        max_args: 0,
        build: |_| Ok(Command::ClearDisplay),
    },
    CommandSpec {
        name: "snake_start",
        description: "Start the Snake game",
        min_args: 0,
        max_args: 0,
        build: |_| Ok(Command::StartGame),
    },
    CommandSpec {
        name: "snake_stop",
        description: "Stop the running game",
        min_args: 0,
        max_args: 0,
        build: |_| Ok(Command::StopGame),
    },
];

/// Find a command by name.
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// Map a logical matrix position to the BitDogLab v7 wiring order.
///
/// The first, third and fifth rows are wired in reverse at their ends, so
/// positions 0↔4, 1↔3, 10↔14, 11↔13, 20↔24 and 21↔23 swap. Every other
/// position maps to itself.
pub fn matrix_index(position: u8) -> u8 {
    match position {
        0 => 4,
        4 => 0,
        1 => 3,
        3 => 1,
        10 => 14,
        14 => 10,
        11 => 13,
        13 => 11,
        20 => 24,
        24 => 20,
        21 => 23,
        23 => 21,
        other => other,
    }
}

/// Malformed call syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxError {
    /// Expected a command name.
    ExpectedName,
    /// Expected `(` after the name.
    ExpectedParen,
    /// Expected `,` or `)` after an argument.
    ExpectedComma,
    /// Input ended inside the call.
    UnexpectedEnd,
    /// A quoted string was never closed.
    UnterminatedString,
    /// A numeric literal could not be parsed.
    InvalidNumber,
    /// A character that cannot start an argument.
    UnexpectedCharacter,
    /// More than [`MAX_ARGS`] arguments or list items.
    TooManyArguments,
    /// Something follows the closing parenthesis.
    TrailingInput,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SyntaxError::ExpectedName => "expected a command name",
            SyntaxError::ExpectedParen => "expected '('",
            SyntaxError::ExpectedComma => "expected ',' or ')'",
            SyntaxError::UnexpectedEnd => "unexpected end of command",
            SyntaxError::UnterminatedString => "unterminated string",
            SyntaxError::InvalidNumber => "invalid number",
            SyntaxError::UnexpectedCharacter => "unexpected character",
            SyntaxError::TooManyArguments => "too many arguments",
            SyntaxError::TrailingInput => "unexpected input after ')'",
        };
        f.write_str(text)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SyntaxError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            SyntaxError::ExpectedName => defmt::write!(f, "ExpectedName"),
            SyntaxError::ExpectedParen => defmt::write!(f, "ExpectedParen"),
            SyntaxError::ExpectedComma => defmt::write!(f, "ExpectedComma"),
            SyntaxError::UnexpectedEnd => defmt::write!(f, "UnexpectedEnd"),
            SyntaxError::UnterminatedString => defmt::write!(f, "UnterminatedString"),
            SyntaxError::InvalidNumber => defmt::write!(f, "InvalidNumber"),
            SyntaxError::UnexpectedCharacter => defmt::write!(f, "UnexpectedCharacter"),
            SyntaxError::TooManyArguments => defmt::write!(f, "TooManyArguments"),
            SyntaxError::TrailingInput => defmt::write!(f, "TrailingInput"),
        }
    }
}

/// A raw argument, borrowed from the command text.
///
/// Strings keep their escape sequences; they are decoded when the command is
/// built.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<'a> {
    /// Integer literal.
    Int(i64),
    /// Literal with a `.` or exponent.
    Float(f32),
    /// Quoted string, escapes undecoded.
    Str(&'a str),
    /// List of quoted strings.
    List(Vec<&'a str, MAX_ARGS>),
}

/// A call split into its name and raw arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation<'a> {
    /// Text before `(`.
    pub name: &'a str,
    /// Arguments in call order.
    pub args: Vec<Arg<'a>, MAX_ARGS>,
}

impl<'a> Invocation<'a> {
    /// Split `text` into name and arguments without interpreting them.
    pub fn parse(text: &'a str) -> Result<Self, SyntaxError> {
        let mut cursor = Cursor { src: text, pos: 0 };
        let mut args = Vec::new();

        cursor.skip_whitespace();
        let name = cursor.name()?;
        cursor.skip_whitespace();
        if !cursor.eat(b'(') {
            return Err(SyntaxError::ExpectedParen);
        }
        cursor.skip_whitespace();

        if !cursor.eat(b')') {
            loop {
                let arg = cursor.arg()?;
                args.push(arg).map_err(|_| SyntaxError::TooManyArguments)?;
                cursor.skip_whitespace();
                if cursor.eat(b',') {
                    cursor.skip_whitespace();
                    continue;
                }
                if cursor.eat(b')') {
                    break;
                }
                return match cursor.peek() {
                    Some(_) => Err(SyntaxError::ExpectedComma),
                    None => Err(SyntaxError::UnexpectedEnd),
                };
            }
        }

        cursor.skip_whitespace();
        cursor.eat(b';');
        cursor.skip_whitespace();
        if cursor.peek().is_some() {
            return Err(SyntaxError::TrailingInput);
        }

        Ok(Self { name, args })
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn name(&mut self) -> Result<&'a str, SyntaxError> {
        let start = self.pos;
        match self.peek() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
            _ => return Err(SyntaxError::ExpectedName),
        }
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_' || b == b'.')
        {
            self.pos += 1;
        }
        Ok(&self.src[start..self.pos])
    }

    fn arg(&mut self) -> Result<Arg<'a>, SyntaxError> {
        match self.peek() {
            None => Err(SyntaxError::UnexpectedEnd),
            Some(b'"') | Some(b'\'') => self.string().map(Arg::Str),
            Some(b'[') => self.list(),
            Some(b) if b.is_ascii_digit() || b == b'-' || b == b'+' || b == b'.' => self.number(),
            Some(_) => Err(SyntaxError::UnexpectedCharacter),
        }
    }

    /// Returns the raw contents between the quotes.
    fn string(&mut self) -> Result<&'a str, SyntaxError> {
        let quote = self.peek();
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b == b'\\' {
                self.pos += 2;
                continue;
            }
            if Some(b) == quote {
                let raw = &self.src[start..self.pos];
                self.pos += 1;
                return Ok(raw);
            }
            self.pos += 1;
        }
        Err(SyntaxError::UnterminatedString)
    }

    fn list(&mut self) -> Result<Arg<'a>, SyntaxError> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.eat(b']') {
            return Ok(Arg::List(items));
        }
        loop {
            match self.peek() {
                Some(b'"') | Some(b'\'') => {
                    let item = self.string()?;
                    items.push(item).map_err(|_| SyntaxError::TooManyArguments)?;
                }
                Some(_) => return Err(SyntaxError::UnexpectedCharacter),
                None => return Err(SyntaxError::UnexpectedEnd),
            }
            self.skip_whitespace();
            if self.eat(b',') {
                self.skip_whitespace();
                continue;
            }
            if self.eat(b']') {
                return Ok(Arg::List(items));
            }
            return match self.peek() {
                Some(_) => Err(SyntaxError::ExpectedComma),
                None => Err(SyntaxError::UnexpectedEnd),
            };
        }
    }

    fn number(&mut self) -> Result<Arg<'a>, SyntaxError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
        {
            self.pos += 1;
        }
        let token = &self.src[start..self.pos];
        if token.contains(['.', 'e', 'E']) {
            token
                .parse::<f32>()
                .map(Arg::Float)
                .map_err(|_| SyntaxError::InvalidNumber)
        } else {
            token
                .parse::<i64>()
                .map(Arg::Int)
                .map_err(|_| SyntaxError::InvalidNumber)
        }
    }
}

/// Decode the escape sequences of a raw string argument into `out`.
///
/// Characters that do not fit are dropped, so the text is clipped to `N` bytes
/// on a character boundary. Unknown escapes keep the escaped character.
pub fn unescape_into<const N: usize>(raw: &str, out: &mut String<N>) {
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        let decoded = if ch == '\\' {
            match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some(other) => other,
                None => break,
            }
        } else {
            ch
        };
        if out.push(decoded).is_err() {
            break;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgFault {
    Invalid(usize),
    OutOfRange(usize),
}

fn int_arg(args: &[Arg<'_>], position: usize) -> Result<i64, ArgFault> {
    match args.get(position) {
        Some(Arg::Int(value)) => Ok(*value),
        _ => Err(ArgFault::Invalid(position)),
    }
}

fn ranged_arg<T: TryFrom<i64>>(args: &[Arg<'_>], position: usize) -> Result<T, ArgFault> {
    let value = int_arg(args, position)?;
    T::try_from(value).map_err(|_| ArgFault::OutOfRange(position))
}

fn build_rgb(args: &[Arg<'_>]) -> Result<Command, ArgFault> {
    Ok(Command::Rgb(RgbDuty {
        red: ranged_arg(args, 0)?,
        green: ranged_arg(args, 1)?,
        blue: ranged_arg(args, 2)?,
    }))
}

fn build_set_pixel(args: &[Arg<'_>]) -> Result<Command, ArgFault> {
    let index: u8 = ranged_arg(args, 0)?;
    if usize::from(index) >= NUM_PIXELS {
        return Err(ArgFault::OutOfRange(0));
    }
    Ok(Command::SetPixel {
        index,
        color: Color {
            r: ranged_arg(args, 1)?,
            g: ranged_arg(args, 2)?,
            b: ranged_arg(args, 3)?,
        },
    })
}

fn build_neopixel(args: &[Arg<'_>]) -> Result<Command, ArgFault> {
    let Some(Arg::Str(spec)) = args.first() else {
        return Err(ArgFault::Invalid(0));
    };

    let mut batch = PixelBatch::new();
    for instruction in spec.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (position, color) = instruction.split_once(':').ok_or(ArgFault::Invalid(0))?;
        let position: u8 = position.trim().parse().map_err(|_| ArgFault::Invalid(0))?;
        if usize::from(position) >= NUM_PIXELS {
            return Err(ArgFault::OutOfRange(0));
        }

        let mut channels = color.split(',').map(|c| c.trim().parse::<u8>());
        let (Some(Ok(r)), Some(Ok(g)), Some(Ok(b)), None) = (
            channels.next(),
            channels.next(),
            channels.next(),
            channels.next(),
        ) else {
            return Err(ArgFault::Invalid(0));
        };

        batch
            .push(PixelWrite {
                index: matrix_index(position),
                color: Color { r, g, b },
            })
            .map_err(|_| ArgFault::OutOfRange(0))?;
    }
    Ok(Command::Pixels(batch))
}

fn build_play_tone(args: &[Arg<'_>]) -> Result<Command, ArgFault> {
    let frequency_hz: u32 = ranged_arg(args, 0)?;
    if frequency_hz == 0 {
        return Err(ArgFault::OutOfRange(0));
    }

    let duration_ms = match args.get(1) {
        None => DEFAULT_TONE_MS,
        Some(Arg::Int(seconds)) => u32::try_from(*seconds)
            .ok()
            .and_then(|s| s.checked_mul(1000))
            .ok_or(ArgFault::OutOfRange(1))?,
        Some(Arg::Float(seconds)) => {
            if !seconds.is_finite() || *seconds < 0.0 {
                return Err(ArgFault::OutOfRange(1));
            }
            (*seconds * 1000.0) as u32
        }
        Some(_) => return Err(ArgFault::Invalid(1)),
    };
    if duration_ms > MAX_TONE_MS {
        return Err(ArgFault::OutOfRange(1));
    }

    let volume = match args.get(2) {
        None => DEFAULT_TONE_VOLUME,
        Some(_) => ranged_arg(args, 2)?,
    };

    Ok(Command::PlayTone {
        frequency_hz,
        duration_ms,
        volume,
    })
}

fn build_update_oled(args: &[Arg<'_>]) -> Result<Command, ArgFault> {
    let mut lines = DisplayText::new();
    let mut push_line = |raw: &str, position: usize| -> Result<(), ArgFault> {
        let mut line = DisplayLine::new();
        unescape_into(raw, &mut line);
        lines.push(line).map_err(|_| ArgFault::OutOfRange(position))
    };

    match args {
        [Arg::List(items)] => {
            for item in items {
                push_line(item, 0)?;
            }
        }
        _ => {
            for (position, arg) in args.iter().enumerate() {
                match arg {
                    Arg::Str(raw) => push_line(raw, position)?,
                    _ => return Err(ArgFault::Invalid(position)),
                }
            }
        }
    }
    Ok(Command::ShowText(lines))
}

//! Acknowledgments for line-framed transports.
//!
//! UART and TCP answer every evaluated command with one short line. BLE has
//! no reply path; its outcomes only show up in the log.
//!
//! Replies are best effort: a failed write means the peer is gone, and the
//! read side will notice that on its own. Nothing here retries or returns an
//! error.

use core::fmt::{self, Write as _};

use heapless::String;
use log::debug;

use super::evaluator::{Clipped, ExecutionResult, MAX_FAILURE_LEN};
use crate::network::Write;

/// Longest rendered reply line.
pub const MAX_REPLY_LEN: usize = MAX_FAILURE_LEN + 16;

/// A rendered reply line, terminator included.
pub type ReplyLine = String<MAX_REPLY_LEN>;

/// Reply dialect of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStyle {
    /// `OK\r\n` / `Error: <msg>\r\n` (HC-05 serial firmware).
    Serial,
    /// `OK\n` / `ERROR: <msg>\n` (WiFi socket firmware).
    Socket,
}

impl ReplyStyle {
    fn success(self) -> &'static str {
        match self {
            ReplyStyle::Serial => "OK\r\n",
            ReplyStyle::Socket => "OK\n",
        }
    }

    fn failure_prefix(self) -> &'static str {
        match self {
            ReplyStyle::Serial => "Error: ",
            ReplyStyle::Socket => "ERROR: ",
        }
    }

    fn terminator(self) -> &'static str {
        match self {
            ReplyStyle::Serial => "\r\n",
            ReplyStyle::Socket => "\n",
        }
    }

    /// Render the acknowledgment for `result`.
    ///
    /// `limit` caps the failure message in characters; the prefix and line
    /// terminator are always kept.
    pub fn render(self, result: &ExecutionResult, limit: Option<u16>) -> ReplyLine {
        match result {
            ExecutionResult::Success => self.line("", self.success(), ""),
            ExecutionResult::Failure(message) => {
                let message = clip_chars(message, limit);
                self.line(self.failure_prefix(), message, self.terminator())
            }
        }
    }

    /// Render the line sent when a frame could not be decoded.
    pub fn read_error(self, error: &dyn fmt::Display) -> ReplyLine {
        let mut line = ReplyLine::new();
        let _ = write!(Clipped(&mut line), "Read Error: {}", error);
        self.terminate(line)
    }

    fn line(self, prefix: &str, body: &str, terminator: &str) -> ReplyLine {
        let mut line = ReplyLine::new();
        let _ = Clipped(&mut line).write_str(prefix);
        let _ = Clipped(&mut line).write_str(body);
        if terminator.is_empty() {
            return line;
        }
        self.terminate(line)
    }

    /// Make room for and append the terminator.
    fn terminate(self, mut line: ReplyLine) -> ReplyLine {
        let terminator = self.terminator();
        while line.len() + terminator.len() > MAX_REPLY_LEN {
            if line.pop().is_none() {
                break;
            }
        }
        let _ = line.push_str(terminator);
        line
    }
}

fn clip_chars(text: &str, limit: Option<u16>) -> &str {
    match limit {
        Some(limit) => match text.char_indices().nth(usize::from(limit)) {
            Some((end, _)) => &text[..end],
            None => text,
        },
        None => text,
    }
}

/// Send the acknowledgment for `result` on `writer`.
///
/// Returns whether the whole line was written. A failure is logged and
/// otherwise ignored.
pub fn reply<W: Write>(
    writer: &mut W,
    style: ReplyStyle,
    result: &ExecutionResult,
    limit: Option<u16>,
) -> bool {
    send(writer, &style.render(result, limit))
}

/// Write an already-rendered line, best effort.
pub fn send<W: Write>(writer: &mut W, line: &str) -> bool {
    let outcome = writer
        .write_all(line.as_bytes())
        .and_then(|sent| writer.flush().map(|()| sent));
    match outcome {
        Ok(sent) if sent == line.len() => true,
        Ok(sent) => {
            debug!("reply cut short after {} of {} bytes", sent, line.len());
            false
        }
        Err(error) => {
            debug!("reply dropped: {:?}", error);
            false
        }
    }
}

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;

use boardlink::channel::command::{DisplayLine, LedAction, PixelWrite, RgbDuty};
use boardlink::channel::evaluator::{HardwareError, LinkEvent};
use boardlink::channel::{Board, Session, TransportKind};
use boardlink::config::ChannelConfig;
use boardlink::network::error::Error;
use boardlink::network::{Close, Connection, Read, Write};
use boardlink::transport::ble::Advertiser;

pub const MOCK_BUFFER_SIZE: usize = 4096;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn peer(port: u16) -> SocketAddr {
    SocketAddr::from(([192, 168, 4, 2], port))
}

// -------------------------
// Scripted connection
// -------------------------

#[derive(Debug, Clone)]
pub enum Step {
    Data(Vec<u8>),
    Fail(Error),
}

/// Replays scripted reads and records every write.
///
/// Once the script is exhausted, reads return `Ok(0)`.
#[derive(Debug, Default)]
pub struct MockConnection {
    script: VecDeque<Step>,
    written: heapless::Vec<u8, MOCK_BUFFER_SIZE>,
    pub closed: bool,
    pub fail_writes: bool,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunks(chunks: &[&[u8]]) -> Self {
        let mut conn = Self::new();
        for chunk in chunks {
            conn.push_data(chunk);
        }
        conn
    }

    pub fn push_data(&mut self, data: &[u8]) {
        self.script.push_back(Step::Data(data.to_vec()));
    }

    pub fn push_error(&mut self, error: Error) {
        self.script.push_back(Step::Fail(error));
    }

    pub fn written(&self) -> &str {
        core::str::from_utf8(&self.written).unwrap()
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.script.pop_front() {
            None => Ok(0),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Data(data)) => {
                let len = buf.len().min(data.len());
                buf[..len].copy_from_slice(&data[..len]);
                if len < data.len() {
                    self.script.push_front(Step::Data(data[len..].to_vec()));
                }
                Ok(len)
            }
        }
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.fail_writes {
            return Err(Error::ConnectionClosed);
        }
        self.written
            .extend_from_slice(buf)
            .map_err(|_| Error::WriteError)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for MockConnection {}

// Borrowed form, so a test can inspect the mock after a driver consumed it.

impl Read for &mut MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read(buf)
    }
}

impl Write for &mut MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }
}

impl Close for &mut MockConnection {
    type Error = Error;

    fn close(self) -> Result<(), Self::Error> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(feature = "async")]
mod nonblocking {
    use super::*;
    use boardlink::network::{AsyncClose, AsyncConnection, AsyncRead, AsyncWrite};

    impl AsyncRead for &mut MockConnection {
        type Error = Error;

        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            Read::read(&mut **self, buf)
        }
    }

    impl AsyncWrite for &mut MockConnection {
        type Error = Error;

        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            Write::write(&mut **self, buf)
        }

        async fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    impl AsyncClose for &mut MockConnection {
        type Error = Error;

        async fn close(self) -> Result<(), Self::Error> {
            self.closed = true;
            Ok(())
        }
    }

    impl AsyncConnection for &mut MockConnection {}
}

// -------------------------
// Recording board
// -------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Led(LedAction),
    Rgb(RgbDuty),
    Pixels(Vec<PixelWrite>),
    ClearPixels,
    Tone(u32, u32, u16),
    Text(Vec<String>),
    ClearDisplay,
    StartGame,
    StopGame,
    Link(TransportKind, LinkEvent),
}

#[derive(Debug, Default)]
pub struct RecordingBoard {
    pub calls: Vec<Call>,
    pub fail_with: Option<HardwareError>,
}

impl RecordingBoard {
    fn record(&mut self, call: Call) -> Result<(), HardwareError> {
        if let Some(error) = self.fail_with {
            return Err(error);
        }
        self.calls.push(call);
        Ok(())
    }

    /// Calls made by commands, without link events.
    pub fn hardware_calls(&self) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|call| !matches!(call, Call::Link(..)))
            .cloned()
            .collect()
    }

    pub fn link_events(&self) -> Vec<(TransportKind, LinkEvent)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Link(kind, event) => Some((*kind, *event)),
                _ => None,
            })
            .collect()
    }
}

impl Board for RecordingBoard {
    fn set_led(&mut self, action: LedAction) -> Result<(), HardwareError> {
        self.record(Call::Led(action))
    }

    fn set_rgb(&mut self, duty: RgbDuty) -> Result<(), HardwareError> {
        self.record(Call::Rgb(duty))
    }

    fn write_pixels(&mut self, pixels: &[PixelWrite]) -> Result<(), HardwareError> {
        self.record(Call::Pixels(pixels.to_vec()))
    }

    fn clear_pixels(&mut self) -> Result<(), HardwareError> {
        self.record(Call::ClearPixels)
    }

    fn play_tone(&mut self, frequency_hz: u32, duration_ms: u32, volume: u16) -> Result<(), HardwareError> {
        self.record(Call::Tone(frequency_hz, duration_ms, volume))
    }

    fn show_text(&mut self, lines: &[DisplayLine]) -> Result<(), HardwareError> {
        self.record(Call::Text(lines.iter().map(|l| l.as_str().to_string()).collect()))
    }

    fn clear_display(&mut self) -> Result<(), HardwareError> {
        self.record(Call::ClearDisplay)
    }

    fn start_game(&mut self) -> Result<(), HardwareError> {
        self.record(Call::StartGame)
    }

    fn stop_game(&mut self) -> Result<(), HardwareError> {
        self.record(Call::StopGame)
    }

    fn link_event(&mut self, kind: TransportKind, event: LinkEvent) {
        self.calls.push(Call::Link(kind, event));
    }
}

pub fn session() -> Session<RecordingBoard> {
    init_logging();
    Session::new(ChannelConfig::default(), RecordingBoard::default())
}

pub fn session_with(config: ChannelConfig) -> Session<RecordingBoard> {
    init_logging();
    Session::new(config, RecordingBoard::default())
}

// -------------------------
// Advertiser
// -------------------------

#[derive(Debug, Default)]
pub struct MockAdvertiser {
    pub adverts: Vec<(String, u32)>,
    pub fail: bool,
}

impl Advertiser for MockAdvertiser {
    type Error = &'static str;

    fn advertise(&mut self, name: &str, interval_us: u32) -> Result<(), Self::Error> {
        if self.fail {
            return Err("radio off");
        }
        self.adverts.push((name.to_string(), interval_us));
        Ok(())
    }
}

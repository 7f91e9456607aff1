use boardlink::channel::command::{Command, DisplayLine, LedAction, PixelWrite, RgbDuty};
use boardlink::channel::evaluator::HardwareError;
use boardlink::channel::response::ReplyStyle;
use boardlink::channel::{Board, Peer, Session, TransportKind};
use boardlink::config::ChannelConfig;
use boardlink::network::Write;
use criterion::{Criterion, Throughput};
use std::hint::black_box;

const COMMANDS: &[&str] = &[
    "led.toggle()",
    "rgb(65535, 0, 1024)",
    "set_pixel(12, 0, 255, 0)",
    "neopixel(\"0:255,0,0;12:0,255,0;24:0,0,255\")",
    "update_oled([\"Conexao\", \"Recebida!\"])",
    "play_tone(440, 0.1, 500)",
    "bogus_call()",
];

/// Accepts everything and does nothing.
struct NullBoard;

impl Board for NullBoard {
    fn set_led(&mut self, _: LedAction) -> Result<(), HardwareError> {
        Ok(())
    }
    fn set_rgb(&mut self, _: RgbDuty) -> Result<(), HardwareError> {
        Ok(())
    }
    fn write_pixels(&mut self, _: &[PixelWrite]) -> Result<(), HardwareError> {
        Ok(())
    }
    fn clear_pixels(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
    fn play_tone(&mut self, _: u32, _: u32, _: u16) -> Result<(), HardwareError> {
        Ok(())
    }
    fn show_text(&mut self, _: &[DisplayLine]) -> Result<(), HardwareError> {
        Ok(())
    }
    fn clear_display(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
    fn start_game(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
    fn stop_game(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// Counts reply bytes.
struct Sink(usize);

impl Write for Sink {
    type Error = ();
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0 += buf.len();
        Ok(buf.len())
    }
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub fn bench_parse_commands(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Elements(COMMANDS.len() as u64));
    group.bench_function("vocabulary", |b| {
        b.iter(|| {
            COMMANDS
                .iter()
                .filter(|text| Command::parse(black_box(text)).is_ok())
                .count()
        })
    });
    group.finish();
}

pub fn bench_feed_line(c: &mut Criterion) {
    let script: String = COMMANDS.iter().map(|c| format!("{}\r\n", c)).collect();

    let mut group = c.benchmark_group("feed_line");
    group.throughput(Throughput::Bytes(script.len() as u64));
    group.bench_function("tcp_script", |b| {
        let mut session = Session::new(ChannelConfig::default(), NullBoard);
        let id = session
            .open(TransportKind::Tcp, Peer::Socket(([127, 0, 0, 1], 9000).into()))
            .expect("Failed to open connection");
        let mut sink = Sink(0);
        b.iter(|| {
            session
                .feed_line(id, black_box(script.as_bytes()), &mut sink, ReplyStyle::Socket)
                .expect("Failed to feed")
        })
    });
    group.finish();
}

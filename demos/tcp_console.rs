//! Host-side console: serves the command channel over TCP against a board
//! that only logs what it is asked to do.
//!
//! ```text
//! cargo run --example tcp_console
//! printf 'led.on()\nrgb(65535, 0, 0)\n' | nc 127.0.0.1 8080
//! ```
//!
//! Set `BOARDLINK_CONFIG` (in the environment or a `.env` file) to the path of
//! a JSON config document to override the defaults.

use std::error::Error;

use boardlink::channel::TransportKind;
use boardlink::channel::command::{DisplayLine, LedAction, PixelWrite, RgbDuty};
use boardlink::channel::evaluator::{HardwareError, LinkEvent};
use boardlink::transport::tcp::TcpServer;
use boardlink::{Board, ChannelConfig, Session};
use log::info;

/// Logs every hardware call instead of driving pins.
#[derive(Debug, Default)]
struct ConsoleBoard {
    led: bool,
    game_running: bool,
}

impl Board for ConsoleBoard {
    fn set_led(&mut self, action: LedAction) -> Result<(), HardwareError> {
        self.led = match action {
            LedAction::On => true,
            LedAction::Off => false,
            LedAction::Toggle => !self.led,
        };
        info!("led {}", if self.led { "on" } else { "off" });
        Ok(())
    }

    fn set_rgb(&mut self, duty: RgbDuty) -> Result<(), HardwareError> {
        info!("rgb r={} g={} b={}", duty.red, duty.green, duty.blue);
        Ok(())
    }

    fn write_pixels(&mut self, pixels: &[PixelWrite]) -> Result<(), HardwareError> {
        for pixel in pixels {
            let c = pixel.color;
            info!("pixel {} <- ({}, {}, {})", pixel.index, c.r, c.g, c.b);
        }
        Ok(())
    }

    fn clear_pixels(&mut self) -> Result<(), HardwareError> {
        info!("matrix cleared");
        Ok(())
    }

    fn play_tone(&mut self, frequency_hz: u32, duration_ms: u32, volume: u16) -> Result<(), HardwareError> {
        info!("tone {} Hz for {} ms at {}", frequency_hz, duration_ms, volume);
        Ok(())
    }

    fn show_text(&mut self, lines: &[DisplayLine]) -> Result<(), HardwareError> {
        for (row, line) in lines.iter().enumerate() {
            info!("oled[{}] {}", row, line);
        }
        Ok(())
    }

    fn clear_display(&mut self) -> Result<(), HardwareError> {
        info!("oled cleared");
        Ok(())
    }

    fn start_game(&mut self) -> Result<(), HardwareError> {
        if self.game_running {
            return Err(HardwareError::Busy);
        }
        self.game_running = true;
        info!("snake started");
        Ok(())
    }

    fn stop_game(&mut self) -> Result<(), HardwareError> {
        self.game_running = false;
        info!("snake stopped");
        Ok(())
    }

    fn link_event(&mut self, kind: TransportKind, event: LinkEvent) {
        info!("{:?} link {:?}", kind, event);
    }
}

fn load_config() -> Result<ChannelConfig, Box<dyn Error>> {
    dotenvy::dotenv().ok();
    match std::env::var("BOARDLINK_CONFIG") {
        Ok(path) => {
            let json = std::fs::read_to_string(&path)?;
            info!("config loaded from {}", path);
            Ok(ChannelConfig::from_json(&json)?)
        }
        Err(_) => Ok(ChannelConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let server = TcpServer::bind(&config)?;
    let mut session = Session::new(config, ConsoleBoard::default());
    server.run(&mut session)
}

//! Channel configuration.
//!
//! Every field has a default matching the BitDogLab firmware, so an empty
//! JSON object (`{}`) is a complete configuration.
//!
//! ```rust
//! use boardlink::channel::QueuePolicy;
//! use boardlink::config::ChannelConfig;
//!
//! let config = ChannelConfig::from_json(r#"{"tcp_port": 9000, "queue_policy": "fifo"}"#).unwrap();
//! assert_eq!(config.tcp_port, 9000);
//! assert_eq!(config.queue_policy, QueuePolicy::Fifo);
//! assert_eq!(config.sentinel.as_str(), "_EOT_");
//! ```

use core::fmt;
use core::time::Duration;

use heapless::String;
use serde::Deserialize;

use crate::channel::frame::DEFAULT_SENTINEL;
use crate::channel::queue::{QueuePolicy, UrgentList, default_urgent_commands};

/// Longest advertised BLE device name.
pub const MAX_DEVICE_NAME_LEN: usize = 32;

/// Longest end-of-command sentinel.
pub const MAX_SENTINEL_LEN: usize = 16;

/// Name advertised when none is configured.
pub const DEFAULT_DEVICE_NAME: &str = "BitDogLab Pico2W";

/// Slowest allowed queue poll, in milliseconds.
pub const MAX_POLL_INTERVAL_MS: u32 = 100;

/// Runtime settings for the transports and the queue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Name in the BLE advertising payload.
    pub device_name: String<MAX_DEVICE_NAME_LEN>,
    /// TCP listening port.
    pub tcp_port: u16,
    /// A TCP client silent for this long is disconnected.
    pub tcp_idle_timeout_secs: u32,
    /// How often the main loop polls the command queue (1..=100 ms).
    pub poll_interval_ms: u32,
    /// BLE advertising interval in microseconds.
    pub advertise_interval_us: u32,
    /// BLE end-of-command chunk.
    pub sentinel: String<MAX_SENTINEL_LEN>,
    /// BLE queue behaviour.
    pub queue_policy: QueuePolicy,
    /// Clip failure messages in replies to this many characters.
    pub reply_message_limit: Option<u16>,
    /// Commands that skip the BLE queue and run inline.
    pub urgent_commands: UrgentList,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            device_name: clipped(DEFAULT_DEVICE_NAME),
            tcp_port: 8080,
            tcp_idle_timeout_secs: 30,
            poll_interval_ms: MAX_POLL_INTERVAL_MS,
            advertise_interval_us: 100_000,
            sentinel: clipped(DEFAULT_SENTINEL),
            queue_policy: QueuePolicy::default(),
            reply_message_limit: None,
            urgent_commands: default_urgent_commands(),
        }
    }
}

fn clipped<const N: usize>(text: &str) -> String<N> {
    let mut out = String::new();
    for ch in text.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

impl ChannelConfig {
    /// Parse a JSON document and validate it. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let (config, _) = serde_json_core::from_str::<Self>(json).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_empty() {
            return Err(ConfigError::EmptyDeviceName);
        }
        if self.tcp_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.tcp_idle_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if !(1..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::InvalidPollInterval(self.poll_interval_ms));
        }
        if self.sentinel.is_empty() {
            return Err(ConfigError::EmptySentinel);
        }
        if self.urgent_commands.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::EmptyUrgentCommand);
        }
        Ok(())
    }

    /// [`tcp_idle_timeout_secs`](Self::tcp_idle_timeout_secs) as a `Duration`.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.tcp_idle_timeout_secs))
    }

    /// [`poll_interval_ms`](Self::poll_interval_ms) as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.poll_interval_ms))
    }
}

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The document is not valid JSON for [`ChannelConfig`].
    Parse(serde_json_core::de::Error),
    /// Empty `device_name`.
    EmptyDeviceName,
    /// Port 0.
    InvalidPort,
    /// Idle timeout of 0 seconds.
    InvalidTimeout,
    /// Poll interval outside 1..=100 ms.
    InvalidPollInterval(u32),
    /// Empty `sentinel`.
    EmptySentinel,
    /// A blank `urgent_commands` entry.
    EmptyUrgentCommand,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(error) => write!(f, "invalid config: {}", error),
            ConfigError::EmptyDeviceName => write!(f, "device_name must not be empty"),
            ConfigError::InvalidPort => write!(f, "tcp_port must not be 0"),
            ConfigError::InvalidTimeout => write!(f, "tcp_idle_timeout_secs must not be 0"),
            ConfigError::InvalidPollInterval(ms) => write!(
                f,
                "poll_interval_ms must be 1..={} (got {})",
                MAX_POLL_INTERVAL_MS, ms
            ),
            ConfigError::EmptySentinel => write!(f, "sentinel must not be empty"),
            ConfigError::EmptyUrgentCommand => write!(f, "urgent_commands entries must not be empty"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            ConfigError::Parse(_) => defmt::write!(f, "Parse"),
            ConfigError::EmptyDeviceName => defmt::write!(f, "EmptyDeviceName"),
            ConfigError::InvalidPort => defmt::write!(f, "InvalidPort"),
            ConfigError::InvalidTimeout => defmt::write!(f, "InvalidTimeout"),
            ConfigError::InvalidPollInterval(ms) => defmt::write!(f, "InvalidPollInterval({})", ms),
            ConfigError::EmptySentinel => defmt::write!(f, "EmptySentinel"),
            ConfigError::EmptyUrgentCommand => defmt::write!(f, "EmptyUrgentCommand"),
        }
    }
}

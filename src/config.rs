//! Configuration for a telemetry session.
//!
//! Loaded from YAML; every key has a default matching the stock firmware and
//! wiring, so an empty document is a valid configuration.
//!
//! ```yaml
//! transport:
//!   kind: serial
//!   port: /dev/ttyUSB1
//!   baud_rate: 460800
//! variant: tone_indexed
//! backlog: retain
//! driver:
//!   channel_capacity: 16
//!   max_consecutive_errors: 10
//! ```
//!
//! A recorded log instead of a device:
//!
//! ```yaml
//! transport:
//!   kind: file
//!   path: log.bin
//!   follow: true
//!   rewind_bytes: 32
//! variant: basic
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::cursor::{ByteCursor, FileCursor, SerialCursor};
use crate::protocol::{
    DEFAULT_BAUD_RATE, DEFAULT_SAMPLE_COUNT, DEFAULT_SAMPLING_RATE_HZ, ProtocolVariant,
};
use crate::sync::BacklogPolicy;
use crate::{Result, TelemetryError};

/// Where bytes come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Live device on a serial port
    Serial {
        #[serde(default = "default_port")]
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        /// How often a blocked read checks for close
        #[serde(default = "default_serial_poll_ms")]
        poll_interval_ms: u64,
        /// Give up on a silent device after this long; absent blocks forever
        #[serde(default)]
        read_timeout_ms: Option<u64>,
    },
    /// Recorded binary log
    File {
        path: PathBuf,
        /// Wait for the file to grow instead of closing at its end
        #[serde(default)]
        follow: bool,
        #[serde(default = "default_file_poll_ms")]
        poll_interval_ms: u64,
        #[serde(default)]
        read_timeout_ms: Option<u64>,
        /// Bytes kept before end of file when a followed log's backlog is
        /// dropped. Ignored unless `follow` is set.
        #[serde(default)]
        rewind_bytes: u64,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Serial {
            port: default_port(),
            baud_rate: default_baud_rate(),
            poll_interval_ms: default_serial_poll_ms(),
            read_timeout_ms: None,
        }
    }
}

impl TransportConfig {
    /// Open the configured transport.
    pub fn open(&self) -> Result<Box<dyn ByteCursor + Send>> {
        match self {
            TransportConfig::Serial { port, baud_rate, poll_interval_ms, read_timeout_ms } => {
                let cursor = SerialCursor::open_with(
                    port,
                    *baud_rate,
                    Duration::from_millis(*poll_interval_ms),
                )?
                .read_timeout(read_timeout_ms.map(Duration::from_millis));
                Ok(Box::new(cursor))
            }
            TransportConfig::File {
                path,
                follow,
                poll_interval_ms,
                read_timeout_ms,
                rewind_bytes,
            } => {
                let cursor = FileCursor::open(path)?
                    .follow(*follow)
                    .poll_interval(Duration::from_millis(*poll_interval_ms))
                    .read_timeout(read_timeout_ms.map(Duration::from_millis))
                    .rewind(*rewind_bytes);
                Ok(Box::new(cursor))
            }
        }
    }
}

/// Reader thread and queue settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Frames buffered between the reader thread and the consumer
    pub channel_capacity: usize,
    /// Consecutive transient errors tolerated before the reader gives up
    pub max_consecutive_errors: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { channel_capacity: 16, max_consecutive_errors: 10 }
    }
}

/// Nominal device settings, used before any frame has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub sample_count: u16,
    pub sampling_rate_hz: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self { sample_count: DEFAULT_SAMPLE_COUNT, sampling_rate_hz: DEFAULT_SAMPLING_RATE_HZ }
    }
}

impl DeviceConfig {
    /// Expected frames per second (`fs / N`).
    pub fn frame_rate_hz(&self) -> f64 {
        if self.sample_count == 0 {
            return 0.0;
        }
        f64::from(self.sampling_rate_hz) / f64::from(self.sample_count)
    }
}

/// Complete session configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transport: TransportConfig,
    pub variant: ProtocolVariant,
    pub backlog: BacklogPolicy,
    pub device: DeviceConfig,
    pub driver: DriverConfig,
}

impl Config {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(yaml)
            .map_err(|e| TelemetryError::config_error("YAML parsing", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    /// Render as YAML.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml_ng::to_string(self)
            .map_err(|e| TelemetryError::config_error("YAML rendering", e.to_string()))
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.driver.channel_capacity == 0 {
            return Err(TelemetryError::config_error(
                "driver.channel_capacity",
                "must be at least 1",
            ));
        }
        match &self.transport {
            TransportConfig::Serial { baud_rate: 0, .. } => {
                Err(TelemetryError::config_error("transport.baud_rate", "must be non-zero"))
            }
            TransportConfig::Serial { poll_interval_ms: 0, .. }
            | TransportConfig::File { poll_interval_ms: 0, .. } => Err(
                TelemetryError::config_error("transport.poll_interval_ms", "must be non-zero"),
            ),
            _ => Ok(()),
        }
    }
}

fn default_port() -> String {
    "/dev/ttyUSB1".to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_serial_poll_ms() -> u64 {
    100
}

fn default_file_poll_ms() -> u64 {
    50
}

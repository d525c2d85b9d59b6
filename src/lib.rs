//! Frame synchronization for serial tone-detection telemetry.
//!
//! A microcontroller samples audio, runs an FFT per block and streams one
//! small binary frame per block over a USB serial link: the strongest bin,
//! its power, and the closest musical tone. The link has no flow control and
//! the host may attach mid-stream, so frames are recovered from a raw byte
//! stream by sentinel scanning.
//!
//! # Layers
//!
//! - [`cursor`]: blocking one-byte sources (serial port, log file, any `Read`)
//! - [`protocol`]: wire layout, variants and calibration
//! - [`FrameSynchronizer`]: header scan, field decode, tail check, resync
//! - [`TelemetryConnection`]: reader thread plus async frame delivery
//! - [`sinks`] and [`tone`]: downstream consumers
//!
//! # Quick Start
//!
//! ## Synchronous iteration
//!
//! ```rust
//! use std::io::Cursor;
//! use tonelink::{Frame, FrameSynchronizer, ProtocolVariant, ReaderCursor};
//!
//! let variant = ProtocolVariant::ToneIndexed;
//! let mut bytes = b"line noise".to_vec();
//! bytes.extend(Frame::new(1, 128, 8000, 5, -512, 440.0, Some(3)).to_bytes(variant));
//!
//! let sync = FrameSynchronizer::new(ReaderCursor::new(Cursor::new(bytes)), variant);
//! let frames: Vec<Frame> = sync.filter_map(Result::ok).collect();
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].tone_index, Some(3));
//! ```
//!
//! ## Async subscription
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use tonelink::{Tonelink, UpdateRate};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> tonelink::Result<()> {
//!     let mut connection = Tonelink::connect("/dev/ttyUSB1")?;
//!     let mut frames = connection.subscribe(UpdateRate::Max(10))?;
//!
//!     while let Some(frame) = frames.next().await {
//!         println!("{} Hz at {:.4}", frame.matched_tone, frame.max_value);
//!     }
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

pub mod config;
pub mod cursor;
pub mod protocol;
pub mod sync;

// Async delivery
pub mod connection;
pub mod driver;
pub mod stream;

// Consumers
pub mod sinks;
pub mod tone;

pub use error::*;
pub use types::*;

pub use config::{Config, DeviceConfig, DriverConfig, TransportConfig};
pub use connection::TelemetryConnection;
pub use cursor::{ByteCursor, CloseHandle, FileCursor, ReaderCursor, SerialCursor};
pub use protocol::{FrameField, ProtocolVariant};
pub use sync::{BacklogPolicy, FrameSynchronizer};

use std::path::Path;

/// Entry point for telemetry connections.
///
/// ```rust,no_run
/// use tonelink::{ProtocolVariant, Tonelink};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> tonelink::Result<()> {
/// let mut live = Tonelink::connect("/dev/ttyUSB1")?;
/// let mut recorded = Tonelink::open("capture.bin", ProtocolVariant::Basic)?;
/// # let _ = (live.next_frame().await, recorded.next_frame().await);
/// # Ok(())
/// # }
/// ```
pub struct Tonelink;

impl Tonelink {
    /// Read a live device on `port` with the stock firmware settings.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if the port cannot be opened.
    pub fn connect(port: &str) -> Result<TelemetryConnection> {
        let config = Config {
            transport: TransportConfig::Serial {
                port: port.to_string(),
                baud_rate: protocol::DEFAULT_BAUD_RATE,
                poll_interval_ms: 100,
                read_timeout_ms: None,
            },
            ..Config::default()
        };
        TelemetryConnection::open(&config)
    }

    /// Replay a recorded binary log from start to end.
    ///
    /// # Errors
    ///
    /// Returns `File` if the log cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, variant: ProtocolVariant) -> Result<TelemetryConnection> {
        let config = Config {
            transport: TransportConfig::File {
                path: path.as_ref().to_path_buf(),
                follow: false,
                poll_interval_ms: 50,
                read_timeout_ms: None,
                rewind_bytes: 0,
            },
            variant,
            ..Config::default()
        };
        TelemetryConnection::open(&config)
    }

    /// Open whatever `config` describes.
    pub fn from_config(config: &Config) -> Result<TelemetryConnection> {
        TelemetryConnection::open(config)
    }
}

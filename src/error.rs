//! Error types for telemetry ingestion.
//!
//! Every byte-level failure surfaces through [`TelemetryError`], which is the
//! single failure surface of
//! [`FrameSynchronizer::next_frame`](crate::FrameSynchronizer::next_frame).
//!
//! ## Error Categories
//!
//! - **Transport lifetime**: the link ended ([`TelemetryError::SourceClosed`])
//! - **Transient starvation**: a read timeout elapsed or a frame was cut short
//!   ([`TelemetryError::Timeout`], [`TelemetryError::TruncatedFrame`])
//! - **Setup**: opening a port or file, loading configuration
//!
//! A tail mismatch is *not* an error. The synchronizer recovers on its own and
//! only reports it through tracing and [`SyncStats`](crate::SyncStats).
//!
//! ```rust
//! use tonelink::{FrameField, TelemetryError};
//!
//! let error =
//!     TelemetryError::TruncatedFrame { field: FrameField::MaxValue, received: 14, expected: 32 };
//! assert!(error.is_transient());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::FrameField;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Byte source closed: {reason}")]
    SourceClosed {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Frame truncated while reading {field}: got {received} of {expected} bytes")]
    TruncatedFrame { field: FrameField, received: usize, expected: usize },

    #[error("No data from source within {duration:?}")]
    Timeout { duration: Duration },

    #[error("Failed to open transport: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error")]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error in {context}: {details}")]
    Config { context: String, details: String },

    #[error("Frame receiver already taken by an earlier subscription")]
    AlreadySubscribed,
}

impl TelemetryError {
    /// Returns whether the next synchronization attempt may succeed.
    ///
    /// Transient errors leave the source open; the next call to `next_frame`
    /// starts a fresh header scan.
    pub fn is_transient(&self) -> bool {
        match self {
            TelemetryError::TruncatedFrame { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::SourceClosed { .. } => false,
            TelemetryError::Connection { .. } => false,
            TelemetryError::File { .. } => false,
            TelemetryError::Io { .. } => false,
            TelemetryError::Config { .. } => false,
            TelemetryError::AlreadySubscribed => false,
        }
    }

    /// Returns whether this error means the source is permanently done.
    pub fn is_closed(&self) -> bool {
        matches!(self, TelemetryError::SourceClosed { .. })
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::SourceClosed { .. } => vec![
                "Check the USB cable and that the device is powered",
                "Reopen the transport to start a new session",
            ],
            TelemetryError::TruncatedFrame { .. } => vec![
                "Call next_frame again; scanning restarts at the next header",
                "Raise the read timeout if the device reports slowly",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Verify the device firmware is streaming",
                "Remove the read timeout to block until data arrives",
            ],
            TelemetryError::Connection { .. } => vec![
                "Check the serial port path",
                "Check permissions on the device node (dialout group)",
                "Ensure no other program holds the port open",
            ],
            TelemetryError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            TelemetryError::Io { .. } => vec!["Retry the operation", "Check system resources"],
            TelemetryError::Config { .. } => vec![
                "Check the YAML syntax",
                "Compare field names against the documented configuration keys",
            ],
            TelemetryError::AlreadySubscribed => {
                vec!["Keep the first stream, or open a second connection"]
            }
        }
    }

    /// Helper constructor for a closed source.
    pub fn source_closed(reason: impl Into<String>) -> Self {
        TelemetryError::SourceClosed { reason: reason.into(), source: None }
    }

    /// Helper constructor for a closed source caused by an I/O failure.
    pub fn source_closed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::SourceClosed { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Config { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Io { source: err }
    }
}

//! Core value types.
//!
//! - [`Frame`] is the decoded, validated unit of telemetry
//! - [`SyncStats`] tracks synchronizer health
//! - [`UpdateRate`] controls how often subscribers see frames
//!
//! ```rust
//! use tonelink::types::Frame;
//! use tonelink::ProtocolVariant;
//!
//! let frame = Frame::new(1, 128, 8000, 5, -512, 440.0, Some(3));
//! let bytes = frame.to_bytes(ProtocolVariant::ToneIndexed);
//! assert_eq!(&bytes[..4], b"head");
//! assert_eq!(&bytes[bytes.len() - 4..], b"tail");
//! ```

mod frame;
mod stats;
mod update_rate;

pub use frame::Frame;
pub use stats::SyncStats;
pub use update_rate::{MIN_THROTTLE_INTERVAL, UpdateRate};

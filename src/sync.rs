//! Frame synchronization over an unaligned byte stream.
//!
//! [`FrameSynchronizer`] turns [`ByteCursor::read_byte`] calls into validated
//! [`Frame`]s. Each call to [`next_frame`](FrameSynchronizer::next_frame) runs
//! one synchronization attempt:
//!
//! ```text
//! ScanningHeader -> DecodingFields -> VerifyingTail -> FrameReady
//!       ^                                  |
//!       +------------- Resync -------------+
//! ```
//!
//! On a tail mismatch the four bytes read as the tail are pushed back into
//! the header window, so every byte after the point of corruption is still a
//! header candidate. Payload bytes of the rejected frame are not rescanned.
//!
//! ## Usage Example
//!
//! ```rust
//! use std::io::Cursor;
//! use tonelink::{Frame, FrameSynchronizer, ProtocolVariant, ReaderCursor};
//!
//! let mut bytes = b"garbage".to_vec();
//! let frame = Frame::new(1, 128, 8000, 5, -512, 440.0, Some(3));
//! bytes.extend(frame.to_bytes(ProtocolVariant::ToneIndexed));
//!
//! let cursor = ReaderCursor::new(Cursor::new(bytes));
//! let mut sync = FrameSynchronizer::new(cursor, ProtocolVariant::ToneIndexed);
//!
//! let frame = sync.next_frame().unwrap();
//! assert_eq!(frame.matched_tone, 440.0);
//! assert_eq!(sync.stats().bytes_discarded, 7);
//! ```

use serde::{Deserialize, Serialize};
use std::iter::FusedIterator;
use tracing::{debug, trace};

use crate::cursor::{ByteCursor, CloseHandle};
use crate::protocol::{
    HEADER, MAX_PAYLOAD_LEN, ProtocolVariant, SENTINEL_LEN, TAIL, decode_payload_buffer,
};
use crate::types::{Frame, SyncStats};
use crate::{Result, TelemetryError};

/// What to do with transport backlog before each synchronization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BacklogPolicy {
    /// Decode every byte in order. No frame is skipped on purpose.
    #[default]
    Retain,
    /// Discard buffered bytes before each frame so the next frame is the
    /// freshest available. Trades frame loss for latency.
    DropStale,
}

/// Rolling 4-byte window over the most recent bytes.
///
/// Stored as a big-endian register so a shift is one instruction and a
/// match is one comparison.
#[derive(Debug, Clone, Copy)]
struct SentinelWindow {
    bits: u32,
    filled: u8,
    shifted_out: u64,
}

impl SentinelWindow {
    const EMPTY: Self = Self { bits: 0, filled: 0, shifted_out: 0 };

    fn seeded(bytes: [u8; SENTINEL_LEN]) -> Self {
        Self { bits: u32::from_be_bytes(bytes), filled: SENTINEL_LEN as u8, shifted_out: 0 }
    }

    fn push(&mut self, byte: u8) {
        if usize::from(self.filled) == SENTINEL_LEN {
            self.shifted_out += 1;
        } else {
            self.filled += 1;
        }
        self.bits = (self.bits << 8) | u32::from(byte);
    }

    fn matches(&self, sentinel: [u8; SENTINEL_LEN]) -> bool {
        usize::from(self.filled) == SENTINEL_LEN && self.bits == u32::from_be_bytes(sentinel)
    }
}

/// Header-scan / field-decode / tail-verify state machine over a cursor.
pub struct FrameSynchronizer<C> {
    cursor: C,
    variant: ProtocolVariant,
    backlog: BacklogPolicy,
    stats: SyncStats,
    finished: bool,
}

impl<C: ByteCursor> FrameSynchronizer<C> {
    /// Synchronizer decoding `variant` frames with [`BacklogPolicy::Retain`].
    pub fn new(cursor: C, variant: ProtocolVariant) -> Self {
        Self {
            cursor,
            variant,
            backlog: BacklogPolicy::Retain,
            stats: SyncStats::default(),
            finished: false,
        }
    }

    /// Set the backlog policy.
    pub fn with_backlog(mut self, backlog: BacklogPolicy) -> Self {
        self.backlog = backlog;
        self
    }

    /// Protocol variant in use.
    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Counters since construction.
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Close handle of the underlying cursor.
    pub fn close_handle(&self) -> CloseHandle {
        self.cursor.close_handle()
    }

    /// Give back the cursor.
    pub fn into_inner(self) -> C {
        self.cursor
    }

    /// Block until the next structurally valid frame.
    ///
    /// Tail mismatches are recovered internally. Errors:
    /// - `SourceClosed` when the cursor ends, whether between frames or
    ///   inside one
    /// - `TruncatedFrame` when the cursor times out after the header
    /// - `Timeout` when the cursor times out while scanning for a header
    ///
    /// After `TruncatedFrame` or `Timeout` the next call starts a new scan.
    pub fn next_frame(&mut self) -> Result<Frame> {
        if self.backlog == BacklogPolicy::DropStale {
            self.cursor.discard_buffered()?;
        }

        let mut window = SentinelWindow::EMPTY;
        loop {
            self.scan_header(&mut window)?;

            let payload_len = self.variant.payload_len();
            let mut payload = [0u8; MAX_PAYLOAD_LEN];
            self.read_frame_bytes(&mut payload[..payload_len], SENTINEL_LEN)?;

            let mut tail = [0u8; SENTINEL_LEN];
            self.read_frame_bytes(&mut tail, SENTINEL_LEN + payload_len)?;

            if tail == TAIL {
                let frame = decode_payload_buffer(self.variant, &payload);
                self.stats.frames += 1;
                trace!(id = frame.id, tone = frame.matched_tone, "frame ready");
                return Ok(frame);
            }

            self.stats.desyncs += 1;
            debug!(
                tail = ?String::from_utf8_lossy(&tail),
                desyncs = self.stats.desyncs,
                "desync recovered: tail mismatch, rescanning from tail bytes"
            );
            window = SentinelWindow::seeded(tail);
        }
    }

    fn scan_header(&mut self, window: &mut SentinelWindow) -> Result<()> {
        let result = loop {
            if window.matches(HEADER) {
                break Ok(());
            }
            match self.cursor.read_byte() {
                Ok(byte) => window.push(byte),
                Err(e) => break Err(e),
            }
        };
        self.stats.bytes_discarded += window.shifted_out;
        *window = SentinelWindow::EMPTY;
        result
    }

    /// Fill `buf` with the frame bytes starting at `frame_offset`.
    fn read_frame_bytes(&mut self, buf: &mut [u8], frame_offset: usize) -> Result<()> {
        for (i, slot) in buf.iter_mut().enumerate() {
            match self.cursor.read_byte() {
                Ok(byte) => *slot = byte,
                Err(TelemetryError::Timeout { .. }) => {
                    let received = frame_offset + i;
                    self.stats.truncated += 1;
                    return Err(TelemetryError::TruncatedFrame {
                        field: self.variant.field_at(received),
                        received,
                        expected: self.variant.frame_len(),
                    });
                }
                Err(e) => {
                    if e.is_closed() {
                        self.stats.truncated += 1;
                        debug!(received = frame_offset + i, "source closed mid-frame");
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// Frames as an iterator.
///
/// Transient errors are yielded and iteration continues. `SourceClosed`
/// ends the iteration. Any other error is yielded once, then the iterator
/// is exhausted.
impl<C: ByteCursor> Iterator for FrameSynchronizer<C> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(e) if e.is_transient() => Some(Err(e)),
            Err(e) if e.is_closed() => {
                debug!("source closed: {e}");
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl<C: ByteCursor> FusedIterator for FrameSynchronizer<C> {}

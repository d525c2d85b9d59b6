//! Test utilities: scripted cursors, synthetic frames and temporary logs
//!
//! Shared by the unit tests and the benchmarks (`benchmark` feature).

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use crate::cursor::{ByteCursor, CloseHandle};
use crate::protocol::ProtocolVariant;
use crate::types::Frame;
use crate::{Result, TelemetryError};

/// One scripted cursor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Deliver a byte
    Byte(u8),
    /// Report a read timeout
    Starve,
    /// Report a non-recoverable I/O failure
    Fail,
    /// Backlog boundary: `discard_buffered` drops everything up to here
    Discard,
}

/// Cursor that replays a fixed script, then reports `SourceClosed`.
#[derive(Debug)]
pub struct ScriptedCursor {
    steps: VecDeque<Step>,
    close: CloseHandle,
    discards: usize,
}

impl ScriptedCursor {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self { steps: steps.into_iter().collect(), close: CloseHandle::new(), discards: 0 }
    }

    /// Script that delivers `bytes` and nothing else.
    pub fn from_bytes(bytes: impl IntoIterator<Item = u8>) -> Self {
        Self::new(bytes.into_iter().map(Step::Byte))
    }

    /// Number of `discard_buffered` calls so far.
    pub fn discards(&self) -> usize {
        self.discards
    }
}

impl ByteCursor for ScriptedCursor {
    fn read_byte(&mut self) -> Result<u8> {
        loop {
            if self.close.is_closed() {
                return Err(TelemetryError::source_closed("script closed"));
            }
            match self.steps.pop_front() {
                Some(Step::Byte(byte)) => return Ok(byte),
                Some(Step::Starve) => {
                    return Err(TelemetryError::Timeout { duration: Duration::ZERO });
                }
                Some(Step::Fail) => {
                    return Err(TelemetryError::from(std::io::Error::other("scripted failure")));
                }
                Some(Step::Discard) => continue,
                None => return Err(TelemetryError::source_closed("end of script")),
            }
        }
    }

    fn discard_buffered(&mut self) -> Result<()> {
        self.discards += 1;
        if let Some(marker) = self.steps.iter().position(|step| *step == Step::Discard) {
            self.steps.drain(..=marker);
        }
        Ok(())
    }

    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }
}

/// Deterministic noise that never contains the byte `h`, so it can never
/// form or complete a header.
pub fn garbage(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            match (state >> 24) as u8 {
                b'h' => b'g',
                byte => byte,
            }
        })
        .collect()
}

/// A plausible frame for `variant` with the given id.
pub fn sample_frame(id: u32, variant: ProtocolVariant) -> Frame {
    let tone_index = match variant {
        ProtocolVariant::Basic => None,
        ProtocolVariant::ToneIndexed => Some(id % 57),
    };
    Frame::new(id, 128, 8000, id % 65, (id as i32 % 4096) - 2048, 440.0, tone_index)
}

/// `count` frames separated by noise of up to `max_gap` bytes.
pub fn noisy_stream(count: u32, max_gap: usize, variant: ProtocolVariant) -> Vec<u8> {
    let mut bytes = Vec::new();
    for id in 0..count {
        let gap = if max_gap == 0 { 0 } else { id as usize % (max_gap + 1) };
        bytes.extend(garbage(gap, u64::from(id)));
        bytes.extend(sample_frame(id, variant).to_bytes(variant));
    }
    bytes
}

/// Temporary file removed on drop.
#[derive(Debug)]
pub struct TempLog {
    path: PathBuf,
}

impl TempLog {
    pub fn with_contents(label: &str, contents: &[u8]) -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir()
            .join(format!("tonelink-{}-{}-{}.bin", label, std::process::id(), n));
        std::fs::write(&path, contents).expect("write temp log");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempLog {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

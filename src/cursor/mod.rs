//! Byte sources for the synchronizer.
//!
//! A [`ByteCursor`] hands out one byte at a time from an ordered, possibly
//! endless source. It never seeks backwards. Reads block until a byte
//! arrives or the source is closed; a live device may stay silent for an
//! arbitrary time and that is normal operation.
//!
//! | Cursor | Source | End of data |
//! |---|---|---|
//! | [`SerialCursor`] | serial port | only on close or link failure |
//! | [`FileCursor`] | binary log | `SourceClosed`, or waits when following |
//! | [`ReaderCursor`] | any `Read` | `SourceClosed` |
//!
//! All cursors share a [`CloseHandle`]. Closing it from another thread makes
//! blocked and future reads fail with
//! [`TelemetryError::SourceClosed`](crate::TelemetryError::SourceClosed).

mod file;
mod reader;
mod serial;

pub use file::FileCursor;
pub use reader::ReaderCursor;
pub use serial::SerialCursor;

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Result;

/// Size of the internal read-ahead buffer shared by all cursors.
pub(crate) const READ_CHUNK: usize = 256;

/// A blocking, forward-only source of bytes.
pub trait ByteCursor {
    /// Read exactly one byte, blocking until one is available.
    ///
    /// Fails with `SourceClosed` once the source has terminated, and with
    /// `Timeout` only when the cursor was configured with a read timeout.
    fn read_byte(&mut self) -> Result<u8>;

    /// Drop whatever backlog has accumulated, so the next byte read is as
    /// fresh as the transport allows.
    ///
    /// Only meaningful for live or growing sources; the default does nothing.
    fn discard_buffered(&mut self) -> Result<()> {
        Ok(())
    }

    /// Handle that closes this cursor from another thread.
    fn close_handle(&self) -> CloseHandle;
}

impl<C: ByteCursor + ?Sized> ByteCursor for Box<C> {
    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn discard_buffered(&mut self) -> Result<()> {
        (**self).discard_buffered()
    }

    fn close_handle(&self) -> CloseHandle {
        (**self).close_handle()
    }
}

/// Shared close flag for a cursor.
#[derive(Debug, Clone, Default)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
}

impl CloseHandle {
    /// Create an open handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the cursor. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Whether [`close`](Self::close) has been called on any clone.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Read-ahead buffer so cursors issue one syscall per chunk, not per byte.
#[derive(Debug)]
pub(crate) struct ReadBuffer {
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
}

impl ReadBuffer {
    pub(crate) fn new() -> Self {
        Self { buf: vec![0u8; READ_CHUNK].into_boxed_slice(), pos: 0, len: 0 }
    }

    /// Next buffered byte, if any.
    pub(crate) fn pop(&mut self) -> Option<u8> {
        if self.pos < self.len {
            let byte = self.buf[self.pos];
            self.pos += 1;
            Some(byte)
        } else {
            None
        }
    }

    /// Refill from `reader`. Returns the number of bytes read; 0 means EOF.
    pub(crate) fn fill_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<usize> {
        let n = reader.read(&mut self.buf)?;
        self.pos = 0;
        self.len = n;
        Ok(n)
    }

    pub(crate) fn buffered(&self) -> usize {
        self.len - self.pos
    }

    pub(crate) fn clear(&mut self) {
        self.pos = 0;
        self.len = 0;
    }
}

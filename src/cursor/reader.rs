//! Cursor over any `std::io::Read`

use std::io::{ErrorKind, Read};
use std::time::Duration;
use tracing::trace;

use super::{ByteCursor, CloseHandle, ReadBuffer};
use crate::{Result, TelemetryError};

/// Cursor over an arbitrary reader: sockets, pipes, in-memory buffers.
///
/// End of stream is `SourceClosed`. A reader that reports `WouldBlock` or
/// `TimedOut` (a socket with a read timeout, say) surfaces as `Timeout`, and
/// the next read resumes where it left off.
///
/// A blocked `read` on the inner reader cannot be interrupted; the close
/// handle is checked before every byte.
pub struct ReaderCursor<R> {
    reader: R,
    buffer: ReadBuffer,
    close: CloseHandle,
    read_timeout: Duration,
}

impl<R: Read> ReaderCursor<R> {
    /// Wrap a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: ReadBuffer::new(),
            close: CloseHandle::new(),
            read_timeout: Duration::ZERO,
        }
    }

    /// Record the read timeout configured on the inner reader, so `Timeout`
    /// errors report it.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Unwrap the inner reader. Buffered bytes are lost.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> ByteCursor for ReaderCursor<R> {
    fn read_byte(&mut self) -> Result<u8> {
        loop {
            if self.close.is_closed() {
                return Err(TelemetryError::source_closed("reader closed"));
            }
            if let Some(byte) = self.buffer.pop() {
                return Ok(byte);
            }

            match self.buffer.fill_from(&mut self.reader) {
                Ok(0) => return Err(TelemetryError::source_closed("end of stream")),
                Ok(n) => trace!(bytes = n, "reader refill"),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(TelemetryError::Timeout { duration: self.read_timeout });
                }
                Err(e) => {
                    return Err(TelemetryError::source_closed_with_source(
                        "reader failed",
                        Box::new(e),
                    ));
                }
            }
        }
    }

    fn discard_buffered(&mut self) -> Result<()> {
        self.buffer.clear();
        Ok(())
    }

    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that fails once with the given kind, then serves `data`.
    struct FlakyReader {
        first: Option<ErrorKind>,
        data: Cursor<Vec<u8>>,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.first.take() {
                Some(kind) => Err(kind.into()),
                None => self.data.read(buf),
            }
        }
    }

    #[test]
    fn reads_then_reports_closed() {
        let mut cursor = ReaderCursor::new(Cursor::new(b"ab".to_vec()));
        assert_eq!(cursor.read_byte().ok(), Some(b'a'));
        assert_eq!(cursor.read_byte().ok(), Some(b'b'));
        assert!(cursor.read_byte().is_err_and(|e| e.is_closed()));
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let reader =
            FlakyReader { first: Some(ErrorKind::Interrupted), data: Cursor::new(vec![7]) };
        let mut cursor = ReaderCursor::new(reader);
        assert_eq!(cursor.read_byte().ok(), Some(7));
    }

    #[test]
    fn would_block_is_a_timeout_and_resumable() {
        let reader = FlakyReader { first: Some(ErrorKind::WouldBlock), data: Cursor::new(vec![9]) };
        let mut cursor = ReaderCursor::new(reader).with_read_timeout(Duration::from_millis(20));

        match cursor.read_byte() {
            Err(TelemetryError::Timeout { duration }) => {
                assert_eq!(duration, Duration::from_millis(20))
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(cursor.read_byte().ok(), Some(9));
    }

    #[test]
    fn closing_drops_buffered_bytes() {
        let mut cursor = ReaderCursor::new(Cursor::new(b"xyz".to_vec()));
        assert_eq!(cursor.read_byte().ok(), Some(b'x'));
        cursor.close_handle().close();
        assert!(cursor.read_byte().is_err_and(|e| e.is_closed()));
    }
}

//! Cursor over a binary log file, optionally following its growth

use std::fs::File;
use std::io::{ErrorKind, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use super::{ByteCursor, CloseHandle, ReadBuffer};
use crate::{Result, TelemetryError};

/// Cursor over a recorded byte log.
///
/// With `follow` off, the end of the file closes the source. With `follow`
/// on, the cursor behaves like `tail -f`: at end of file it sleeps for the
/// poll interval and tries again, until the file grows or the cursor is
/// closed.
pub struct FileCursor {
    file: File,
    path: PathBuf,
    buffer: ReadBuffer,
    close: CloseHandle,
    follow: bool,
    poll_interval: Duration,
    read_timeout: Option<Duration>,
    rewind: u64,
}

impl FileCursor {
    /// Open `path` for sequential reading from the start.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).map_err(|e| TelemetryError::file_error(path.clone(), e))?;
        info!("Opened byte log: {}", path.display());

        Ok(Self {
            file,
            path,
            buffer: ReadBuffer::new(),
            close: CloseHandle::new(),
            follow: false,
            poll_interval: Duration::from_millis(50),
            read_timeout: None,
            rewind: 0,
        })
    }

    /// Keep waiting at end of file instead of closing.
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// How long to sleep at end of file before checking for growth.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Fail with `Timeout` after waiting this long at end of file.
    /// Only applies when following.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Bytes kept before the end of file by
    /// [`discard_buffered`](ByteCursor::discard_buffered) when following.
    /// One frame length keeps the most recent complete frame in reach.
    pub fn rewind(mut self, bytes: u64) -> Self {
        self.rewind = bytes;
        self
    }

    /// Path of the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the next byte `read_byte` will return.
    fn logical_position(&mut self) -> Result<u64> {
        let file_position = self.file.stream_position().map_err(|e| self.file_error(e))?;
        Ok(file_position - self.buffer.buffered() as u64)
    }

    fn file_error(&self, source: std::io::Error) -> TelemetryError {
        TelemetryError::file_error(self.path.clone(), source)
    }
}

impl ByteCursor for FileCursor {
    fn read_byte(&mut self) -> Result<u8> {
        let mut waiting_since: Option<Instant> = None;

        loop {
            if self.close.is_closed() {
                return Err(TelemetryError::source_closed("file cursor closed"));
            }
            if let Some(byte) = self.buffer.pop() {
                return Ok(byte);
            }

            match self.buffer.fill_from(&mut self.file) {
                Ok(0) if !self.follow => {
                    return Err(TelemetryError::source_closed(format!(
                        "end of {}",
                        self.path.display()
                    )));
                }
                Ok(0) => {
                    let since = *waiting_since.get_or_insert_with(Instant::now);
                    if let Some(limit) = self.read_timeout {
                        if since.elapsed() >= limit {
                            return Err(TelemetryError::Timeout { duration: limit });
                        }
                    }
                    std::thread::sleep(self.poll_interval);
                }
                Ok(n) => trace!(bytes = n, "log refill"),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.file_error(e)),
            }
        }
    }

    /// Skip ahead to `rewind` bytes before the end of a followed log.
    ///
    /// A log that is not followed is a complete recording and has no
    /// backlog, so this does nothing. The cursor never moves backwards: if
    /// the read position is already inside the rewind window it stays put.
    fn discard_buffered(&mut self) -> Result<()> {
        if !self.follow {
            return Ok(());
        }

        let position = self.logical_position()?;
        let len = self.file.metadata().map_err(|e| self.file_error(e))?.len();
        let target = len.saturating_sub(self.rewind);
        if target <= position {
            return Ok(());
        }

        self.buffer.clear();
        self.file.seek(SeekFrom::Start(target)).map_err(|e| self.file_error(e))?;
        debug!(from = position, to = target, len, "skipped log backlog");
        Ok(())
    }

    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }
}

//! Cursor over a serial port

use serialport::{ClearBuffer, SerialPort};
use std::io::ErrorKind;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use super::{ByteCursor, CloseHandle, ReadBuffer};
use crate::protocol::DEFAULT_BAUD_RATE;
use crate::{Result, TelemetryError};

/// Cursor over the device's USB serial link.
///
/// The port is opened with a short driver-level timeout that exists only so
/// the cursor can notice its close handle. Unless a read timeout is set,
/// `read_byte` keeps waiting across those ticks for as long as the device
/// stays silent.
pub struct SerialCursor {
    port: Box<dyn SerialPort>,
    name: String,
    buffer: ReadBuffer,
    close: CloseHandle,
    poll_interval: Duration,
    read_timeout: Option<Duration>,
}

impl SerialCursor {
    /// Open `path` at the firmware's default 460 800 baud.
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with(path, DEFAULT_BAUD_RATE, Duration::from_millis(100))
    }

    /// Open `path` at `baud_rate`, checking for close every `poll_interval`.
    pub fn open_with(path: &str, baud_rate: u32, poll_interval: Duration) -> Result<Self> {
        let port = serialport::new(path, baud_rate).timeout(poll_interval).open().map_err(|e| {
            TelemetryError::connection_failed_with_source(
                format!("cannot open serial port {path}"),
                Box::new(e),
            )
        })?;
        info!(port = path, baud_rate, "Opened serial port");

        Ok(Self::from_port(port, path, poll_interval))
    }

    /// Wrap an already opened port.
    pub fn from_port(port: Box<dyn SerialPort>, name: &str, poll_interval: Duration) -> Self {
        Self {
            port,
            name: name.to_string(),
            buffer: ReadBuffer::new(),
            close: CloseHandle::new(),
            poll_interval,
            read_timeout: None,
        }
    }

    /// Fail with `Timeout` after this long without a byte. `None` (the
    /// default) blocks indefinitely.
    pub fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Port name as given at open time.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver-level poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl ByteCursor for SerialCursor {
    fn read_byte(&mut self) -> Result<u8> {
        let mut waiting_since: Option<Instant> = None;

        loop {
            if self.close.is_closed() {
                return Err(TelemetryError::source_closed(format!("{} closed", self.name)));
            }
            if let Some(byte) = self.buffer.pop() {
                return Ok(byte);
            }

            match self.buffer.fill_from(&mut self.port) {
                Ok(0) => {
                    return Err(TelemetryError::source_closed(format!(
                        "{} reported end of stream",
                        self.name
                    )));
                }
                Ok(n) => trace!(bytes = n, "serial refill"),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    let since = *waiting_since.get_or_insert_with(Instant::now);
                    if let Some(limit) = self.read_timeout {
                        if since.elapsed() >= limit {
                            return Err(TelemetryError::Timeout { duration: limit });
                        }
                    }
                }
                Err(e) => {
                    return Err(TelemetryError::source_closed_with_source(
                        format!("{} link failed", self.name),
                        Box::new(e),
                    ));
                }
            }
        }
    }

    fn discard_buffered(&mut self) -> Result<()> {
        let dropped = self.buffer.buffered();
        self.buffer.clear();
        self.port.clear(ClearBuffer::Input).map_err(|e| {
            TelemetryError::source_closed_with_source(
                format!("{} rejected input flush", self.name),
                Box::new(e),
            )
        })?;
        debug!(port = %self.name, dropped, "flushed serial input");
        Ok(())
    }

    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_port_is_a_connection_error() {
        let result = SerialCursor::open("/dev/tonelink-missing-port");
        match result {
            Err(TelemetryError::Connection { reason, .. }) => {
                assert!(reason.contains("/dev/tonelink-missing-port"))
            }
            Err(other) => panic!("expected connection error, got {other}"),
            Ok(_) => panic!("a missing port must not open"),
        }
    }

    #[cfg(unix)]
    mod pty {
        use super::*;
        use serialport::TTYPort;
        use std::io::Write;
        use std::thread;

        const POLL: Duration = Duration::from_millis(10);

        /// Cursor over the master side of a pseudo-terminal, plus the slave
        /// side the test writes device bytes into.
        fn pty_cursor() -> (SerialCursor, TTYPort) {
            let (mut master, slave) = TTYPort::pair().expect("pty pair");
            master.set_timeout(POLL).expect("poll timeout");
            (SerialCursor::from_port(Box::new(master), "pty", POLL), slave)
        }

        #[test]
        fn delivers_written_bytes_in_order() {
            let (mut cursor, mut device) = pty_cursor();
            device.write_all(b"ab").expect("write");
            device.flush().expect("flush");

            assert_eq!(cursor.read_byte().ok(), Some(b'a'));
            assert_eq!(cursor.read_byte().ok(), Some(b'b'));
            assert_eq!(cursor.name(), "pty");
        }

        #[test]
        fn close_unblocks_a_silent_port() {
            let (mut cursor, _device) = pty_cursor();
            let handle = cursor.close_handle();

            let closer = thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                handle.close();
            });

            let started = Instant::now();
            assert!(cursor.read_byte().is_err_and(|e| e.is_closed()));
            assert!(started.elapsed() < Duration::from_secs(2));
            closer.join().expect("closer thread");
        }

        #[test]
        fn silence_blocks_until_the_device_speaks() {
            let (mut cursor, mut device) = pty_cursor();

            let writer = thread::spawn(move || {
                thread::sleep(Duration::from_millis(5 * POLL.as_millis() as u64));
                device.write_all(b"z").expect("write");
                device
            });

            assert_eq!(cursor.read_byte().ok(), Some(b'z'));
            drop(writer.join().expect("writer thread"));
        }

        #[test]
        fn read_timeout_reports_timeout() {
            let (cursor, _device) = pty_cursor();
            let mut cursor = cursor.read_timeout(Some(Duration::from_millis(30)));

            match cursor.read_byte() {
                Err(TelemetryError::Timeout { duration }) => {
                    assert_eq!(duration, Duration::from_millis(30))
                }
                other => panic!("expected timeout, got {other:?}"),
            }
        }

        #[test]
        fn discard_drops_pending_input() {
            let (mut cursor, mut device) = pty_cursor();
            device.write_all(b"stale").expect("write");
            device.flush().expect("flush");
            thread::sleep(Duration::from_millis(20));

            assert_eq!(cursor.read_byte().ok(), Some(b's'));
            cursor.discard_buffered().expect("discard");

            device.write_all(b"!").expect("write");
            assert_eq!(cursor.read_byte().ok(), Some(b'!'));
        }
    }
}

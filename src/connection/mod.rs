//! Async facade over the reader thread

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::{ReceiverStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{Config, DriverConfig};
use crate::cursor::{ByteCursor, CloseHandle};
use crate::driver::Driver;
use crate::protocol::ProtocolVariant;
use crate::stream::ThrottleExt;
use crate::sync::{BacklogPolicy, FrameSynchronizer};
use crate::types::{Frame, SyncStats, UpdateRate};
use crate::{Result, TelemetryError};

#[cfg(test)]
mod tests;

/// Connection to a telemetry source.
///
/// Frames are read on a dedicated thread; this handle hands them out either
/// one at a time through [`next_frame`](Self::next_frame) or as a stream
/// through [`subscribe`](Self::subscribe). The two are exclusive: a
/// subscription takes the frame queue with it.
///
/// Dropping the connection cancels the reader and closes the transport.
pub struct TelemetryConnection {
    /// Frame queue, until a subscription takes it
    frames: Option<mpsc::Receiver<Frame>>,

    /// Synchronizer counters
    stats: watch::Receiver<SyncStats>,

    variant: ProtocolVariant,

    /// Nominal frame rate, used to normalize subscription rates
    source_hz: f64,

    cancel: CancellationToken,
    close: CloseHandle,
    reader: Option<JoinHandle<Result<()>>>,
}

impl TelemetryConnection {
    /// Open the transport described by `config` and start reading.
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let cursor = config.transport.open()?;
        Self::from_cursor(
            cursor,
            config.variant,
            config.backlog,
            config.driver,
            config.device.frame_rate_hz(),
        )
    }

    /// Start reading from an already opened cursor.
    pub fn from_cursor<C>(
        cursor: C,
        variant: ProtocolVariant,
        backlog: BacklogPolicy,
        driver: DriverConfig,
        source_hz: f64,
    ) -> Result<Self>
    where
        C: ByteCursor + Send + 'static,
    {
        let sync = FrameSynchronizer::new(cursor, variant).with_backlog(backlog);
        let channels = Driver::spawn(sync, driver)?;

        info!(%variant, ?backlog, source_hz, "Telemetry connection opened");

        Ok(Self {
            frames: Some(channels.frames),
            stats: channels.stats,
            variant,
            source_hz,
            cancel: channels.cancel,
            close: channels.close,
            reader: Some(channels.handle),
        })
    }

    /// Next frame in stream order.
    ///
    /// Returns `None` once the reader has stopped and every queued frame has
    /// been delivered, or when the queue was taken by [`subscribe`](Self::subscribe).
    pub async fn next_frame(&mut self) -> Option<Frame> {
        match self.frames.as_mut() {
            Some(frames) => frames.recv().await,
            None => None,
        }
    }

    /// Take the frame queue as a stream delivered at `rate`.
    ///
    /// `UpdateRate::Native` yields every frame. `UpdateRate::Max(hz)` below the
    /// source rate yields at most `hz` frames per second, newest first.
    pub fn subscribe(&mut self, rate: UpdateRate) -> Result<BoxStream<'static, Frame>> {
        let frames = self.frames.take().ok_or(TelemetryError::AlreadySubscribed)?;
        let frames = ReceiverStream::new(frames);

        match rate.throttle_interval(self.source_hz) {
            None => {
                debug!("Subscribed at native rate");
                Ok(frames.boxed())
            }
            Some(period) => {
                debug!(?period, "Subscribed with throttling");
                Ok(frames.throttle(period).boxed())
            }
        }
    }

    /// Current synchronizer counters.
    pub fn stats(&self) -> SyncStats {
        *self.stats.borrow()
    }

    /// Counter updates, starting with the current value.
    pub fn stats_updates(&self) -> impl Stream<Item = SyncStats> + 'static {
        WatchStream::new(self.stats.clone())
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.variant
    }

    /// Nominal source frame rate in Hz
    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    /// Whether the reader thread has stopped.
    pub fn is_finished(&self) -> bool {
        self.reader.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop reading. Frames already queued can still be received.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!("Closing telemetry connection");
        }
        self.cancel.cancel();
        self.close.close();
    }

    /// Stop reading and wait for the reader thread.
    ///
    /// Yields the reason the reader stopped: `Ok` when it was cancelled,
    /// `SourceClosed` when the source ran out first, or the error that
    /// ended it. Unread frames are discarded. A live subscription keeps the
    /// reader blocked on a full queue until the stream is dropped.
    pub async fn join(mut self) -> Result<()> {
        self.frames = None;
        self.close();

        let Some(reader) = self.reader.take() else {
            return Ok(());
        };
        let joined = tokio::task::spawn_blocking(move || reader.join())
            .await
            .map_err(|e| TelemetryError::from(std::io::Error::other(e)))?;

        joined.unwrap_or_else(|_| {
            Err(TelemetryError::from(std::io::Error::other("reader thread panicked")))
        })
    }
}

impl Drop for TelemetryConnection {
    fn drop(&mut self) {
        debug!("Dropping telemetry connection");
        self.cancel.cancel();
        self.close.close();
    }
}

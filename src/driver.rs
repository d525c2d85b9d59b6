//! Driver runs the synchronizer on a dedicated reader thread

use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::DriverConfig;
use crate::cursor::{ByteCursor, CloseHandle};
use crate::sync::FrameSynchronizer;
use crate::types::{Frame, SyncStats};
use crate::{Result, TelemetryError};

/// Result of spawning the reader thread
pub struct DriverChannels {
    /// Receiver for decoded frames, in stream order
    pub frames: mpsc::Receiver<Frame>,
    /// Latest synchronizer counters
    pub stats: watch::Receiver<SyncStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Closes the transport so a blocked read returns
    pub close: CloseHandle,
    /// Reader thread; yields the reason it stopped
    pub handle: JoinHandle<Result<()>>,
}

/// Driver owns the byte-level read loop.
///
/// The loop runs on its own OS thread because `read_byte` blocks for as long
/// as the device is silent. Frames go through a bounded channel, so a slow
/// consumer stalls the reader instead of growing memory; the transport's
/// own buffer absorbs the backlog until the consumer catches up.
pub struct Driver;

impl Driver {
    /// Spawn the reader thread for `sync`.
    pub fn spawn<C>(sync: FrameSynchronizer<C>, config: DriverConfig) -> Result<DriverChannels>
    where
        C: ByteCursor + Send + 'static,
    {
        let (frame_tx, frame_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (stats_tx, stats_rx) = watch::channel(SyncStats::default());
        let cancel = CancellationToken::new();
        let close = sync.close_handle();

        let cancel_reader = cancel.clone();
        let max_errors = config.max_consecutive_errors;
        let handle = thread::Builder::new()
            .name("tonelink-reader".to_string())
            .spawn(move || Self::reader_loop(sync, frame_tx, stats_tx, cancel_reader, max_errors))
            .map_err(TelemetryError::from)?;

        Ok(DriverChannels { frames: frame_rx, stats: stats_rx, cancel, close, handle })
    }

    fn reader_loop<C>(
        mut sync: FrameSynchronizer<C>,
        frame_tx: mpsc::Sender<Frame>,
        stats_tx: watch::Sender<SyncStats>,
        cancel: CancellationToken,
        max_errors: u32,
    ) -> Result<()>
    where
        C: ByteCursor,
    {
        info!(variant = %sync.variant(), "Reader thread started");
        let mut error_count = 0u32;

        let outcome = loop {
            if cancel.is_cancelled() {
                info!("Reader cancelled");
                break Ok(());
            }

            match sync.next_frame() {
                Ok(frame) => {
                    error_count = 0;
                    stats_tx.send_replace(sync.stats());
                    trace!(id = frame.id, "forwarding frame");

                    if frame_tx.blocking_send(frame).is_err() {
                        debug!("Frame receiver dropped, shutting down");
                        break Ok(());
                    }
                }
                Err(e) if e.is_closed() => {
                    if cancel.is_cancelled() {
                        info!("Transport closed on cancellation");
                        break Ok(());
                    }
                    info!("Source closed: {}", e);
                    break Err(e);
                }
                Err(e) if e.is_transient() => {
                    error_count += 1;
                    stats_tx.send_replace(sync.stats());
                    warn!("Transient read error ({}/{}): {}", error_count, max_errors, e);

                    if error_count >= max_errors {
                        error!("Too many consecutive read errors, shutting down");
                        break Err(e);
                    }
                }
                Err(e) => {
                    error!("Reader failed: {}", e);
                    break Err(e);
                }
            }
        };

        stats_tx.send_replace(sync.stats());
        let stats = sync.stats();
        info!(
            frames = stats.frames,
            desyncs = stats.desyncs,
            discarded = stats.bytes_discarded,
            "Reader thread ended"
        );
        outcome
    }
}

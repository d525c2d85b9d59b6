//! Record a telemetry source as a `matchedTone,maxValue` log.
//!
//! ```text
//! tonelink-log [CONFIG.yaml] [OUTPUT.csv]
//! ```
//!
//! Without a configuration file the stock serial settings are used. Log
//! verbosity follows `RUST_LOG` (default `info`).

use anyhow::{Context, bail};
use tonelink::sinks::CsvToneLog;
use tonelink::tone::ToneTracker;
use tonelink::{Config, TelemetryConnection};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_OUTPUT: &str = "tones.csv";
const FLUSH_EVERY: u64 = 64;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => Config::default(),
    };
    let output = args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_string());
    if args.next().is_some() {
        bail!("usage: tonelink-log [CONFIG.yaml] [OUTPUT.csv]");
    }

    let mut connection =
        TelemetryConnection::open(&config).context("opening telemetry source")?;
    let mut log = CsvToneLog::create(&output)?;
    let mut tones = ToneTracker::new();

    while let Some(frame) = connection.next_frame().await {
        log.write_frame(&frame)?;
        if log.lines() % FLUSH_EVERY == 0 {
            log.flush()?;
        }
        if let Some(change) = tones.observe(&frame) {
            debug!(previous = ?change.previous, current = change.current, "tone change");
        }
    }
    log.flush()?;

    let stats = connection.stats();
    info!(
        lines = log.lines(),
        desyncs = stats.desyncs,
        discarded = stats.bytes_discarded,
        "Recording finished"
    );

    match connection.join().await {
        Ok(()) => Ok(()),
        Err(e) if e.is_closed() => {
            info!("{e}");
            Ok(())
        }
        Err(e) => {
            for suggestion in e.recovery_suggestions() {
                warn!("  - {suggestion}");
            }
            Err(e).context("telemetry reader stopped")
        }
    }
}

//! `matchedTone,maxValue` text log

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::Frame;
use crate::{Result, TelemetryError};

/// Writes one `matchedTone,maxValue` line per frame.
///
/// Both values are printed the way Python's `repr(float)` prints them: the
/// shortest decimal that round-trips the `f64` value, switching to exponent
/// form below `1e-4` and from `1e16` up with a signed two-digit exponent
/// (`1e-05`, `1e+16`). Non-finite values print as `nan`, `inf` and `-inf`.
/// The tone is widened from `f32` before printing.
pub struct CsvToneLog<W: Write> {
    out: W,
    path: Option<PathBuf>,
    lines: u64,
}

impl CsvToneLog<BufWriter<File>> {
    /// Create (or truncate) a log file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::create(path).map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        info!("Writing tone log to {}", path.display());

        Ok(Self { out: BufWriter::new(file), path: Some(path.to_path_buf()), lines: 0 })
    }
}

impl<W: Write> CsvToneLog<W> {
    pub fn new(out: W) -> Self {
        Self { out, path: None, lines: 0 }
    }

    /// Append one line for `frame`.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let tone = repr_float(f64::from(frame.matched_tone));
        let value = repr_float(frame.max_value);
        writeln!(self.out, "{tone},{value}").map_err(|e| self.io_error(e))?;
        self.lines += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(|e| self.io_error(e))
    }

    /// Lines written so far
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Flush and hand back the writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.out)
    }

    fn io_error(&self, source: std::io::Error) -> TelemetryError {
        match &self.path {
            Some(path) => TelemetryError::file_error(path.clone(), source),
            None => TelemetryError::from(source),
        }
    }
}

/// Shortest round-trip text for `value` in the same notation as the host
/// tooling that consumes these logs.
fn repr_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    // Debug already picks exponent form at the same magnitudes
    let text = format!("{value:?}");
    let Some((mantissa, exponent)) = text.split_once('e') else {
        return text;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}e{sign}{digits:0>2}")
}

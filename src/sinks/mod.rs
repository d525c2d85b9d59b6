//! Downstream consumers that persist frames

mod csv;

pub use csv::CsvToneLog;

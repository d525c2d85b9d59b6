//! Synchronizer counters

use serde::{Deserialize, Serialize};

/// Running counters kept by a [`FrameSynchronizer`](crate::FrameSynchronizer).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Frames returned to the caller
    pub frames: u64,

    /// Tail mismatches that forced a rescan
    pub desyncs: u64,

    /// Bytes that scrolled through the header window without matching
    pub bytes_discarded: u64,

    /// Attempts aborted because the source starved mid-frame
    pub truncated: u64,
}

impl SyncStats {
    /// Fraction of header matches that turned out to be corrupt.
    pub fn desync_ratio(&self) -> f64 {
        let attempts = self.frames + self.desyncs;
        if attempts == 0 {
            return 0.0;
        }
        self.desyncs as f64 / attempts as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_of_empty_stats_is_zero() {
        assert_eq!(SyncStats::default().desync_ratio(), 0.0);
    }

    #[test]
    fn ratio_counts_only_completed_attempts() {
        let stats = SyncStats { frames: 3, desyncs: 1, bytes_discarded: 40, truncated: 2 };
        assert_eq!(stats.desync_ratio(), 0.25);
    }
}

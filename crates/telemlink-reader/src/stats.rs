use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared between a pipeline and its reader thread.
///
/// Counts accumulate over every session of the pipeline, reconnects
/// included.
#[derive(Debug, Default)]
pub struct SessionStats {
    bytes_read: AtomicU64,
    records_decoded: AtomicU64,
    dropped_malformed: AtomicU64,
    dropped_empty: AtomicU64,
    dropped_size_mismatch: AtomicU64,
    overflow_discarded: AtomicU64,
}

impl SessionStats {
    pub(crate) fn add_bytes_read(&self, n: usize) {
        self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_decoded(&self) {
        self.records_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn drop_malformed(&self) {
        self.dropped_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn drop_empty(&self) {
        self.dropped_empty.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn drop_size_mismatch(&self) {
        self.dropped_size_mismatch.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_overflow(&self, discarded: usize) {
        self.overflow_discarded
            .fetch_add(discarded as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            dropped_empty: self.dropped_empty.load(Ordering::Relaxed),
            dropped_size_mismatch: self.dropped_size_mismatch.load(Ordering::Relaxed),
            overflow_discarded: self.overflow_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub bytes_read: u64,
    pub records_decoded: u64,
    pub dropped_malformed: u64,
    pub dropped_empty: u64,
    pub dropped_size_mismatch: u64,
    /// Bytes thrown away because no delimiter arrived in time.
    pub overflow_discarded: u64,
}

impl StatsSnapshot {
    /// Candidates dropped for any reason.
    pub fn frames_dropped(&self) -> u64 {
        self.dropped_malformed + self.dropped_empty + self.dropped_size_mismatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = SessionStats::default();
        stats.add_bytes_read(10);
        stats.add_bytes_read(5);
        stats.record_decoded();
        stats.drop_malformed();
        stats.drop_empty();
        stats.drop_size_mismatch();
        stats.drop_size_mismatch();
        stats.add_overflow(70_000);

        let snap = stats.snapshot();
        assert_eq!(snap.bytes_read, 15);
        assert_eq!(snap.records_decoded, 1);
        assert_eq!(snap.frames_dropped(), 4);
        assert_eq!(snap.overflow_discarded, 70_000);
    }
}

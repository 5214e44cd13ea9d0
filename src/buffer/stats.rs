//! Offline buffer statistics
//!
//! Counters are bumped as the buffer works and read back as a
//! [`BufferStats`] snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::controller::ReplayReport;

/// Point-in-time statistics for an offline buffer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStats {
    /// Records successfully appended to the log
    pub records_appended: u64,
    /// Completed replays
    pub replays: u64,
    /// Records handed to the replay handler
    pub records_delivered: u64,
    /// Lines dropped during replay because they did not decode
    pub lines_dropped: u64,
    /// Times the log was discarded for being over the size limit
    pub evictions: u64,
}

impl BufferStats {
    /// Format size in human-readable format
    pub fn format_size(bytes: u64) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if bytes >= GB {
            format!("{:.2} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            format!("{:.2} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            format!("{:.2} KB", bytes as f64 / KB as f64)
        } else {
            format!("{} B", bytes)
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    records_appended: AtomicU64,
    replays: AtomicU64,
    records_delivered: AtomicU64,
    lines_dropped: AtomicU64,
    evictions: AtomicU64,
}

impl StatsCollector {
    pub(crate) fn record_appended(&self) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn replay_finished(&self, report: &ReplayReport) {
        self.replays.fetch_add(1, Ordering::Relaxed);
        self.records_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.lines_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
    }

    pub(crate) fn evicted(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> BufferStats {
        BufferStats {
            records_appended: self.records_appended.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
            records_delivered: self.records_delivered.load(Ordering::Relaxed),
            lines_dropped: self.lines_dropped.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

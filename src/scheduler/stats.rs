use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome tally of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub regions: usize,
    pub records: usize,
    pub empty: usize,
    pub capture_failures: usize,
    pub recognition_failures: usize,
    pub duration_ms: u64,
}

impl CycleReport {
    pub fn new(cycle: u64, regions: usize) -> Self {
        Self {
            cycle,
            regions,
            ..Self::default()
        }
    }

    pub fn settled(&self) -> usize {
        self.records + self.empty + self.capture_failures + self.recognition_failures
    }
}

/// Running counters for the scheduler
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub ticks_dropped: AtomicU64,
    pub ticks_skipped: AtomicU64,
    pub cycles_started: AtomicU64,
    pub cycles_completed: AtomicU64,
    pub records_appended: AtomicU64,
    pub capture_failures: AtomicU64,
    pub recognition_failures: AtomicU64,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn record_cycle(&self, report: &CycleReport) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.records_appended
            .fetch_add(report.records as u64, Ordering::Relaxed);
        self.capture_failures
            .fetch_add(report.capture_failures as u64, Ordering::Relaxed);
        self.recognition_failures
            .fetch_add(report.recognition_failures as u64, Ordering::Relaxed);
    }

    /// Get current statistics as a snapshot
    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            ticks_dropped: self.ticks_dropped.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            records_appended: self.records_appended.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
            recognition_failures: self.recognition_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scheduler statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatsSnapshot {
    pub ticks_dropped: u64,
    pub ticks_skipped: u64,
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub records_appended: u64,
    pub capture_failures: u64,
    pub recognition_failures: u64,
}

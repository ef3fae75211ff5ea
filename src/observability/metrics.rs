use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters for one pipeline stage (producer, display, writer), shared
/// between the stage's task and the monitor.
#[derive(Debug)]
pub struct StageMetrics {
    stage: String,
    items_processed: AtomicU64,
    errors_count: AtomicU64,
    flushes: AtomicU64,
    batches: AtomicU64,
    batch_time_us: AtomicU64,
}

impl StageMetrics {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            items_processed: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            batch_time_us: AtomicU64::new(0),
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Samples produced, points rendered or records written
    pub fn items_processed(&self) -> u64 {
        self.items_processed.load(Ordering::Relaxed)
    }

    pub fn errors_count(&self) -> u64 {
        self.errors_count.load(Ordering::Relaxed)
    }

    /// Explicit sink flushes; only the writer records these
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn record_items(&self, count: u64) {
        self.items_processed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_item(&self) {
        self.record_items(1);
    }

    pub fn record_error(&self) {
        self.errors_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn begin_batch(&self) -> Instant {
        Instant::now()
    }

    /// Close a batch opened by [`begin_batch`](Self::begin_batch)
    pub fn end_batch(&self, started: Instant) {
        let elapsed_us = started.elapsed().as_micros() as u64;
        self.batch_time_us.fetch_add(elapsed_us, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Mean wall time per batch, 0 before the first one
    pub fn avg_batch_us(&self) -> u64 {
        let batches = self.batches();
        if batches == 0 {
            return 0;
        }
        self.batch_time_us.load(Ordering::Relaxed) / batches
    }
}

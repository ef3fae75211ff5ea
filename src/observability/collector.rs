use std::collections::BTreeMap;
use std::sync::Arc;
use super::StageMetrics;

/// Point-in-time copy of one stage's counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub stage: String,
    pub items_processed: u64,
    pub errors_count: u64,
    pub flushes: u64,
    pub batches: u64,
    pub avg_batch_us: u64,
}

impl MetricsSnapshot {
    fn of(metrics: &StageMetrics) -> Self {
        Self {
            stage: metrics.stage().to_string(),
            items_processed: metrics.items_processed(),
            errors_count: metrics.errors_count(),
            flushes: metrics.flushes(),
            batches: metrics.batches(),
            avg_batch_us: metrics.avg_batch_us(),
        }
    }
}

/// Registry of per-stage metrics, ordered by stage name
#[derive(Clone, Default)]
pub struct MetricsCollector {
    metrics: BTreeMap<String, Arc<StageMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register metrics for `stage`, returning the shared handle
    pub fn register(&mut self, stage: impl Into<String>) -> Arc<StageMetrics> {
        let stage = stage.into();
        let metrics = Arc::new(StageMetrics::new(stage.clone()));
        self.metrics.insert(stage, metrics.clone());
        metrics
    }

    pub fn snapshot(&self) -> BTreeMap<String, MetricsSnapshot> {
        self.metrics
            .iter()
            .map(|(stage, metrics)| (stage.clone(), MetricsSnapshot::of(metrics)))
            .collect()
    }

    pub fn get(&self, stage: &str) -> Option<Arc<StageMetrics>> {
        self.metrics.get(stage).cloned()
    }
}

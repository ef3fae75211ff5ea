use super::MetricsCollector;
use crate::buffers::{ChannelStats, Sender};
use crate::core::Sample;

/// Text report over stage counters and channel loss.
///
/// Channels are watched through a sending handle so the report reflects
/// live `sent`/`evicted` counts; evictions are the only place samples are lost.
pub struct PipelineMonitor {
    collector: MetricsCollector,
    channels: Vec<(String, Sender<Sample>)>,
}

impl PipelineMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self {
            collector,
            channels: Vec::new(),
        }
    }

    pub fn watch_channel(mut self, name: impl Into<String>, sender: Sender<Sample>) -> Self {
        self.channels.push((name.into(), sender));
        self
    }

    pub fn channel_stats(&self) -> Vec<(String, ChannelStats)> {
        self.channels
            .iter()
            .map(|(name, sender)| (name.clone(), sender.stats()))
            .collect()
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.collector.snapshot();
        let channels = self.channel_stats();

        if snapshot.is_empty() && channels.is_empty() {
            return "No stages registered".to_string();
        }

        let mut report = String::from("=== ecgstream ===\n");

        if !snapshot.is_empty() {
            report.push_str(&format!(
                "\n{:<12}{:>10}{:>8}{:>9}{:>12}\n",
                "stage", "items", "errors", "flushes", "avg batch"
            ));
            for metrics in snapshot.values() {
                report.push_str(&format!(
                    "{:<12}{:>10}{:>8}{:>9}{:>10}us\n",
                    metrics.stage,
                    metrics.items_processed,
                    metrics.errors_count,
                    metrics.flushes,
                    metrics.avg_batch_us
                ));
            }
        }

        if !channels.is_empty() {
            report.push_str(&format!(
                "\n{:<12}{:>10}{:>8}{:>9}\n",
                "channel", "sent", "evicted", "loss"
            ));
            for (name, stats) in &channels {
                report.push_str(&format!(
                    "{:<12}{:>10}{:>8}{:>8.1}%\n",
                    name,
                    stats.sent,
                    stats.evicted,
                    stats.loss_ratio() * 100.0
                ));
            }
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}

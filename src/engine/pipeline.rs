use anyhow::{anyhow, Result};
use log::{error, info};
use serde_json::Value;

use crate::buffers::{bounded, ChannelStats, Sender};
use crate::core::{PipelineConfig, Sample};
use crate::engine::display::DisplayConsumer;
use crate::engine::producer::SignalProducer;
use crate::engine::state::{PipelineState, TaskState, WriterState};
use crate::engine::writer::PersistenceWriter;
use crate::observability::{MetricsCollector, PipelineMonitor};
use crate::sinks::{DurableSink, FileSink, Renderer};
use crate::visualization::DisplayWindow;

/// Totals gathered by an orderly shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineReport {
    pub samples_produced: u64,
    pub points_displayed: u64,
    pub records_written: u64,
    pub flushes: u64,
    pub display_channel: ChannelStats,
    pub persistence_channel: ChannelStats,
}

/// Producer feeding a display consumer and a persistence writer through two
/// independent drop-oldest channels.
pub struct SignalPipeline {
    config: PipelineConfig,
    producer: SignalProducer,
    display: DisplayConsumer,
    writer: PersistenceWriter,
    display_tx: Sender<Sample>,
    metrics_collector: MetricsCollector,
    state: PipelineState,
}

impl SignalPipeline {
    pub fn new(
        config: PipelineConfig,
        sink: impl DurableSink + 'static,
        renderer: impl Renderer + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let mut collector = MetricsCollector::new();

        let writer = PersistenceWriter::new(sink, config.channel_capacity, config.flush_every)?
            .with_metrics(collector.register("writer"));

        let (display_tx, display_rx) = bounded(config.channel_capacity)?;
        let display = DisplayConsumer::from_config(&config, display_rx, renderer)?
            .with_metrics(collector.register("display"));

        let producer = SignalProducer::from_config(&config, display_tx.clone(), writer.sender())?
            .with_metrics(collector.register("producer"));

        Ok(Self {
            config,
            producer,
            display,
            writer,
            display_tx,
            metrics_collector: collector,
            state: PipelineState::Idle,
        })
    }

    /// Pipeline persisting to a file at `config.output_path`
    pub fn from_config(config: PipelineConfig, renderer: impl Renderer + 'static) -> Result<Self> {
        let sink = FileSink::new(config.output_path.clone());
        Self::new(config, sink, renderer)
    }

    pub fn from_json(config: Value, renderer: impl Renderer + 'static) -> Result<Self> {
        Self::from_config(PipelineConfig::from_json(config)?, renderer)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Transition to a new state with validation
    pub fn transition_to(&mut self, new_state: PipelineState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(anyhow!(
                "Invalid state transition: {} -> {}",
                self.state.name(),
                new_state.name()
            ));
        }
        self.state = new_state;
        Ok(())
    }

    pub fn producer_state(&self) -> TaskState {
        self.producer.state()
    }

    pub fn display_state(&self) -> TaskState {
        self.display.state()
    }

    pub fn writer_state(&self) -> WriterState {
        self.writer.state()
    }

    /// Available once the display consumer has stopped
    pub fn display_window(&self) -> Option<&DisplayWindow> {
        self.display.window()
    }

    pub fn display_channel_stats(&self) -> ChannelStats {
        self.display_tx.stats()
    }

    pub fn persistence_channel_stats(&self) -> ChannelStats {
        self.writer.channel_stats()
    }

    /// Open the persistence sink, then start the producer and the display
    /// consumer. A sink failure aborts start-up before any sample is produced.
    pub async fn start(&mut self) -> Result<()> {
        if self.state == PipelineState::Running {
            return Ok(());
        }
        if !self.state.can_transition_to(&PipelineState::Running) {
            return Err(anyhow!("Cannot start pipeline in state {}", self.state.name()));
        }

        if let Err(e) = self.writer.start().await {
            error!("pipeline start aborted: {:#}", e);
            self.transition_to(PipelineState::Error {
                error_msg: format!("{:#}", e),
            })?;
            return Err(e);
        }

        self.producer.start()?;
        self.display.start()?;

        self.transition_to(PipelineState::Running)?;
        info!(
            "pipeline running: {} Hz, capacity {}, output {:?}",
            self.config.sampling_hz, self.config.channel_capacity, self.config.output_path
        );
        Ok(())
    }

    /// Ordered shutdown: stop the producer, close the persistence channel,
    /// wait for the writer to drain and close, then stop the display.
    ///
    /// Every step runs even when an earlier one fails. The first failure
    /// moves the pipeline to `Error` and is returned.
    pub async fn shutdown(&mut self) -> Result<PipelineReport> {
        self.transition_to(PipelineState::ShuttingDown)?;

        let produced = self.producer.stop().await;

        self.writer.stop();
        let written = self.writer.await_completion().await;

        let displayed = self.display.stop().await;

        let summary = match (produced, written, displayed) {
            (Ok(()), Ok(summary), Ok(())) => summary,
            (produced, written, displayed) => {
                if let Ok(summary) = &written {
                    info!(
                        "persistence completed despite shutdown failure: {} records",
                        summary.records_written
                    );
                }
                let e = [produced.err(), written.err(), displayed.err()]
                    .into_iter()
                    .flatten()
                    .next()
                    .unwrap_or_else(|| anyhow!("Pipeline shutdown failed"));

                error!("pipeline shutdown failed: {:#}", e);
                self.transition_to(PipelineState::Error {
                    error_msg: format!("{:#}", e),
                })?;
                return Err(e);
            }
        };

        self.transition_to(PipelineState::Completed)?;

        let report = PipelineReport {
            samples_produced: self.producer.samples_produced(),
            points_displayed: self.display.points_displayed(),
            records_written: summary.records_written,
            flushes: summary.flushes,
            display_channel: self.display_channel_stats(),
            persistence_channel: self.persistence_channel_stats(),
        };
        info!("pipeline completed: {:?}", report);
        Ok(report)
    }

    /// Stage counters plus live loss on both channels
    pub fn get_monitor(&self) -> PipelineMonitor {
        PipelineMonitor::new(self.metrics_collector.clone())
            .watch_channel("display", self.display_tx.clone())
            .watch_channel("persistence", self.writer.sender())
    }
}

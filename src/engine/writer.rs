use anyhow::{anyhow, bail, Context, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::buffers::{bounded, ChannelStats, Receiver, Sender};
use crate::core::{PipelineConfig, Record, Sample};
use crate::engine::state::WriterState;
use crate::observability::StageMetrics;
use crate::sinks::{DurableSink, FileSink};

/// Outcome of a completed writer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterSummary {
    /// Data records written after the header
    pub records_written: u64,
    /// Periodic flushes triggered by `flush_every`
    pub flushes: u64,
}

/// Drains the persistence channel into a durable sink as CSV records.
///
/// `stop()` only closes the channel; the drain loop keeps writing until every
/// value accepted before the close is on disk, then closes the sink.
pub struct PersistenceWriter {
    sender: Sender<Sample>,
    receiver: Option<Receiver<Sample>>,
    sink: Option<Box<dyn DurableSink>>,
    flush_every: u64,
    state: Arc<watch::Sender<WriterState>>,
    handle: Option<JoinHandle<Result<WriterSummary>>>,
    summary: Option<WriterSummary>,
    failure: Option<String>,
    metrics: Arc<StageMetrics>,
}

impl PersistenceWriter {
    pub fn new(
        sink: impl DurableSink + 'static,
        capacity: usize,
        flush_every: u64,
    ) -> Result<Self> {
        if flush_every == 0 {
            bail!("flush_every must be >= 1");
        }
        let (sender, receiver) = bounded(capacity)?;
        let (state, _) = watch::channel(WriterState::Idle);

        Ok(Self {
            sender,
            receiver: Some(receiver),
            sink: Some(Box::new(sink)),
            flush_every,
            state: Arc::new(state),
            handle: None,
            summary: None,
            failure: None,
            metrics: Arc::new(StageMetrics::new("writer")),
        })
    }

    /// Writer backed by a [`FileSink`] at `config.output_path`
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(
            FileSink::new(config.output_path.clone()),
            config.channel_capacity,
            config.flush_every,
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<StageMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> WriterState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WriterState> {
        self.state.subscribe()
    }

    /// Producer-side handle to the persistence channel
    pub fn sender(&self) -> Sender<Sample> {
        self.sender.clone()
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.sender.stats()
    }

    pub fn records_written(&self) -> u64 {
        self.metrics.items_processed()
    }

    /// Non-blocking, drop-oldest; silently ignored after `stop()`.
    pub fn enqueue(&self, value: Sample) {
        self.sender.send(value);
    }

    /// Open the sink, write the header and spawn the drain loop.
    ///
    /// If the destination cannot be created the error is returned and the
    /// writer stays Idle. Calling `start()` while running is a no-op.
    pub async fn start(&mut self) -> Result<()> {
        match self.state() {
            WriterState::Idle => {}
            WriterState::Running | WriterState::Draining => return Ok(()),
            WriterState::Closed => bail!("Persistence writer already closed"),
        }

        let mut sink = self
            .sink
            .take()
            .ok_or_else(|| anyhow!("Persistence sink missing"))?;

        if let Err(e) = open_with_header(sink.as_mut()).await {
            error!("persistence sink unavailable: {:#}", e);
            self.metrics.record_error();
            if let Err(close_err) = sink.close().await {
                warn!("closing unavailable persistence sink failed: {:#}", close_err);
            }
            self.sink = Some(sink);
            return Err(e);
        }

        let receiver = self
            .receiver
            .take()
            .ok_or_else(|| anyhow!("Persistence channel missing"))?;

        transition(&self.state, WriterState::Running)?;
        info!("persistence writer running, flush every {} records", self.flush_every);

        let state = self.state.clone();
        let metrics = self.metrics.clone();
        let flush_every = self.flush_every;

        self.handle = Some(tokio::spawn(async move {
            drain(receiver, sink, flush_every, state, metrics).await
        }));

        Ok(())
    }

    /// Close the channel. The drain loop finishes the backlog on its own.
    pub fn stop(&self) {
        self.sender.close();
        match transition(&self.state, WriterState::Draining) {
            Ok(()) => debug!("persistence channel closed, draining backlog"),
            Err(_) => debug!("persistence channel closed while {}", self.state().name()),
        }
    }

    /// Wait until the backlog is written and the sink closed.
    ///
    /// Returns immediately for a writer that was never started.
    pub async fn await_completion(&mut self) -> Result<WriterSummary> {
        if let Some(handle) = self.handle.take() {
            let outcome = handle
                .await
                .map_err(|e| anyhow!("Persistence task failed: {}", e))
                .and_then(|result| result);

            match outcome {
                Ok(summary) => self.summary = Some(summary),
                Err(e) => self.failure = Some(format!("{:#}", e)),
            }
        }

        if let Some(failure) = &self.failure {
            return Err(anyhow!("Persistence writer failed: {}", failure));
        }
        Ok(self.summary.unwrap_or_default())
    }
}

/// Checked state change, applied atomically against concurrent `stop()`
fn transition(state: &watch::Sender<WriterState>, new_state: WriterState) -> Result<()> {
    let mut from = new_state;
    let moved = state.send_if_modified(|current| {
        from = *current;
        if current.can_transition_to(&new_state) {
            *current = new_state;
            true
        } else {
            false
        }
    });

    if !moved {
        return Err(anyhow!(
            "Invalid writer transition: {} -> {}",
            from.name(),
            new_state.name()
        ));
    }
    Ok(())
}

async fn open_with_header(sink: &mut dyn DurableSink) -> Result<()> {
    sink.create_or_truncate()
        .await
        .context("Failed to create persistence destination")?;
    sink.append_line(Record::HEADER)
        .await
        .context("Failed to write header")?;
    sink.flush().await.context("Failed to flush header")?;
    Ok(())
}

async fn drain(
    mut receiver: Receiver<Sample>,
    mut sink: Box<dyn DurableSink>,
    flush_every: u64,
    state: Arc<watch::Sender<WriterState>>,
    metrics: Arc<StageMetrics>,
) -> Result<WriterSummary> {
    let mut summary = WriterSummary::default();
    let written = write_records(
        &mut receiver,
        sink.as_mut(),
        flush_every,
        &metrics,
        &mut summary,
    )
    .await;

    if written.is_err() {
        metrics.record_error();
        // Stop accepting values nobody will write
        receiver.close();
    }

    let closed = sink.close().await.context("Failed to close persistence sink");
    if let Err(e) = transition(&state, WriterState::Closed) {
        warn!("{:#}", e);
    }

    match (written, closed) {
        (Ok(()), Ok(())) => {
            info!(
                "persistence writer closed: {} records, {} flushes",
                summary.records_written, summary.flushes
            );
            Ok(summary)
        }
        (Err(e), _) | (Ok(()), Err(e)) => {
            warn!(
                "persistence writer closed after {} records with error: {:#}",
                summary.records_written, e
            );
            Err(e)
        }
    }
}

async fn write_records(
    receiver: &mut Receiver<Sample>,
    sink: &mut dyn DurableSink,
    flush_every: u64,
    metrics: &StageMetrics,
    summary: &mut WriterSummary,
) -> Result<()> {
    while let Some(value) = receiver.recv().await {
        let record = Record::new(summary.records_written, value);
        sink.append_line(&record.to_csv_line())
            .await
            .context(format!("Failed to write record {}", record.sequence_number))?;

        summary.records_written += 1;
        metrics.record_item();

        if summary.records_written % flush_every == 0 {
            sink.flush().await.context("Failed to flush records")?;
            summary.flushes += 1;
            metrics.record_flush();
        }
    }

    Ok(())
}

/// Dropping without `stop()` still lets the drain loop finish in the background.
impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        self.sender.close();
    }
}

use anyhow::{anyhow, bail, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::buffers::Sender;
use crate::core::config::sample_period;
use crate::core::{PipelineConfig, Sample};
use crate::engine::state::TaskState;
use crate::observability::StageMetrics;
use crate::signal::{SampleClock, SineWave, Waveform};

/// Generates one sample per period and pushes it to the display and
/// persistence channels. Never blocks on either consumer.
pub struct SignalProducer {
    sampling_hz: f32,
    period: Duration,
    waveform: Arc<dyn Waveform>,
    display_tx: Sender<Sample>,
    persistence_tx: Sender<Sample>,
    state: TaskState,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<u64>>,
    metrics: Arc<StageMetrics>,
}

impl SignalProducer {
    pub fn new(
        sampling_hz: f32,
        waveform: impl Waveform + 'static,
        display_tx: Sender<Sample>,
        persistence_tx: Sender<Sample>,
    ) -> Result<Self> {
        if !sampling_hz.is_finite() || sampling_hz <= 0.0 {
            bail!("sampling_hz must be a positive number, got {}", sampling_hz);
        }

        Ok(Self {
            sampling_hz,
            period: sample_period(sampling_hz),
            waveform: Arc::new(waveform),
            display_tx,
            persistence_tx,
            state: TaskState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            metrics: Arc::new(StageMetrics::new("producer")),
        })
    }

    pub fn from_config(
        config: &PipelineConfig,
        display_tx: Sender<Sample>,
        persistence_tx: Sender<Sample>,
    ) -> Result<Self> {
        Self::new(
            config.sampling_hz,
            SineWave::from_config(&config.waveform),
            display_tx,
            persistence_tx,
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<StageMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn transition_to(&mut self, new_state: TaskState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(anyhow!(
                "Invalid producer transition: {} -> {}",
                self.state.name(),
                new_state.name()
            ));
        }
        self.state = new_state;
        Ok(())
    }

    /// Sleep between samples
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn samples_produced(&self) -> u64 {
        self.metrics.items_processed()
    }

    /// Spawn the generation loop. No-op when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.state == TaskState::Running {
            return Ok(());
        }
        self.transition_to(TaskState::Running)?;

        let running = self.running.clone();
        running.store(true, Ordering::Release);

        let waveform = self.waveform.clone();
        let display_tx = self.display_tx.clone();
        let persistence_tx = self.persistence_tx.clone();
        let metrics = self.metrics.clone();
        let mut clock = SampleClock::new(self.sampling_hz);
        let period = self.period;

        info!(
            "starting producer at {} Hz (period {:?})",
            self.sampling_hz, period
        );

        let handle = tokio::spawn(async move {
            let mut produced = 0u64;

            while running.load(Ordering::Acquire) {
                let value = waveform.value_at(clock.tick());

                display_tx.send(value);
                persistence_tx.send(value);

                produced += 1;
                metrics.record_item();

                tokio::time::sleep(period).await;
            }

            debug!("producer loop exited after {} samples", produced);
            produced
        });

        self.handle = Some(handle);
        Ok(())
    }

    /// Clear the running flag and wait for the loop to exit (at most one
    /// period). Once this returns no further sample reaches either channel.
    ///
    /// A panicked loop still leaves the producer Stopped; the panic is
    /// returned as the error.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != TaskState::Running {
            return Ok(());
        }

        self.running.store(false, Ordering::Release);

        let joined = match self.handle.take() {
            Some(handle) => handle.await.map(|_| ()),
            None => Ok(()),
        };
        self.transition_to(TaskState::Stopped)?;

        joined.map_err(|e| anyhow!("Producer task failed: {}", e))?;
        info!("producer stopped after {} samples", self.samples_produced());
        Ok(())
    }
}

impl Drop for SignalProducer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

use anyhow::{anyhow, Result};
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::buffers::Receiver;
use crate::core::{PipelineConfig, Sample};
use crate::engine::state::TaskState;
use crate::observability::StageMetrics;
use crate::sinks::Renderer;
use crate::visualization::DisplayWindow;

/// Everything the tick loop owns while running
struct DisplayParts {
    receiver: Receiver<Sample>,
    window: DisplayWindow,
    renderer: Box<dyn Renderer>,
    metrics: Arc<StageMetrics>,
}

impl DisplayParts {
    fn tick(&mut self) -> usize {
        let batch = self.receiver.try_receive_all();
        if batch.is_empty() {
            return 0;
        }

        let start = self.metrics.begin_batch();
        let appended = self.window.append_batch(&batch);
        if let Some(viewport) = self.window.viewport() {
            self.renderer.render(&appended, viewport);
        }
        self.metrics.record_items(appended.len() as u64);
        self.metrics.end_batch(start);

        trace!(
            "display tick: drained {} samples, appended {} points",
            batch.len(),
            appended.len()
        );
        appended.len()
    }
}

/// Drains the display channel on a fixed tick, thins each batch to at most
/// about fifty points and forwards them to the renderer. Samples evicted
/// from the channel before a tick are never shown.
pub struct DisplayConsumer {
    interval: Duration,
    parts: Option<DisplayParts>,
    state: TaskState,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<DisplayParts>>,
    metrics: Arc<StageMetrics>,
}

impl DisplayConsumer {
    pub fn new(
        receiver: Receiver<Sample>,
        renderer: impl Renderer + 'static,
        interval: Duration,
        window_size: usize,
    ) -> Result<Self> {
        let window = DisplayWindow::new(window_size)?;
        let metrics = Arc::new(StageMetrics::new("display"));
        Ok(Self {
            interval,
            parts: Some(DisplayParts {
                receiver,
                window,
                renderer: Box::new(renderer),
                metrics: metrics.clone(),
            }),
            state: TaskState::Idle,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            metrics,
        })
    }

    pub fn from_config(
        config: &PipelineConfig,
        receiver: Receiver<Sample>,
        renderer: impl Renderer + 'static,
    ) -> Result<Self> {
        Self::new(
            receiver,
            renderer,
            config.ui_refresh_interval(),
            config.chart_window_size,
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<StageMetrics>) -> Self {
        if let Some(parts) = self.parts.as_mut() {
            parts.metrics = metrics.clone();
        }
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn transition_to(&mut self, new_state: TaskState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(anyhow!(
                "Invalid display transition: {} -> {}",
                self.state.name(),
                new_state.name()
            ));
        }
        self.state = new_state;
        Ok(())
    }

    /// Points handed to the renderer so far
    pub fn points_displayed(&self) -> u64 {
        self.metrics.items_processed()
    }

    /// The window, available whenever the tick loop is not running
    pub fn window(&self) -> Option<&DisplayWindow> {
        self.parts.as_ref().map(|parts| &parts.window)
    }

    /// Run one tick on the caller's task. Fails while the loop is running.
    pub fn tick_once(&mut self) -> Result<usize> {
        let parts = self
            .parts
            .as_mut()
            .ok_or_else(|| anyhow!("Display consumer is running"))?;
        Ok(parts.tick())
    }

    /// Launch the tick loop. No-op when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.state == TaskState::Running {
            return Ok(());
        }
        if !self.state.can_transition_to(&TaskState::Running) {
            return Err(anyhow!(
                "Cannot start display consumer in state {}",
                self.state.name()
            ));
        }

        let mut parts = self
            .parts
            .take()
            .ok_or_else(|| anyhow!("Display consumer lost its window and renderer"))?;

        let running = self.running.clone();
        running.store(true, Ordering::Release);
        let interval = self.interval;

        info!("starting display consumer, tick every {:?}", interval);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !running.load(Ordering::Acquire) {
                    break;
                }
                parts.tick();
            }

            debug!(
                "display loop exited with {} points appended",
                parts.window.total_appended()
            );
            parts
        });

        self.handle = Some(handle);
        self.transition_to(TaskState::Running)
    }

    /// Ask the loop to exit at its next tick and wait for it. Samples still
    /// buffered in the channel are left behind.
    ///
    /// If the loop panicked (a failing renderer) the consumer is Stopped
    /// without its window and cannot be restarted.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != TaskState::Running {
            return Ok(());
        }

        self.running.store(false, Ordering::Release);

        let joined = match self.handle.take() {
            Some(handle) => handle.await.map(Some),
            None => Ok(None),
        };
        self.transition_to(TaskState::Stopped)?;

        if let Some(parts) = joined.map_err(|e| anyhow!("Display task failed: {}", e))? {
            self.parts = Some(parts);
        }
        info!("display consumer stopped");
        Ok(())
    }
}

impl Drop for DisplayConsumer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

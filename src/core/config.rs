use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Waveform generator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaveformConfig {
    pub frequency_hz: f64,
    pub amplitude: f64,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 1.0,
            amplitude: 1.0,
        }
    }
}

/// Tunables for the producer, display consumer and persistence writer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nominal sampling rate in Hz
    pub sampling_hz: f32,

    /// Display tick interval in milliseconds
    pub ui_refresh_interval_ms: u64,

    /// Number of points kept visible on the display
    pub chart_window_size: usize,

    /// Capacity of each bounded channel
    pub channel_capacity: usize,

    /// Flush the sink every N records
    pub flush_every: u64,

    /// Destination of the persisted CSV stream
    pub output_path: PathBuf,

    pub waveform: WaveformConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling_hz: 500.0,
            ui_refresh_interval_ms: 20,
            chart_window_size: 200,
            channel_capacity: 10_000,
            flush_every: 100,
            output_path: PathBuf::from("ecg_data.csv"),
            waveform: WaveformConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse from JSON. Accepts a bare object or one nested under `pipeline_config`.
    pub fn from_json(config: Value) -> Result<Self> {
        let section = match config.get("pipeline_config") {
            Some(inner) => inner.clone(),
            None => config,
        };

        let parsed: PipelineConfig =
            serde_json::from_value(section).context("Failed to parse pipeline config")?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config from {:?}", path))?;
        let value: Value =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;
        Self::from_json(value)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sampling_hz.is_finite() && self.sampling_hz > 0.0) {
            bail!("sampling_hz must be > 0, got {}", self.sampling_hz);
        }
        if self.ui_refresh_interval_ms == 0 {
            bail!("ui_refresh_interval_ms must be > 0");
        }
        if self.chart_window_size == 0 {
            bail!("chart_window_size must be > 0");
        }
        if self.channel_capacity == 0 {
            bail!("channel_capacity must be >= 1");
        }
        if self.flush_every == 0 {
            bail!("flush_every must be >= 1");
        }
        if !(self.waveform.frequency_hz.is_finite() && self.waveform.frequency_hz > 0.0) {
            bail!("waveform.frequency_hz must be > 0, got {}", self.waveform.frequency_hz);
        }
        if !self.waveform.amplitude.is_finite() {
            bail!("waveform.amplitude must be finite");
        }
        Ok(())
    }

    /// Producer sleep per sample: `max(1ms, round(1000 / sampling_hz) ms)`
    pub fn sample_period(&self) -> Duration {
        sample_period(self.sampling_hz)
    }

    pub fn ui_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.ui_refresh_interval_ms)
    }
}

pub fn sample_period(sampling_hz: f32) -> Duration {
    let ms = (1000.0 / sampling_hz as f64).round();
    let ms = if ms.is_finite() { ms.max(1.0) as u64 } else { 1 };
    Duration::from_millis(ms)
}

use crate::core::{Sample, WaveformConfig};
use std::f64::consts::PI;

/// Pure function of elapsed time producing one sample
pub trait Waveform: Send + Sync {
    fn value_at(&self, t: f64) -> Sample;
}

/// `amplitude * sin(2π·f·t)`
#[derive(Debug, Clone, PartialEq)]
pub struct SineWave {
    frequency: f64,
    amplitude: f64,
}

impl Default for SineWave {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl SineWave {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
        }
    }

    pub fn from_config(config: &WaveformConfig) -> Self {
        Self::new(config.frequency_hz, config.amplitude)
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}

impl Waveform for SineWave {
    fn value_at(&self, t: f64) -> Sample {
        (self.amplitude * (2.0 * PI * self.frequency * t).sin()) as Sample
    }
}

/// Elapsed-time counter advanced by fixed `1 / rate` steps, independent of
/// wall-clock drift.
#[derive(Debug, Clone)]
pub struct SampleClock {
    t: f64,
    dt: f64,
}

impl SampleClock {
    pub fn new(sampling_hz: f32) -> Self {
        Self {
            t: 0.0,
            dt: 1.0 / sampling_hz as f64,
        }
    }

    /// Current time; the clock then advances by one period.
    pub fn tick(&mut self) -> f64 {
        let now = self.t;
        self.t += self.dt;
        now
    }

    pub fn elapsed(&self) -> f64 {
        self.t
    }

    pub fn step(&self) -> f64 {
        self.dt
    }
}

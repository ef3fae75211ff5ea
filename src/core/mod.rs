pub mod config;
pub mod sample;

pub use config::{PipelineConfig, WaveformConfig};
pub use sample::{DisplayPoint, Record, Sample};

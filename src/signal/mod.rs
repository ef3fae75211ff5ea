pub mod waveform;

pub use waveform::{SampleClock, SineWave, Waveform};

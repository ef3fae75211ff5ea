pub mod window;

pub use window::{downsample_factor, DisplayWindow, Viewport, MAX_POINTS_PER_TICK};

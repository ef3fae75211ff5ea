pub mod durable;
pub mod renderer;

pub use durable::{DurableSink, FileSink, MemorySink, MemorySinkHandle};
pub use renderer::{LogRenderer, RecordingRenderer, RenderedFrame, Renderer};

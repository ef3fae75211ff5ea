pub mod display;
pub mod pipeline;
pub mod producer;
pub mod state;
pub mod writer;

pub use display::DisplayConsumer;
pub use pipeline::{PipelineReport, SignalPipeline};
pub use producer::SignalProducer;
pub use state::{PipelineState, TaskState, WriterState};
pub use writer::{PersistenceWriter, WriterSummary};

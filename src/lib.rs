pub mod buffers;
pub mod core;
pub mod engine;
pub mod observability;
pub mod signal;
pub mod sinks;
pub mod visualization;

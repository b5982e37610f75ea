//! External process execution.

pub mod runner;
pub mod sink;

pub use runner::ProcessOrchestrator;
pub use sink::{LineSink, PassthroughSink, RunnerOutputSink};

//! ATS Launcher Core Library
//!
//! This crate provides the core functionality for launching ActionTestScript
//! projects. It includes:
//!
//! - Run configuration (tools and cache roots, catalog URLs, report flags)
//! - Tool provisioning: catalog lookup, download, safe extraction, caching
//! - Pinned core library releases
//! - Subprocess execution with live output forwarding
//! - The generation, compilation and execution pipeline

pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod provision;

// Re-exports for convenience
pub use config::{CoreVersion, RunConfiguration};
pub use error::{LaunchError, Result, StageKind};

// Re-export provisioning
pub use provision::{
    ResolutionMode, ResolvedToolSet, ToolEnvironment, ToolRequirement, ToolResolver, ToolRole,
};

// Re-export process execution
pub use process::{LineSink, PassthroughSink, ProcessOrchestrator, RunnerOutputSink};

// Re-export pipeline
pub use pipeline::{PipelineDriver, PipelineState, RunOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

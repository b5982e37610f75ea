//! Generation, compilation and test execution of an ATS project.

pub mod driver;
pub mod stages;
pub mod workspace;

pub use driver::{PipelineDriver, PipelineState, RunOutcome};
pub use stages::{StageBuilder, StageCommand};
pub use workspace::{normalize_suite, ProjectLayout};

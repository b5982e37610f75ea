//! Environment derived from resolved tools.
//!
//! Each resolved tool is exported as `<NAME>_HOME`. The core library and the
//! runtime are also exposed on their own, since the pipeline builds classpaths
//! from the former and locates `java`/`javac` in the latter.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::types::{ResolvedToolSet, ToolRole};

/// Variables and well-known paths for the pipeline's subprocesses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolEnvironment {
    pub variables: BTreeMap<String, String>,
    pub home_path: Option<PathBuf>,
    pub runtime_home: Option<PathBuf>,
}

impl ToolEnvironment {
    /// Builds the environment for a resolved tool set.
    ///
    /// Pure: calling it twice on the same set gives equal results.
    pub fn build(tools: &ResolvedToolSet) -> Self {
        let variables = tools
            .iter()
            .map(|tool| {
                (
                    tool.requirement.env_variable_name().to_string(),
                    tool.local_path.to_string_lossy().into_owned(),
                )
            })
            .collect();

        Self {
            variables,
            home_path: tools
                .by_role(ToolRole::CoreLibrary)
                .map(|t| t.local_path.clone()),
            runtime_home: tools
                .by_role(ToolRole::Runtime)
                .map(|t| t.local_path.clone()),
        }
    }

    pub fn home_path(&self) -> Option<&Path> {
        self.home_path.as_deref()
    }

    pub fn runtime_home(&self) -> Option<&Path> {
        self.runtime_home.as_deref()
    }
}

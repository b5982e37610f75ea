//! The immutable settings of one launcher run.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{LaunchError, Result};
use crate::provision::{Platform, ResolutionMode};

use super::paths::{
    default_cache_root, default_catalog_url, default_tools_root, DEFAULT_RELEASES_URL,
    PROJECT_DESCRIPTOR,
};

const TRUE_VALUES: &[&str] = &["on", "true", "1", "yes", "y"];
const FALSE_VALUES: &[&str] = &["off", "false", "0", "no", "n"];

/// Default test-runner output folder, relative to the project.
const DEFAULT_OUTPUT_DIR: &str = "target/ats-output";

// =============================================================================
// Flag Parsing
// =============================================================================

/// Parses an on/off style flag value, case-insensitively.
pub fn parse_flag(value: &str) -> Option<bool> {
    let value = value.trim().to_lowercase();
    if TRUE_VALUES.contains(&value.as_str()) {
        Some(true)
    } else if FALSE_VALUES.contains(&value.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Parses a report level; anything outside `1..=3` reads as `0`.
pub fn parse_report_level(value: &str) -> u8 {
    match value.trim().parse::<u8>() {
        Ok(level @ 1..=3) => level,
        _ => 0,
    }
}

// =============================================================================
// Core Version Pinning
// =============================================================================

/// How the core library version is pinned, if at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreVersion {
    /// Fetch the release into the cache root when it is missing.
    Provisioned(String),
    /// Use `<cache_root>/<version>` as-is, without checking it.
    Preinstalled(String),
}

// =============================================================================
// Run Configuration
// =============================================================================

/// Settings for one run, built once and then only read.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    /// Project folder; must contain the project descriptor.
    pub project_dir: PathBuf,
    /// Folder holding installed tool bundles.
    pub tools_root: PathBuf,
    /// Folder holding pinned core releases.
    pub cache_root: PathBuf,
    /// Public tools feed.
    pub catalog_url: String,
    /// CI-server mirror of the tools feed; primary when set.
    pub mirror_url: Option<String>,
    pub releases_url: String,
    /// When false, no catalog is queried and nothing is downloaded.
    pub outbound: bool,
    pub disable_tls_verification: bool,
    pub core_version: Option<CoreVersion>,
    pub report_level: u8,
    pub validation_report: bool,
    pub html_player: bool,
    /// Test-runner output folder, relative to the project unless absolute.
    pub output_dir: PathBuf,
    /// Suite descriptor names, as given.
    pub suites: Vec<String>,
    /// Stop once tools are installed.
    pub tools_only: bool,
    /// Delete the tools and cache roots before the run.
    pub clean: bool,
    pub platform: Platform,
}

impl RunConfiguration {
    /// Creates a configuration with default locations for `project_dir`.
    ///
    /// Fails when no user folder is known to hold the tools and cache roots.
    pub fn new(project_dir: impl Into<PathBuf>, platform: Platform) -> Result<Self> {
        let no_home =
            || LaunchError::Configuration("Cannot determine the user's home folder".into());

        Ok(Self {
            project_dir: project_dir.into(),
            tools_root: default_tools_root().ok_or_else(no_home)?,
            cache_root: default_cache_root().ok_or_else(no_home)?,
            catalog_url: default_catalog_url(platform),
            mirror_url: None,
            releases_url: DEFAULT_RELEASES_URL.to_string(),
            outbound: true,
            disable_tls_verification: false,
            core_version: None,
            report_level: 0,
            validation_report: false,
            html_player: true,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            suites: Vec::new(),
            tools_only: false,
            clean: false,
            platform,
        })
    }

    /// Checks the project folder before any network or process activity.
    pub fn validate(&self) -> Result<()> {
        if !self.project_dir.is_dir() {
            return Err(LaunchError::Configuration(format!(
                "Project folder {} does not exist",
                self.project_dir.display()
            )));
        }

        let descriptor = self.project_dir.join(PROJECT_DESCRIPTOR);
        if !descriptor.is_file() {
            return Err(LaunchError::Configuration(format!(
                "{} is not an ATS project ({} not found)",
                self.project_dir.display(),
                PROJECT_DESCRIPTOR
            )));
        }

        debug!(project = %self.project_dir.display(), "Configuration validated");
        Ok(())
    }

    /// Resolution strategy implied by the outbound and mirror settings.
    pub fn resolution_mode(&self) -> ResolutionMode {
        if !self.outbound {
            return ResolutionMode::Offline;
        }

        match &self.mirror_url {
            Some(mirror) => ResolutionMode::Catalog {
                primary: mirror.clone(),
                fallback: Some(self.catalog_url.clone()),
            },
            None => ResolutionMode::Catalog {
                primary: self.catalog_url.clone(),
                fallback: None,
            },
        }
    }

    /// Absolute or project-relative test-runner output folder.
    pub fn output_path(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.project_dir.join(&self.output_dir)
        }
    }
}

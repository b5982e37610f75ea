//! Command-line arguments.

use std::path::PathBuf;

use anyhow::Result;
use atslaunch_core::config::{mirror_catalog_url, parse_flag, parse_report_level};
use atslaunch_core::provision::Platform;
use atslaunch_core::{CoreVersion, RunConfiguration};
use clap::{ArgAction, Parser};

fn on_off(value: &str) -> std::result::Result<bool, String> {
    parse_flag(value).ok_or_else(|| format!("'{}' is not an on/off value", value))
}

#[derive(Debug, Parser)]
#[command(name = "atslaunch")]
#[command(version = atslaunch_core::VERSION)]
#[command(about = "Install ActionTestScript tools and run a project's test suites")]
#[command(
    after_help = "Example:\n    atslaunch ./my-project --suite-xml-files smoke,regression --report-level 2"
)]
pub struct Args {
    /// ATS project folder
    #[arg(default_value = ".")]
    pub project_dir: PathBuf,

    /// Comma-separated suite names (resolved under src/exec)
    #[arg(long = "suite-xml-files", alias = "suites", value_delimiter = ',')]
    pub suites: Vec<String>,

    /// Report level, 0 to 3
    #[arg(long, env = "ATS_REPORT")]
    pub report_level: Option<String>,

    #[arg(long, default_value = "off", value_parser = on_off, action = ArgAction::Set)]
    pub validation_report: bool,

    #[arg(long, default_value = "on", value_parser = on_off, action = ArgAction::Set)]
    pub html_player: bool,

    /// Test report folder, relative to the project
    #[arg(long, alias = "reports-directory")]
    pub output: Option<PathBuf>,

    /// Tools feed URL
    #[arg(long)]
    pub tools_url: Option<String>,

    /// Folder holding installed tools
    #[arg(long, env = "ATS_TOOLS")]
    pub tools_folder: Option<PathBuf>,

    /// CI server whose userContent mirrors the tools feed
    #[arg(long)]
    pub jenkins_url: Option<String>,

    /// Allow network access to tool and release servers
    #[arg(long, default_value = "on", value_parser = on_off, action = ArgAction::Set)]
    pub outbound: bool,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub disable_ssl: bool,

    /// Core library release to fetch into the cache
    #[arg(long)]
    pub ats_version: Option<String>,

    /// Core library release already present in the cache
    #[arg(long, env = "ATS_VERSION", hide = true)]
    pub preinstalled_version: Option<String>,

    /// Install tools and exit
    #[arg(long, alias = "install-tools")]
    pub install: bool,

    /// Delete installed tools and cached releases first
    #[arg(long)]
    pub clean: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Builds the run configuration for the current platform.
    pub fn into_config(self) -> Result<RunConfiguration> {
        let platform = Platform::detect();
        let mut config = RunConfiguration::new(self.project_dir, platform)?;

        if let Some(tools_root) = self.tools_folder {
            config.tools_root = tools_root;
        }
        if let Some(url) = self.tools_url {
            config.catalog_url = url;
        }
        config.mirror_url = self.jenkins_url.as_deref().map(mirror_catalog_url);
        config.outbound = self.outbound;
        config.disable_tls_verification = self.disable_ssl;

        let preinstalled = non_blank(self.preinstalled_version);
        config.core_version = match (preinstalled, non_blank(self.ats_version)) {
            (Some(version), _) => Some(CoreVersion::Preinstalled(version)),
            (None, Some(version)) => Some(CoreVersion::Provisioned(version)),
            (None, None) => None,
        };

        config.report_level = self
            .report_level
            .as_deref()
            .map(parse_report_level)
            .unwrap_or(0);
        config.validation_report = self.validation_report;
        config.html_player = self.html_player;
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        config.suites = self
            .suites
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        config.tools_only = self.install;
        config.clean = self.clean;

        Ok(config)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

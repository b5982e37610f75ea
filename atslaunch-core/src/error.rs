//! Error taxonomy for a launcher run.
//!
//! Every failure that can end a run is a [`LaunchError`]. Recoverable kinds
//! (an unreachable catalog) are caught by the resolver and turned into the
//! offline fallback; all others propagate to the binary, which maps them to a
//! process exit status with [`LaunchError::exit_code`].

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Exit status for a run that could not start because its configuration is unusable.
pub const EXIT_CONFIGURATION: i32 = 2;
/// Exit status for a run whose tools could not be provisioned.
pub const EXIT_PROVISIONING: i32 = 3;
/// Exit status for a run halted by a failed generation or compilation stage.
pub const EXIT_STAGE_FAILURE: i32 = 4;
/// Exit status for a run where a subprocess could not be started.
pub const EXIT_PROCESS_LAUNCH: i32 = 5;
/// Exit status for any other I/O failure.
pub const EXIT_IO: i32 = 1;

/// Pipeline stage that runs an external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Generation,
    Compilation,
    Execution,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Compilation => "compilation",
            Self::Execution => "execution",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Tools catalog not reachable at {url}: {reason}")]
    CatalogUnreachable { url: String, reason: String },

    #[error("Tool '{tool}' is not installed on this system (searched {})", searched.display())]
    ToolNotFound { tool: String, searched: PathBuf },

    #[error("Bad archive {}: {reason}", archive.display())]
    ArchiveIntegrity { archive: PathBuf, reason: String },

    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("Malformed version token '{0}'")]
    MalformedVersion(String),

    #[error("Unable to launch {program}: {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("The {stage} stage failed with exit code {code}")]
    StageFailure { stage: StageKind, code: i32 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl LaunchError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn archive(archive: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArchiveIntegrity {
            archive: archive.into(),
            reason: reason.into(),
        }
    }

    pub fn download(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::Download {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that happened while resolving or installing tools.
    pub fn is_provisioning(&self) -> bool {
        matches!(
            self,
            Self::CatalogUnreachable { .. }
                | Self::ToolNotFound { .. }
                | Self::ArchiveIntegrity { .. }
                | Self::Download { .. }
                | Self::MalformedVersion(_)
        )
    }

    /// Process exit status reported for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => EXIT_CONFIGURATION,
            Self::StageFailure { .. } => EXIT_STAGE_FAILURE,
            Self::ProcessLaunch { .. } => EXIT_PROCESS_LAUNCH,
            _ if self.is_provisioning() => EXIT_PROVISIONING,
            _ => EXIT_IO,
        }
    }
}

pub type Result<T> = std::result::Result<T, LaunchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_family() {
        let config = LaunchError::Configuration("missing descriptor".into());
        let missing = LaunchError::ToolNotFound {
            tool: "jdk".into(),
            searched: PathBuf::from("/opt/ats/tools"),
        };
        let stage = LaunchError::StageFailure {
            stage: StageKind::Generation,
            code: 2,
        };
        let launch = LaunchError::ProcessLaunch {
            program: "java".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };

        assert_eq!(config.exit_code(), EXIT_CONFIGURATION);
        assert_eq!(missing.exit_code(), EXIT_PROVISIONING);
        assert_eq!(stage.exit_code(), EXIT_STAGE_FAILURE);
        assert_eq!(launch.exit_code(), EXIT_PROCESS_LAUNCH);
        assert_eq!(
            LaunchError::io("Failed to write report", io::Error::other("disk full")).exit_code(),
            EXIT_IO
        );
        assert_eq!(
            LaunchError::download("https://x/jdk.tgz", "server responded 404").exit_code(),
            EXIT_PROVISIONING
        );
        assert_ne!(stage.exit_code(), 0);
    }

    #[test]
    fn test_provisioning_family() {
        assert!(LaunchError::archive("/tmp/a.zip", "escapes").is_provisioning());
        assert!(LaunchError::MalformedVersion("x.y".into()).is_provisioning());
        assert!(!LaunchError::Configuration("nope".into()).is_provisioning());
    }

    #[test]
    fn test_messages_name_tool_and_stage() {
        let missing = LaunchError::ToolNotFound {
            tool: "jasper".into(),
            searched: PathBuf::from("/home/u/ats/tools"),
        };
        let text = missing.to_string();
        assert!(text.contains("jasper"));
        assert!(text.contains("/home/u/ats/tools"));

        let stage = LaunchError::StageFailure {
            stage: StageKind::Compilation,
            code: 1,
        };
        assert!(stage.to_string().contains("compilation"));
    }
}

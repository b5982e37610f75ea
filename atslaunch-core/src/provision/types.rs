//! Core types for tool provisioning.
//!
//! This module defines the foundational types shared by the catalog, cache,
//! resolver and environment builder: platform detection, archive formats,
//! tool requirements and resolution results.

use std::fmt;
use std::path::{Path, PathBuf};

// ============================================================================
// Platform Detection
// ============================================================================

/// Operating system family the launcher runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Macos,
    Windows,
}

impl Platform {
    /// Detects the current platform at compile time.
    pub fn detect() -> Self {
        #[cfg(windows)]
        {
            Platform::Windows
        }
        #[cfg(target_os = "macos")]
        {
            Platform::Macos
        }
        #[cfg(not(any(windows, target_os = "macos")))]
        {
            Platform::Linux
        }
    }

    /// Operating system tag used in catalog and release URLs.
    ///
    /// The tools server only publishes `windows` and `linux` feeds; macOS
    /// uses the linux feed.
    pub fn catalog_os(&self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Linux | Self::Macos => "linux",
        }
    }

    /// Archive format the tools server publishes for this platform.
    pub fn archive_format(&self) -> ArchiveFormat {
        match self {
            Self::Windows => ArchiveFormat::Zip,
            Self::Linux | Self::Macos => ArchiveFormat::TarGz,
        }
    }

    /// Name of the system driver executable whose permissions need restoring
    /// after extraction.
    pub fn driver_executable(&self) -> Option<&'static str> {
        match self {
            Self::Linux => Some("linuxdriver"),
            Self::Macos => Some("macosdriver"),
            Self::Windows => None,
        }
    }

    /// True on platforms where archive permissions must be restored by hand.
    pub fn is_posix(&self) -> bool {
        !matches!(self, Self::Windows)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linux => "linux",
            Self::Macos => "macos",
            Self::Windows => "windows",
        };
        write!(f, "{}", name)
    }
}

// ============================================================================
// Archive Formats
// ============================================================================

/// Archive format for downloaded tool bundles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Gzip-compressed tar archive (.tar.gz, .tgz)
    TarGz,
    /// ZIP archive (.zip)
    Zip,
}

impl ArchiveFormat {
    /// Infers the archive format from a URL or filename.
    pub fn from_url(url: &str) -> Option<Self> {
        let lower = url.to_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if lower.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    /// File extension used when saving a downloaded archive.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarGz => "tgz",
            Self::Zip => "zip",
        }
    }
}

// ============================================================================
// Tool Requirements
// ============================================================================

/// Structural role a tool plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolRole {
    /// Core library: its `libs` folder feeds every classpath.
    CoreLibrary,
    /// Report generator, only exported through its environment variable.
    ReportGenerator,
    /// Runtime holding the interpreter and compiler binaries.
    Runtime,
}

/// A tool the run needs, as declared before resolution starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequirement {
    name: String,
    role: ToolRole,
    env_variable_name: String,
    pinned_path: Option<PathBuf>,
}

impl ToolRequirement {
    pub fn new(name: impl Into<String>, role: ToolRole) -> Self {
        let name = name.into();
        let env_variable_name = format!("{}_HOME", name.to_uppercase());
        Self {
            name,
            role,
            env_variable_name,
            pinned_path: None,
        }
    }

    /// Binds the tool to a location established out-of-band; resolution is skipped.
    pub fn pinned(mut self, path: impl Into<PathBuf>) -> Self {
        self.pinned_path = Some(path.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ToolRole {
        self.role
    }

    pub fn env_variable_name(&self) -> &str {
        &self.env_variable_name
    }

    pub fn pinned_path(&self) -> Option<&Path> {
        self.pinned_path.as_deref()
    }

    pub fn requires_resolution(&self) -> bool {
        self.pinned_path.is_none()
    }
}

/// Names of the tools published by the ActionTestScript tools server.
pub const CORE_TOOL: &str = "ats";
pub const REPORT_TOOL: &str = "jasper";
pub const RUNTIME_TOOL: &str = "jdk";

/// The standard requirement set: core library, report generator and runtime.
pub fn default_requirements() -> Vec<ToolRequirement> {
    vec![
        ToolRequirement::new(CORE_TOOL, ToolRole::CoreLibrary),
        ToolRequirement::new(REPORT_TOOL, ToolRole::ReportGenerator),
        ToolRequirement::new(RUNTIME_TOOL, ToolRole::Runtime),
    ]
}

// ============================================================================
// Resolution Results
// ============================================================================

/// How a tool's local path was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// Bound before resolution started.
    Pinned,
    /// Catalog-confirmed folder already present under the tools root.
    Cached,
    /// Downloaded and extracted from the catalog's archive URL.
    Downloaded,
    /// Found by the offline best-effort folder scan.
    LocalScan,
}

/// Result of resolving one [`ToolRequirement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTool {
    pub requirement: ToolRequirement,
    /// Absolute path of the installed tool folder.
    pub local_path: PathBuf,
    /// Catalog-advertised folder name, when a catalog was consulted.
    pub remote_folder_name: Option<String>,
    /// Archive URL the tool was installed from.
    pub download_url: Option<String>,
    pub source: ResolutionSource,
}

impl ResolvedTool {
    pub fn name(&self) -> &str {
        self.requirement.name()
    }
}

/// The resolved tool table, in requirement order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedToolSet {
    tools: Vec<ResolvedTool>,
}

impl ResolvedToolSet {
    pub fn new(tools: Vec<ResolvedTool>) -> Self {
        Self { tools }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedTool> {
        self.tools.iter()
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn by_role(&self, role: ToolRole) -> Option<&ResolvedTool> {
        self.tools.iter().find(|t| t.requirement.role() == role)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

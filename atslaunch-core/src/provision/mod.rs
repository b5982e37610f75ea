//! Tool provisioning.
//!
//! Resolves the tool bundles a run needs (core library, report generator,
//! runtime) to folders under the tools root, downloading and extracting them
//! when a catalog lists them and no local copy exists.
//!
//! # Architecture
//!
//! - `types`: Core types (Platform, ArchiveFormat, ToolRequirement, ResolvedTool)
//! - `catalog`: Tools feed and release directory listing parsing
//! - `cache`: Read-only lookups under the tools root
//! - `downloader`: Async file download with progress reporting
//! - `extractor`: Archive extraction (zip, tar.gz) with traversal checks
//! - `resolver`: Catalog and offline resolution of a requirement list
//! - `release`: Pinned core library releases in the cache root
//! - `env`: `<NAME>_HOME` variables for subprocesses
//!
//! # Example
//!
//! ```ignore
//! use atslaunch_core::provision::{
//!     build_client, default_requirements, Platform, ResolutionMode, ToolEnvironment, ToolResolver,
//! };
//!
//! let platform = Platform::detect();
//! let resolver = ToolResolver::new(build_client(platform, false)?, tools_root, platform);
//! let mode = ResolutionMode::Catalog { primary: catalog_url, fallback: None };
//!
//! let tools = resolver.resolve_all(&default_requirements(), &mode).await?;
//! let env = ToolEnvironment::build(&tools);
//! ```

pub mod cache;
pub mod catalog;
pub mod downloader;
pub mod env;
pub mod extractor;
pub mod release;
pub mod resolver;
pub mod types;

pub use cache::ToolCache;
pub use catalog::{
    fetch_catalog, latest_version, parse_catalog_body, parse_directory_listing, CatalogMap,
    CatalogRecord, VersionEntry,
};
pub use downloader::{build_client, download_file, DownloadProgress};
pub use env::ToolEnvironment;
pub use extractor::extract_archive;
pub use release::{release_dir, ReleaseProvisioner};
pub use resolver::{ResolutionMode, ToolResolver};
pub use types::{
    default_requirements, ArchiveFormat, Platform, ResolutionSource, ResolvedTool,
    ResolvedToolSet, ToolRequirement, ToolRole, CORE_TOOL, REPORT_TOOL, RUNTIME_TOOL,
};

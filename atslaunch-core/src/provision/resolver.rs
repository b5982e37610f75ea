//! Tool resolution.
//!
//! The `ToolResolver` turns a list of [`ToolRequirement`]s into a
//! [`ResolvedToolSet`]. It coordinates between the catalog, the local cache,
//! the downloader and the extractor.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::{LaunchError, Result};

use super::cache::{absolute, ToolCache};
use super::catalog::{fetch_catalog, merge_fallback, missing_tools, CatalogMap, CatalogRecord};
use super::downloader::{download_file, log_progress};
use super::extractor::{extract_archive, make_bin_executable};
use super::types::{
    ArchiveFormat, Platform, ResolutionSource, ResolvedTool, ResolvedToolSet, ToolRequirement,
};

// ============================================================================
// Resolution Mode
// ============================================================================

/// Top-level strategy for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Resolve against remote catalogs, falling back to offline mode when
    /// no catalog covers every required tool.
    Catalog {
        primary: String,
        fallback: Option<String>,
    },
    /// Resolve from the tools root alone.
    Offline,
}

// ============================================================================
// Tool Resolver
// ============================================================================

/// Resolves required tools to installed folders under a tools root.
pub struct ToolResolver {
    client: reqwest::Client,
    cache: ToolCache,
    platform: Platform,
}

impl ToolResolver {
    pub fn new(client: reqwest::Client, tools_root: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            client,
            cache: ToolCache::new(tools_root),
            platform,
        }
    }

    /// Resolves every requirement, or fails naming the first tool that could
    /// not be resolved.
    pub async fn resolve_all(
        &self,
        requirements: &[ToolRequirement],
        mode: &ResolutionMode,
    ) -> Result<ResolvedToolSet> {
        if requirements.iter().all(|r| !r.requires_resolution()) {
            debug!("All tools are pinned, nothing to resolve");
            return Ok(ResolvedToolSet::new(
                requirements.iter().map(pinned_tool).collect(),
            ));
        }

        let records = match mode {
            ResolutionMode::Catalog { primary, fallback } => {
                self.query_catalogs(primary, fallback.as_deref(), requirements)
                    .await
            }
            ResolutionMode::Offline => {
                info!("Outbound traffic has been turned off, using installed tools only");
                None
            }
        };

        match records {
            Some(records) => self.resolve_with_catalog(requirements, &records).await,
            None => self.resolve_offline(requirements),
        }
    }

    // ========================================================================
    // Catalog Mode
    // ========================================================================

    /// Returns a mapping covering every required tool, or `None` when catalog
    /// mode is unusable for this run.
    async fn query_catalogs(
        &self,
        primary: &str,
        fallback: Option<&str>,
        requirements: &[ToolRequirement],
    ) -> Option<CatalogMap> {
        let mut records = fetch_catalog(&self.client, primary).await;

        if !missing_tools(&records, requirements).is_empty() {
            if let Some(fallback) = fallback {
                info!("Catalog {} is incomplete, trying {}", primary, fallback);
                let fallback_records = fetch_catalog(&self.client, fallback).await;
                merge_fallback(&mut records, fallback_records);
            }
        }

        let missing = missing_tools(&records, requirements);
        if missing.is_empty() {
            Some(records)
        } else {
            warn!(
                "No catalog lists {}, switching to offline mode",
                missing.join(", ")
            );
            None
        }
    }

    async fn resolve_with_catalog(
        &self,
        requirements: &[ToolRequirement],
        records: &CatalogMap,
    ) -> Result<ResolvedToolSet> {
        let mut tools = Vec::with_capacity(requirements.len());

        for requirement in requirements {
            if !requirement.requires_resolution() {
                tools.push(pinned_tool(requirement));
                continue;
            }

            let record = records.get(requirement.name()).ok_or_else(|| {
                LaunchError::ToolNotFound {
                    tool: requirement.name().to_string(),
                    searched: self.cache.root().to_path_buf(),
                }
            })?;

            let tool = match self.cache.locate_confirmed(&record.folder_name) {
                Some(local_path) => ResolvedTool {
                    requirement: requirement.clone(),
                    local_path,
                    remote_folder_name: Some(record.folder_name.clone()),
                    download_url: None,
                    source: ResolutionSource::Cached,
                },
                None => ResolvedTool {
                    requirement: requirement.clone(),
                    local_path: self.install(record).await?,
                    remote_folder_name: Some(record.folder_name.clone()),
                    download_url: Some(record.archive_url.clone()),
                    source: ResolutionSource::Downloaded,
                },
            };

            info!(
                tool = tool.name(),
                source = ?tool.source,
                "Using {}",
                tool.local_path.display()
            );
            tools.push(tool);
        }

        Ok(ResolvedToolSet::new(tools))
    }

    /// Downloads and installs one catalog record under the tools root.
    ///
    /// The archive is extracted into a staging folder inside the tools root
    /// and its top-level folder is moved into place with a single rename.
    async fn install(&self, record: &CatalogRecord) -> Result<PathBuf> {
        let root = self.cache.root();
        let target = self.cache.folder_path(&record.folder_name);
        let format = ArchiveFormat::from_url(&record.archive_url)
            .unwrap_or_else(|| self.platform.archive_format());

        info!(
            "Installing {} {} from {}",
            record.name, record.version, record.archive_url
        );

        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| LaunchError::io(format!("Failed to create {}", root.display()), e))?;

        let download_dir = tempfile::tempdir()
            .map_err(|e| LaunchError::io("Failed to create a download folder", e))?;
        let archive_path = download_dir
            .path()
            .join(format!("{}.{}", record.folder_name, format.extension()));

        download_file(
            &self.client,
            &record.archive_url,
            &archive_path,
            log_progress(&record.name),
        )
        .await?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(root)
            .map_err(|e| LaunchError::io(format!("Failed to stage in {}", root.display()), e))?;

        extract_archive(&archive_path, staging.path(), format)?;

        let extracted = staging.path().join(&record.folder_name);
        if !extracted.is_dir() {
            return Err(LaunchError::archive(
                &archive_path,
                format!("missing top-level folder '{}'", record.folder_name),
            ));
        }

        match tokio::fs::rename(&extracted, &target).await {
            Ok(()) => {}
            Err(e) if target.exists() => {
                warn!(
                    "{} was installed concurrently ({}), using the existing folder",
                    target.display(),
                    e
                );
            }
            Err(e) => {
                return Err(LaunchError::io(
                    format!("Failed to install {}", target.display()),
                    e,
                ))
            }
        }

        if self.platform.is_posix() {
            make_bin_executable(&target)?;
        }

        Ok(absolute(&target))
    }

    // ========================================================================
    // Offline Mode
    // ========================================================================

    fn resolve_offline(&self, requirements: &[ToolRequirement]) -> Result<ResolvedToolSet> {
        info!(
            "Resolving tools from {} without a catalog",
            self.cache.root().display()
        );

        let mut tools = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            if !requirement.requires_resolution() {
                tools.push(pinned_tool(requirement));
                continue;
            }

            let local_path = self.cache.scan_latest(requirement.name()).ok_or_else(|| {
                LaunchError::ToolNotFound {
                    tool: requirement.name().to_string(),
                    searched: self.cache.root().to_path_buf(),
                }
            })?;

            info!(tool = requirement.name(), "Using {}", local_path.display());
            tools.push(ResolvedTool {
                requirement: requirement.clone(),
                local_path,
                remote_folder_name: None,
                download_url: None,
                source: ResolutionSource::LocalScan,
            });
        }

        Ok(ResolvedToolSet::new(tools))
    }
}

fn pinned_tool(requirement: &ToolRequirement) -> ResolvedTool {
    let local_path = requirement
        .pinned_path()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();

    ResolvedTool {
        requirement: requirement.clone(),
        local_path,
        remote_folder_name: None,
        download_url: None,
        source: ResolutionSource::Pinned,
    }
}

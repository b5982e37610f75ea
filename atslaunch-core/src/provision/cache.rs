//! Local tool cache lookups.
//!
//! Installed tool bundles live directly under the tools root, one folder per
//! bundle, named after the catalog's `folderName` (for example `jdk-21.0.2`).
//! Lookups here only read the tools root and never modify it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Read-only view over a tools root.
#[derive(Debug, Clone)]
pub struct ToolCache {
    root: PathBuf,
}

impl ToolCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a catalog-confirmed folder is installed at, hit or not.
    pub fn folder_path(&self, folder_name: &str) -> PathBuf {
        self.root.join(folder_name)
    }

    /// Catalog-confirmed lookup: a hit when `root/folder_name` exists.
    pub fn locate_confirmed(&self, folder_name: &str) -> Option<PathBuf> {
        let path = self.folder_path(folder_name);
        if path.exists() {
            debug!(folder = folder_name, "Tool cache hit");
            Some(absolute(&path))
        } else {
            debug!(folder = folder_name, "Tool cache miss");
            None
        }
    }

    /// Best-effort scan for the newest installed folder of a tool.
    ///
    /// Considers the directories directly under the root whose names start
    /// with `tool_name` and picks the lexicographically greatest one. Folder
    /// names usually embed a version, so this approximates "most recent"
    /// without comparing versions. I/O errors count as no match.
    pub fn scan_latest(&self, tool_name: &str) -> Option<PathBuf> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %self.root.display(), error = %e, "Cannot scan tools root");
                return None;
            }
        };

        let mut folders: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.starts_with(tool_name))
            .collect();

        folders.sort_by(|a, b| b.cmp(a));
        folders
            .into_iter()
            .next()
            .map(|name| absolute(&self.root.join(name)))
    }
}

pub(crate) fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

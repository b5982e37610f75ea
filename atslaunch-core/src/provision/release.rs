//! Pinned core library releases.
//!
//! A pinned release lives in `<cache_root>/<version>` and is usable once it
//! holds both a `libs` folder (the release's jar files) and a `drivers` folder
//! (the newest system driver bundle for this platform). Missing parts are
//! downloaded from the releases server. Nothing here is fatal: any failure is
//! logged and the core library is then resolved like every other tool.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{LaunchError, Result};

use super::catalog::fetch_latest_archive;
use super::downloader::{download_file, log_progress};
use super::extractor::{extract_archive, grant_full_permissions};
use super::types::{ArchiveFormat, Platform};

const LIBS_FOLDER: &str = "libs";
const DRIVERS_FOLDER: &str = "drivers";

/// Fetches missing parts of a pinned release.
pub struct ReleaseProvisioner<'a> {
    client: &'a reqwest::Client,
    cache_root: &'a Path,
    releases_url: &'a str,
    platform: Platform,
}

impl<'a> ReleaseProvisioner<'a> {
    pub fn new(
        client: &'a reqwest::Client,
        cache_root: &'a Path,
        releases_url: &'a str,
        platform: Platform,
    ) -> Self {
        Self {
            client,
            cache_root,
            releases_url: releases_url.trim_end_matches('/'),
            platform,
        }
    }

    /// Makes `version` available locally and returns its folder, or `None`
    /// when the release is still incomplete.
    pub async fn provision(&self, version: &str) -> Option<PathBuf> {
        let version_dir = release_dir(self.cache_root, version);

        if let Err(e) = self.fetch_missing_parts(version, &version_dir).await {
            warn!("Release {} could not be provisioned: {}", version, e);
        }

        if is_complete(&version_dir) {
            info!("Using release {} from {}", version, version_dir.display());
            Some(version_dir)
        } else {
            None
        }
    }

    /// Returns the folder of `version` if it is already complete, without
    /// any network access.
    pub fn locate(&self, version: &str) -> Option<PathBuf> {
        let version_dir = release_dir(self.cache_root, version);
        is_complete(&version_dir).then_some(version_dir)
    }

    async fn fetch_missing_parts(&self, version: &str, version_dir: &Path) -> Result<()> {
        let libs = version_dir.join(LIBS_FOLDER);
        if !libs.exists() {
            let url = format!("{}/ats-libs/{}.zip", self.releases_url, version);
            self.install_into(&url, version_dir, &libs).await?;
        }

        let drivers = version_dir.join(DRIVERS_FOLDER);
        if !drivers.exists() {
            let listing = format!(
                "{}/ats-drivers/{}/system",
                self.releases_url,
                self.platform.catalog_os()
            );
            let latest = fetch_latest_archive(self.client, &listing)
                .await?
                .ok_or_else(|| LaunchError::download(&listing, "no driver archive listed"))?;

            info!("System drivers {} -> {}", latest.version, latest.url);
            self.install_into(&latest.url, version_dir, &drivers).await?;

            if let Some(driver) = self.platform.driver_executable() {
                let driver_path = drivers.join(driver);
                if driver_path.exists() {
                    grant_full_permissions(&driver_path)?;
                }
            }
        }

        Ok(())
    }

    /// Downloads an archive and extracts its whole content as `target`.
    async fn install_into(&self, url: &str, version_dir: &Path, target: &Path) -> Result<()> {
        let format = ArchiveFormat::from_url(url).unwrap_or(ArchiveFormat::Zip);

        tokio::fs::create_dir_all(version_dir).await.map_err(|e| {
            LaunchError::io(format!("Failed to create {}", version_dir.display()), e)
        })?;

        let download_dir = tempfile::tempdir()
            .map_err(|e| LaunchError::io("Failed to create a download folder", e))?;
        let archive_path = download_dir
            .path()
            .join(format!("release.{}", format.extension()));

        let label = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("release");
        download_file(self.client, url, &archive_path, log_progress(label)).await?;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(version_dir)
            .map_err(|e| {
                LaunchError::io(format!("Failed to stage in {}", version_dir.display()), e)
            })?;
        extract_archive(&archive_path, staging.path(), format)?;

        tokio::fs::rename(staging.path(), target)
            .await
            .map_err(|e| LaunchError::io(format!("Failed to install {}", target.display()), e))
    }
}

/// Folder a release version is installed in.
pub fn release_dir(cache_root: &Path, version: &str) -> PathBuf {
    cache_root.join(version)
}

fn is_complete(version_dir: &Path) -> bool {
    version_dir.join(LIBS_FOLDER).is_dir() && version_dir.join(DRIVERS_FOLDER).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_complete_release_needs_no_network() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("3.1.0/libs")).unwrap();
        fs::create_dir_all(temp_dir.path().join("3.1.0/drivers")).unwrap();

        let client = reqwest::Client::new();
        let provisioner = ReleaseProvisioner::new(
            &client,
            temp_dir.path(),
            "http://invalid.invalid/releases",
            Platform::Linux,
        );

        let dir = provisioner.provision("3.1.0").await.unwrap();
        assert_eq!(dir, temp_dir.path().join("3.1.0"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("3.1.0/libs")).unwrap();

        let client = reqwest::Client::new();
        let provisioner = ReleaseProvisioner::new(
            &client,
            temp_dir.path(),
            "http://127.0.0.1:9/releases",
            Platform::Linux,
        );

        assert!(provisioner.provision("3.1.0").await.is_none());
        assert!(!temp_dir.path().join("3.1.0/drivers").exists());
    }

    #[test]
    fn test_release_dir() {
        assert_eq!(
            release_dir(Path::new("/home/u/ats/cache"), "3.1.0"),
            PathBuf::from("/home/u/ats/cache/3.1.0")
        );
    }
}

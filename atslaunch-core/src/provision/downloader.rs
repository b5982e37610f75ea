//! Streaming file downloads with coarse progress reporting.
//!
//! Progress callbacks fire on the downloading task, once per 5% step when the
//! server announces a length, or once per megabyte when it does not. A
//! threshold is never reported twice.

use std::path::Path;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{LaunchError, Result};

use super::types::Platform;

/// Percentage step between two progress reports for sized downloads.
const PERCENT_STEP: u64 = 5;

/// Byte quantum between two progress reports for unsized downloads.
pub const UNKNOWN_SIZE_QUANTUM: u64 = 1_000_000;

// ============================================================================
// HTTP Client
// ============================================================================

/// Builds the HTTP client shared by catalog queries and downloads.
///
/// Redirects are never followed.
pub fn build_client(platform: Platform, accept_invalid_certs: bool) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .user_agent(format!("AtsLauncher-{}", platform.catalog_os()))
        .default_headers(headers)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| LaunchError::Configuration(format!("Cannot build HTTP client: {}", e)))
}

fn validate_url(url_str: &str) -> Result<()> {
    let url = Url::parse(url_str).map_err(|e| LaunchError::download(url_str, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(LaunchError::download(
            url_str,
            format!("unsupported scheme '{}'", other),
        )),
    }
}

// ============================================================================
// Download Progress
// ============================================================================

/// A progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadProgress {
    /// Percentage of a download whose size is known (multiple of 5).
    Percent(u8),
    /// Megabytes received for a download of unknown size.
    Megabytes(u64),
}

/// Decides when a progress report is due.
#[derive(Debug)]
pub struct ProgressThrottle {
    total_bytes: Option<u64>,
    received: u64,
    last_threshold: u64,
}

impl ProgressThrottle {
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            total_bytes: total_bytes.filter(|t| *t > 0),
            received: 0,
            last_threshold: 0,
        }
    }

    /// Records `n` more bytes and returns a report when a new threshold is crossed.
    pub fn advance(&mut self, n: u64) -> Option<DownloadProgress> {
        if n == 0 {
            return None;
        }
        self.received += n;

        match self.total_bytes {
            Some(total) => {
                let percent = (self.received.saturating_mul(100) / total).min(100);
                let threshold = percent / PERCENT_STEP * PERCENT_STEP;
                if threshold > self.last_threshold {
                    self.last_threshold = threshold;
                    Some(DownloadProgress::Percent(threshold as u8))
                } else {
                    None
                }
            }
            None => {
                let threshold = self.received / UNKNOWN_SIZE_QUANTUM;
                if threshold > self.last_threshold {
                    self.last_threshold = threshold;
                    Some(DownloadProgress::Megabytes(threshold))
                } else {
                    None
                }
            }
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

// ============================================================================
// Download Function
// ============================================================================

/// Downloads `url` into `dest`, reporting progress through `progress_cb`.
///
/// Returns the number of bytes written. Non-success statuses, transport
/// errors and write errors all fail with [`LaunchError::Download`] or
/// [`LaunchError::Io`].
pub async fn download_file<F>(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress_cb: F,
) -> Result<u64>
where
    F: Fn(DownloadProgress),
{
    info!("Downloading {} to {}", url, dest.display());
    validate_url(url)?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LaunchError::io(format!("Failed to create {}", parent.display()), e))?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LaunchError::download(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LaunchError::download(
            url,
            format!("server responded {}", status),
        ));
    }

    let total_bytes = response.content_length();
    debug!("Content-Length: {:?}", total_bytes);

    let mut file = File::create(dest)
        .await
        .map_err(|e| LaunchError::io(format!("Failed to create {}", dest.display()), e))?;

    let mut throttle = ProgressThrottle::new(total_bytes);
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| LaunchError::download(url, e))?;

        file.write_all(&chunk)
            .await
            .map_err(|e| LaunchError::io(format!("Failed to write {}", dest.display()), e))?;

        if let Some(progress) = throttle.advance(chunk.len() as u64) {
            progress_cb(progress);
        }
    }

    file.flush()
        .await
        .map_err(|e| LaunchError::io(format!("Failed to flush {}", dest.display()), e))?;

    info!(
        "Download complete: {} bytes written to {}",
        throttle.received(),
        dest.display()
    );
    Ok(throttle.received())
}

/// Progress callback that logs reports for a named download.
pub fn log_progress(label: &str) -> impl Fn(DownloadProgress) + '_ {
    move |progress| match progress {
        DownloadProgress::Percent(p) => info!("Download [{}] -> {} %", label, p),
        DownloadProgress::Megabytes(mb) => info!("Download [{}] -> {} Mo", label, mb),
    }
}

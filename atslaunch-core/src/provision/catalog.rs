//! Remote tool catalogs and release directory listings.
//!
//! Two remote sources are understood here:
//!
//! - the tools feed, a plain-text body with one `name,version,folderName,archiveURL`
//!   record per line, which says whether a tool exists remotely and under
//!   which folder name;
//! - release directory listings (HTML), scanned for `.zip`/`.tgz` links whose
//!   file stems are semantic versions.
//!
//! Fetching the feed never fails past this boundary: transport errors are
//! logged and yield an empty mapping, which callers treat as unusable.

use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::OnceLock;

use regex::Regex;
use semver::Version;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{LaunchError, Result};

use super::types::ToolRequirement;

// ============================================================================
// Tools Feed
// ============================================================================

/// One row of the remote tools feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRecord {
    pub name: String,
    pub version: String,
    pub folder_name: String,
    pub archive_url: String,
}

impl CatalogRecord {
    /// True when the record names a tool, an archive URL and a folder that is
    /// a single plain path component under the tools root.
    fn is_usable(&self) -> bool {
        let mut components = Path::new(&self.folder_name).components();
        let plain_folder = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );

        plain_folder && !self.name.is_empty() && !self.archive_url.is_empty()
    }
}

/// Tool name to catalog record.
pub type CatalogMap = HashMap<String, CatalogRecord>;

/// Parses a tools feed body.
///
/// Lines with fewer than four fields are skipped, as are lines with an empty
/// name or URL and lines whose folder is not a single plain path component.
/// When a name appears twice, the later line wins.
pub fn parse_catalog_body(body: &str) -> CatalogMap {
    let mut records = CatalogMap::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 4 {
            debug!(line, "Skipping incomplete catalog line");
            continue;
        }

        let record = CatalogRecord {
            name: fields[0].to_string(),
            version: fields[1].to_string(),
            folder_name: fields[2].to_string(),
            archive_url: fields[3].to_string(),
        };
        if !record.is_usable() {
            debug!(line, "Skipping catalog line with an unusable name, folder or URL");
            continue;
        }
        records.insert(record.name.clone(), record);
    }

    records
}

async fn try_fetch_catalog(client: &reqwest::Client, url: &str) -> Result<CatalogMap> {
    let unreachable = |reason: String| LaunchError::CatalogUnreachable {
        url: url.to_string(),
        reason,
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| unreachable(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(unreachable(format!("server responded {}", status)));
    }

    let body = response.text().await.map_err(|e| unreachable(e.to_string()))?;
    Ok(parse_catalog_body(&body))
}

/// Fetches and parses a tools feed, returning an empty mapping on any failure.
pub async fn fetch_catalog(client: &reqwest::Client, url: &str) -> CatalogMap {
    info!("Tools catalog -> {}", url);
    match try_fetch_catalog(client, url).await {
        Ok(records) => {
            debug!(url, count = records.len(), "Catalog fetched");
            records
        }
        Err(e) => {
            warn!("{}", e);
            CatalogMap::new()
        }
    }
}

/// Names of the requirements needing resolution that have no catalog record.
pub fn missing_tools<'a>(
    records: &CatalogMap,
    requirements: &'a [ToolRequirement],
) -> Vec<&'a str> {
    requirements
        .iter()
        .filter(|r| r.requires_resolution() && !records.contains_key(r.name()))
        .map(|r| r.name())
        .collect()
}

/// Adds fallback records for names the primary mapping lacks.
pub fn merge_fallback(primary: &mut CatalogMap, fallback: CatalogMap) {
    for (name, record) in fallback {
        primary.entry(name).or_insert(record);
    }
}

// ============================================================================
// Directory Listings
// ============================================================================

/// A versioned archive link found in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: Version,
    pub url: String,
}

fn archive_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<a href\s?=\s?"([^"]+\.(zip|tgz))">"#).expect("archive link pattern is valid")
    })
}

/// Parses a version token, padding missing minor and patch components.
///
/// `3.2` reads as `3.2.0`; anything that still fails to parse is an error.
pub fn parse_version_token(token: &str) -> Result<Version> {
    let token = token.trim().trim_start_matches('v');
    if let Ok(version) = Version::parse(token) {
        return Ok(version);
    }

    let (core, suffix) = match token.find(|c: char| c == '-' || c == '+') {
        Some(pos) => token.split_at(pos),
        None => (token, ""),
    };
    let parts: Vec<&str> = core.split('.').collect();
    let padded = match parts.len() {
        1 => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => return Err(LaunchError::MalformedVersion(token.to_string())),
    };

    Version::parse(&padded).map_err(|_| LaunchError::MalformedVersion(token.to_string()))
}

fn link_stem(href: &str) -> &str {
    let file = href.rsplit('/').next().unwrap_or(href);
    file.strip_suffix(".zip")
        .or_else(|| file.strip_suffix(".tgz"))
        .unwrap_or(file)
}

/// Extracts every archive link of a listing, newest version first.
///
/// Links are resolved against `listing_url`. Equal versions keep their
/// listing order. A link whose stem is not a version is an error.
pub fn parse_directory_listing(listing_url: &str, html: &str) -> Result<Vec<VersionEntry>> {
    let base = directory_base(listing_url)?;

    let mut entries = Vec::new();
    for captures in archive_link_pattern().captures_iter(html) {
        let href = &captures[1];
        let version = parse_version_token(link_stem(href))?;
        let url = base
            .join(href)
            .map_err(|e| LaunchError::download(listing_url, e))?;
        entries.push(VersionEntry {
            version,
            url: url.to_string(),
        });
    }

    entries.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(entries)
}

/// Picks the highest version out of a set of entries.
pub fn latest_version(entries: &[VersionEntry]) -> Option<&VersionEntry> {
    entries.iter().fold(None, |best, entry| match best {
        Some(current) if current.version >= entry.version => Some(current),
        _ => Some(entry),
    })
}

fn directory_base(listing_url: &str) -> Result<Url> {
    let with_slash = if listing_url.ends_with('/') {
        listing_url.to_string()
    } else {
        format!("{}/", listing_url)
    };
    Url::parse(&with_slash).map_err(|e| LaunchError::download(listing_url, e))
}

/// Downloads a listing and returns its newest archive link, if any.
pub async fn fetch_latest_archive(
    client: &reqwest::Client,
    listing_url: &str,
) -> Result<Option<VersionEntry>> {
    let response = client
        .get(listing_url)
        .send()
        .await
        .map_err(|e| LaunchError::download(listing_url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LaunchError::download(
            listing_url,
            format!("server responded {}", status),
        ));
    }

    let html = response
        .text()
        .await
        .map_err(|e| LaunchError::download(listing_url, e))?;

    let entries = parse_directory_listing(listing_url, &html)?;
    Ok(latest_version(&entries).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::types::ToolRole;

    const FEED: &str = "ats,3.1.0,ats-3.1.0,https://tools.example.com/ats-3.1.0.tgz\n\
                        jasper,6.20.0,jasper-6.20.0,https://tools.example.com/jasper-6.20.0.tgz\n\
                        jdk,21.0.2,jdk-21.0.2,https://tools.example.com/jdk-21.0.2.tgz\n";

    #[test]
    fn test_parse_catalog_body() {
        let records = parse_catalog_body(FEED);
        assert_eq!(records.len(), 3);

        let jdk = &records["jdk"];
        assert_eq!(jdk.version, "21.0.2");
        assert_eq!(jdk.folder_name, "jdk-21.0.2");
        assert_eq!(jdk.archive_url, "https://tools.example.com/jdk-21.0.2.tgz");
    }

    #[test]
    fn test_parse_catalog_skips_short_and_blank_lines() {
        let records = parse_catalog_body("\nats,3.1.0\n\njdk,21,jdk-21,https://x/jdk.tgz\r\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records["jdk"].archive_url, "https://x/jdk.tgz");
    }

    #[test]
    fn test_parse_catalog_rejects_unsafe_folder_names() {
        let body = "jdk,21,,https://x/jdk.tgz\n\
                    ats,3.1.0,../ats-3.1.0,https://x/ats.tgz\n\
                    jasper,6.20,reports/jasper-6.20,https://x/jasper.tgz\n\
                    node,20,.,https://x/node.tgz\n\
                    ,1.0,nameless-1.0,https://x/nameless.tgz\n\
                    mvn,3.9,mvn-3.9,\n\
                    git,2.44,git-2.44,https://x/git.tgz\n";

        let records = parse_catalog_body(body);

        assert_eq!(records.len(), 1);
        assert_eq!(records["git"].folder_name, "git-2.44");
    }

    #[test]
    fn test_missing_tools_ignores_pinned() {
        let records = parse_catalog_body("jdk,21,jdk-21,https://x/jdk.tgz");
        let reqs = vec![
            ToolRequirement::new("ats", ToolRole::CoreLibrary).pinned("/cache/3.1.0"),
            ToolRequirement::new("jasper", ToolRole::ReportGenerator),
            ToolRequirement::new("jdk", ToolRole::Runtime),
        ];
        assert_eq!(missing_tools(&records, &reqs), vec!["jasper"]);
    }

    #[test]
    fn test_merge_fallback_primary_wins() {
        let mut primary = parse_catalog_body("jdk,21,jdk-21,https://mirror/jdk.tgz");
        let fallback = parse_catalog_body(
            "jdk,17,jdk-17,https://main/jdk.tgz\nats,3.1.0,ats-3.1.0,https://main/ats.tgz",
        );
        merge_fallback(&mut primary, fallback);

        assert_eq!(primary.len(), 2);
        assert_eq!(primary["jdk"].folder_name, "jdk-21");
        assert_eq!(primary["ats"].archive_url, "https://main/ats.tgz");
    }

    #[test]
    fn test_parse_directory_listing_sorted_descending() {
        let html = r#"<html><body>
            <a href="1.9.0.tgz">1.9.0.tgz</a>
            <a href="1.10.2.tgz">1.10.2.tgz</a>
            <a href="1.2.0.tgz">1.2.0.tgz</a>
            <a href="notes.txt">notes.txt</a>
        </body></html>"#;
        let entries =
            parse_directory_listing("https://releases.example.com/ats-drivers/linux/system", html)
                .unwrap();

        let versions: Vec<String> = entries.iter().map(|e| e.version.to_string()).collect();
        assert_eq!(versions, vec!["1.10.2", "1.9.0", "1.2.0"]);
        assert_eq!(
            entries[0].url,
            "https://releases.example.com/ats-drivers/linux/system/1.10.2.tgz"
        );
    }

    #[test]
    fn test_parse_directory_listing_malformed_version_is_error() {
        let html = r#"<a href="1.2.0.zip">ok</a><a href="latest-build.zip">bad</a>"#;
        let err = parse_directory_listing("https://example.com/drivers", html).unwrap_err();
        assert!(matches!(err, LaunchError::MalformedVersion(token) if token == "latest-build"));
    }

    #[test]
    fn test_parse_directory_listing_absolute_href() {
        let html = r#"<a href="/archive/drivers/2.0.1.zip">2.0.1</a>"#;
        let entries = parse_directory_listing("https://example.com/drivers/windows", html).unwrap();
        assert_eq!(entries[0].url, "https://example.com/archive/drivers/2.0.1.zip");
    }

    #[test]
    fn test_parse_version_token_pads_components() {
        assert_eq!(parse_version_token("3.2").unwrap(), Version::new(3, 2, 0));
        assert_eq!(parse_version_token("7").unwrap(), Version::new(7, 0, 0));
        assert_eq!(parse_version_token("v1.4.6").unwrap(), Version::new(1, 4, 6));
        assert!(parse_version_token("1.2.3.4").is_err());
        assert!(parse_version_token("abc").is_err());
    }

    #[test]
    fn test_latest_version_is_order_independent() {
        let a = VersionEntry {
            version: Version::new(2, 0, 10),
            url: "a".into(),
        };
        let b = VersionEntry {
            version: Version::new(2, 0, 9),
            url: "b".into(),
        };
        let forward = [a.clone(), b.clone()];
        let backward = [b, a];

        assert_eq!(latest_version(&forward).map(|e| e.url.as_str()), Some("a"));
        assert_eq!(latest_version(&backward).map(|e| e.url.as_str()), Some("a"));
        assert!(latest_version(&[]).is_none());
    }

    #[test]
    fn test_latest_version_tie_keeps_first_listed() {
        let first = VersionEntry {
            version: Version::new(1, 0, 0),
            url: "first".into(),
        };
        let second = VersionEntry {
            version: Version::new(1, 0, 0),
            url: "second".into(),
        };
        assert_eq!(
            latest_version(&[first, second]).map(|e| e.url.as_str()),
            Some("first")
        );
    }
}

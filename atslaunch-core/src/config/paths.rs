//! Default locations and URLs.
//!
//! Tools and releases are stored per user:
//!
//! - Linux/macOS: `~/ats/tools/` and `~/ats/cache/`
//! - Windows: `%APPDATA%\ats\tools\` and `%APPDATA%\ats\cache\`

use std::path::PathBuf;

use crate::provision::Platform;

/// Subdirectory name under the user's base folder.
const ATS_DIR: &str = "ats";

/// File every project folder must contain.
pub const PROJECT_DESCRIPTOR: &str = ".atsProjectProperties";

const DEFAULT_TOOLS_SERVER: &str = "https://actiontestscript.com/tools";

/// Releases server holding core library versions and system drivers.
pub const DEFAULT_RELEASES_URL: &str = "https://actiontestscript.com/releases";

const MIRROR_CATALOG_PATH: &str = "userContent/tools/versions.csv";

// ============================================================================
// Path Resolution
// ============================================================================

/// Returns the per-user `ats` folder, if a home folder is known.
///
/// e.g., `/home/me/ats` on Linux, `C:\Users\me\AppData\Roaming\ats` on Windows
pub fn ats_base_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    let base = dirs::data_dir();

    #[cfg(not(windows))]
    let base = dirs::home_dir();

    base.map(|b| b.join(ATS_DIR))
}

/// Returns the default tools root: `{base}/ats/tools/`
pub fn default_tools_root() -> Option<PathBuf> {
    ats_base_dir().map(|b| b.join("tools"))
}

/// Returns the default release cache root: `{base}/ats/cache/`
pub fn default_cache_root() -> Option<PathBuf> {
    ats_base_dir().map(|b| b.join("cache"))
}

// ============================================================================
// URLs
// ============================================================================

/// Tools feed published for `platform`.
pub fn default_catalog_url(platform: Platform) -> String {
    format!(
        "{}/{}/versions.php",
        DEFAULT_TOOLS_SERVER,
        platform.catalog_os()
    )
}

/// Tools feed mirrored on a CI server.
pub fn mirror_catalog_url(server_url: &str) -> String {
    format!("{}/{}", server_url.trim_end_matches('/'), MIRROR_CATALOG_PATH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_url() {
        assert_eq!(
            default_catalog_url(Platform::Windows),
            "https://actiontestscript.com/tools/windows/versions.php"
        );
        assert_eq!(
            default_catalog_url(Platform::Macos),
            "https://actiontestscript.com/tools/linux/versions.php"
        );
    }

    #[test]
    fn test_mirror_catalog_url() {
        assert_eq!(
            mirror_catalog_url("http://ci.local:8080/"),
            "http://ci.local:8080/userContent/tools/versions.csv"
        );
        assert_eq!(
            mirror_catalog_url("http://ci.local:8080"),
            "http://ci.local:8080/userContent/tools/versions.csv"
        );
    }

    #[test]
    fn test_default_roots_share_base() {
        if let (Some(tools), Some(cache)) = (default_tools_root(), default_cache_root()) {
            assert!(tools.ends_with("ats/tools"));
            assert!(cache.ends_with("ats/cache"));
            assert_eq!(tools.parent(), cache.parent());
        }
    }
}

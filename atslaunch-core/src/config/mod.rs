//! Run configuration.
//!
//! A [`RunConfiguration`] is built once from command-line flags and the
//! environment, validated, then passed by reference to every component.

mod paths;
mod run;

pub use paths::{
    ats_base_dir, default_cache_root, default_catalog_url, default_tools_root,
    mirror_catalog_url, DEFAULT_RELEASES_URL, PROJECT_DESCRIPTOR,
};
pub use run::{parse_flag, parse_report_level, CoreVersion, RunConfiguration};

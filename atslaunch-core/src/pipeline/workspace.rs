//! Project workspace preparation around the pipeline stages.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::RunConfiguration;
use crate::error::{LaunchError, Result};
use crate::provision::cache::absolute;

/// Compiler file-list manifest written into the generated sources folder.
pub const CLASS_LIST_FILE: &str = "JavaClasses.list";

const SUITES_FOLDER: &str = "src/exec";
const SUITE_EXTENSION: &str = ".xml";

/// Folders of a project the stages read and write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub project_dir: PathBuf,
    pub target_dir: PathBuf,
    pub generated_dir: PathBuf,
    pub classes_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(config: &RunConfiguration) -> Self {
        let project_dir = absolute(&config.project_dir);
        let target_dir = project_dir.join("target");
        let output_dir = absolute(&config.output_path());

        Self {
            generated_dir: target_dir.join("generated"),
            classes_dir: target_dir.join("classes"),
            target_dir,
            output_dir,
            project_dir,
        }
    }

    pub fn assets_source(&self) -> PathBuf {
        self.project_dir.join("src").join("assets")
    }
}

// ============================================================================
// Cleanup
// ============================================================================

fn remove_dir_if_present(path: &Path) -> Result<()> {
    if path.exists() {
        debug!("Removing {}", path.display());
        fs::remove_dir_all(path)
            .map_err(|e| LaunchError::io(format!("Failed to remove {}", path.display()), e))?;
    }
    Ok(())
}

/// Deletes the previous run's build and report folders, then recreates the
/// generated sources folder.
pub fn reset_build_folders(layout: &ProjectLayout) -> Result<()> {
    remove_dir_if_present(&layout.target_dir)?;
    remove_dir_if_present(&layout.output_dir)?;
    remove_dir_if_present(&layout.project_dir.join("test-output"))?;

    fs::create_dir_all(&layout.generated_dir).map_err(|e| {
        LaunchError::io(
            format!("Failed to create {}", layout.generated_dir.display()),
            e,
        )
    })
}

/// Deletes every downloaded tool and cached release.
pub fn remove_installed_components(config: &RunConfiguration) -> Result<()> {
    info!(
        "Cleaning {} and {}",
        config.tools_root.display(),
        config.cache_root.display()
    );
    remove_dir_if_present(&config.cache_root)?;
    remove_dir_if_present(&config.tools_root)
}

// ============================================================================
// Generated Sources
// ============================================================================

fn collect_java_files(dir: &Path, base: &Path, files: &mut Vec<String>) -> Result<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| LaunchError::io(format!("Failed to list {}", dir.display()), e))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| LaunchError::io(format!("Failed to list {}", dir.display()), e))?;
        let path = entry.path();

        if path.is_dir() {
            collect_java_files(&path, base, files)?;
        } else if path.extension().is_some_and(|ext| ext == "java") {
            if let Ok(relative) = path.strip_prefix(base) {
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                files.push(parts.join("/"));
            }
        }
    }

    Ok(())
}

/// Lists the generated `.java` files and writes them, one per line, into the
/// compiler's file-list manifest. Returns the number of files listed.
pub fn write_class_list(generated_dir: &Path) -> Result<usize> {
    let mut files = Vec::new();
    collect_java_files(generated_dir, generated_dir, &mut files)?;
    files.sort();

    let manifest = generated_dir.join(CLASS_LIST_FILE);
    fs::write(&manifest, files.join("\n"))
        .map_err(|e| LaunchError::io(format!("Failed to write {}", manifest.display()), e))?;

    debug!("{} generated sources listed in {}", files.len(), manifest.display());
    Ok(files.len())
}

// ============================================================================
// Assets
// ============================================================================

fn copy_dir_recursive(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)
        .map_err(|e| LaunchError::io(format!("Failed to create {}", to.display()), e))?;

    let entries = fs::read_dir(from)
        .map_err(|e| LaunchError::io(format!("Failed to list {}", from.display()), e))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| LaunchError::io(format!("Failed to list {}", from.display()), e))?;
        let source = entry.path();
        let dest = to.join(entry.file_name());

        if source.is_dir() {
            copy_dir_recursive(&source, &dest)?;
        } else {
            fs::copy(&source, &dest).map_err(|e| {
                LaunchError::io(format!("Failed to copy {}", source.display()), e)
            })?;
        }
    }

    Ok(())
}

/// Copies the project's assets next to the compiled classes.
pub fn copy_assets(layout: &ProjectLayout) -> Result<()> {
    let source = layout.assets_source();
    let dest = layout.classes_dir.join("assets");

    if !source.is_dir() {
        debug!("No assets folder at {}", source.display());
        return fs::create_dir_all(&dest)
            .map_err(|e| LaunchError::io(format!("Failed to create {}", dest.display()), e));
    }

    copy_dir_recursive(&source, &dest)
}

// ============================================================================
// Suites
// ============================================================================

/// Turns a suite name into the descriptor path the test runner expects.
///
/// `regression` becomes `src/exec/regression.xml`; quotes are dropped.
pub fn normalize_suite(name: &str) -> String {
    let mut path = name.replace('"', "").trim().to_string();

    if !path.starts_with(SUITES_FOLDER) {
        path = format!("{}/{}", SUITES_FOLDER, path);
    }
    if !path.ends_with(SUITE_EXTENSION) {
        path.push_str(SUITE_EXTENSION);
    }

    path
}

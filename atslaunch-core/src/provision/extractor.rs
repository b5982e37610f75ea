//! Archive extraction for downloaded tool bundles.
//!
//! Every entry's destination is normalized and must stay inside the
//! destination directory, both as written in the archive and once links
//! already on disk are followed; the first entry that escapes aborts the whole
//! extraction with [`LaunchError::ArchiveIntegrity`] before anything is
//! written for it. Output already written for earlier entries is left in
//! place. The archive file is removed once extraction succeeds.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{LaunchError, Result};

use super::types::ArchiveFormat;

// ============================================================================
// Archive Extraction
// ============================================================================

/// Extracts an archive into `dest_dir`, then deletes the archive.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path, format: ArchiveFormat) -> Result<()> {
    info!(
        "Extracting {:?} archive {} to {}",
        format,
        archive_path.display(),
        dest_dir.display()
    );

    fs::create_dir_all(dest_dir)
        .map_err(|e| LaunchError::io(format!("Failed to create {}", dest_dir.display()), e))?;
    let root = dest_dir
        .canonicalize()
        .map_err(|e| LaunchError::io(format!("Failed to resolve {}", dest_dir.display()), e))?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir, &root)?,
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir, &root)?,
    }

    if let Err(e) = fs::remove_file(archive_path) {
        warn!("Failed to remove archive {}: {}", archive_path.display(), e);
    }
    Ok(())
}

// ============================================================================
// Path Safety
// ============================================================================

/// Lexically normalizes a path, resolving `.` and `..` without touching the
/// filesystem. Returns `None` when `..` climbs above the path's start.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

fn escape_error(archive: &Path, entry_name: &Path) -> LaunchError {
    LaunchError::archive(
        archive,
        format!("entry '{}' escapes the destination", entry_name.display()),
    )
}

/// Resolves `entry_name` under `dest_dir`, failing if it escapes.
fn resolve_entry(archive: &Path, dest_dir: &Path, entry_name: &Path) -> Result<PathBuf> {
    let escapes = || escape_error(archive, entry_name);

    if entry_name.has_root() || entry_name.is_absolute() {
        return Err(escapes());
    }

    let root = normalize(dest_dir).ok_or_else(escapes)?;
    let resolved = normalize(&dest_dir.join(entry_name)).ok_or_else(escapes)?;
    if !resolved.starts_with(&root) {
        return Err(escapes());
    }
    Ok(resolved)
}

/// Resolves `path` against what is already on disk and fails unless it stays
/// under the canonical `root`.
///
/// Links written by earlier entries are followed through the deepest existing
/// ancestor; the components below it do not exist yet and are appended as is.
fn confine(archive: &Path, root: &Path, path: &Path, entry_name: &Path) -> Result<PathBuf> {
    let escapes = || escape_error(archive, entry_name);

    let mut existing = path;
    let mut missing = Vec::new();
    while fs::symlink_metadata(existing).is_err() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return Err(escapes()),
        }
    }

    let mut physical = existing.canonicalize().map_err(|_| escapes())?;
    physical.extend(missing.iter().rev());
    let physical = normalize(&physical).ok_or_else(escapes)?;

    if !physical.starts_with(root) {
        debug!(
            "Entry {} resolves to {} outside {}",
            entry_name.display(),
            physical.display(),
            root.display()
        );
        return Err(escapes());
    }
    Ok(physical)
}

/// Like [`confine`], but leaves the last component unresolved so an existing
/// link there is replaced rather than followed.
fn confine_leaf(archive: &Path, root: &Path, path: &Path, entry_name: &Path) -> Result<PathBuf> {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => Ok(confine(archive, root, parent, entry_name)?.join(name)),
        _ => Err(escape_error(archive, entry_name)),
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| LaunchError::io(format!("Failed to create {}", parent.display()), e))?;
    }
    Ok(())
}

/// Removes a file or link left at `path` so the next write replaces it.
fn remove_leaf(path: &Path) {
    match fs::symlink_metadata(path) {
        Ok(metadata) if !metadata.is_dir() => {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to replace {}: {}", path.display(), e);
            }
        }
        _ => {}
    }
}

fn write_entry<R: Read>(reader: &mut R, dest_path: &Path) -> Result<()> {
    create_parent(dest_path)?;
    remove_leaf(dest_path);
    let mut outfile = File::create(dest_path)
        .map_err(|e| LaunchError::io(format!("Failed to create {}", dest_path.display()), e))?;
    io::copy(reader, &mut outfile)
        .map_err(|e| LaunchError::io(format!("Failed to write {}", dest_path.display()), e))?;
    Ok(())
}

fn create_dir(dest_path: &Path) -> Result<()> {
    fs::create_dir_all(dest_path)
        .map_err(|e| LaunchError::io(format!("Failed to create {}", dest_path.display()), e))
}

// ============================================================================
// ZIP Extraction
// ============================================================================

fn extract_zip(archive_path: &Path, dest_dir: &Path, root: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .map_err(|e| LaunchError::io(format!("Failed to open {}", archive_path.display()), e))?;

    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| LaunchError::archive(archive_path, e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| LaunchError::archive(archive_path, e.to_string()))?;

        let entry_name = PathBuf::from(entry.name());
        let dest_path = resolve_entry(archive_path, dest_dir, &entry_name)?;

        if entry.is_dir() || entry.name().ends_with('/') {
            create_dir(&confine(archive_path, root, &dest_path, &entry_name)?)?;
            continue;
        }

        let dest_path = confine_leaf(archive_path, root, &dest_path, &entry_name)?;
        write_entry(&mut entry, &dest_path)?;

        #[cfg(unix)]
        restore_unix_mode(&dest_path, entry.unix_mode())?;
    }

    debug!("ZIP extraction complete");
    Ok(())
}

// ============================================================================
// TAR.GZ Extraction
// ============================================================================

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path, root: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .map_err(|e| LaunchError::io(format!("Failed to open {}", archive_path.display()), e))?;

    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    let mut archive = tar::Archive::new(decoder);
    let corrupt = |e: io::Error| LaunchError::archive(archive_path, e.to_string());

    for entry_result in archive.entries().map_err(corrupt)? {
        let mut entry = entry_result.map_err(corrupt)?;
        let entry_type = entry.header().entry_type();
        let entry_name = entry.path().map_err(corrupt)?.into_owned();
        let dest_path = resolve_entry(archive_path, dest_dir, &entry_name)?;

        if entry_type.is_dir() {
            create_dir(&confine(archive_path, root, &dest_path, &entry_name)?)?;
        } else if entry_type.is_file() {
            let dest_path = confine_leaf(archive_path, root, &dest_path, &entry_name)?;
            write_entry(&mut entry, &dest_path)?;

            #[cfg(unix)]
            restore_unix_mode(&dest_path, entry.header().mode().ok())?;
        } else if entry_type.is_symlink() {
            let target = entry.link_name().map_err(corrupt)?.ok_or_else(|| {
                LaunchError::archive(archive_path, "symlink entry without a target")
            })?;
            let link_dir = entry_name.parent().unwrap_or(Path::new(""));
            resolve_entry(archive_path, dest_dir, &link_dir.join(&target))?;

            let link = confine_leaf(archive_path, root, &dest_path, &entry_name)?;
            create_parent(&link)?;
            if let Some(parent) = link.parent() {
                confine(archive_path, root, &parent.join(&target), &entry_name)?;
            }
            create_symlink(&target, &link)?;
        } else if entry_type.is_hard_link() {
            let target = entry.link_name().map_err(corrupt)?.ok_or_else(|| {
                LaunchError::archive(archive_path, "hard link entry without a target")
            })?;
            let source = resolve_entry(archive_path, dest_dir, &target)?;
            let source = confine(archive_path, root, &source, &entry_name)?;
            let link = confine_leaf(archive_path, root, &dest_path, &entry_name)?;

            create_parent(&link)?;
            remove_leaf(&link);
            fs::copy(&source, &link).map_err(|e| {
                LaunchError::io(format!("Failed to link {}", link.display()), e)
            })?;
        } else {
            debug!("Skipping tar entry {:?} of type {:?}", entry_name, entry_type);
        }
    }

    debug!("TAR extraction complete");
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    remove_leaf(link);
    std::os::unix::fs::symlink(target, link)
        .map_err(|e| LaunchError::io(format!("Failed to create link {}", link.display()), e))
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    warn!(
        "Skipping symlink {} -> {} on this platform",
        link.display(),
        target.display()
    );
    Ok(())
}

// ============================================================================
// Unix Permissions
// ============================================================================

#[cfg(unix)]
fn restore_unix_mode(path: &Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(mode) = mode {
        let mode = if mode & 0o111 != 0 { mode | 0o755 } else { mode };
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777)).map_err(|e| {
            LaunchError::io(format!("Failed to set permissions on {}", path.display()), e)
        })?;
    }

    Ok(())
}

/// Grants read, write and execute to owner, group and others (Unix only).
///
/// Archive formats do not reliably carry permissions across platforms, so
/// driver executables get them back explicitly. On Windows this is a no-op.
#[allow(unused_variables)]
pub fn grant_full_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, fs::Permissions::from_mode(0o777)).map_err(|e| {
            LaunchError::io(format!("Failed to set permissions on {}", path.display()), e)
        })?;
        debug!("Granted full permissions on {}", path.display());
    }

    Ok(())
}

/// Adds execute bits to every regular file in `tool_dir/bin` (Unix only).
#[allow(unused_variables)]
pub fn make_bin_executable(tool_dir: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = tool_dir.join("bin");
        let Ok(entries) = fs::read_dir(&bin_dir) else {
            return Ok(());
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let mut permissions = metadata.permissions();
            permissions.set_mode(permissions.mode() | 0o755);
            fs::set_permissions(&path, permissions).map_err(|e| {
                LaunchError::io(
                    format!("Failed to set executable permission on {}", path.display()),
                    e,
                )
            })?;
        }
        debug!("Restored executable bits under {}", bin_dir.display());
    }

    Ok(())
}

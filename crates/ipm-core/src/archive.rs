//! `.tgz` extraction with the "strip first path component" convention.

use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::warn;

use crate::error::{IpmError, Result};

/// Extract `tarball_path` into `dest_dir`, dropping the archive's single
/// top-level wrapper directory (`package/lib/index.js` -> `lib/index.js`).
///
/// Nothing is written outside `dest_dir`: entries with `..` in their path,
/// links pointing at absolute paths or containing `..`, and entries whose
/// parent resolves outside the destination are skipped with a warning.
pub fn extract_tarball(tarball_path: &Path, dest_dir: &Path) -> Result<()> {
    let archive_err = |source| IpmError::Archive {
        path: tarball_path.to_path_buf(),
        source,
    };

    let f = File::open(tarball_path).map_err(|e| IpmError::io("open archive", tarball_path, e))?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(f)));

    std::fs::create_dir_all(dest_dir).map_err(|e| IpmError::io("create directory", dest_dir, e))?;
    let root = dest_dir
        .canonicalize()
        .map_err(|e| IpmError::io("resolve directory", dest_dir, e))?;

    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        let path = entry.path().map_err(archive_err)?.into_owned();
        let Some(rel) = strip_first_component(&path) else {
            continue;
        };
        let out_path = root.join(&rel);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            if !stays_inside(&root, &out_path)? {
                warn!("Skipping archive entry outside destination: {}", path.display());
                continue;
            }
            std::fs::create_dir_all(&out_path).map_err(|e| IpmError::io("create directory", &out_path, e))?;
            continue;
        }
        if !(entry_type.is_file() || entry_type.is_symlink() || entry_type.is_hard_link()) {
            // pax headers and other metadata entries carry no content
            continue;
        }

        let link_target = if entry_type.is_file() {
            None
        } else {
            match entry.link_name().map_err(archive_err)? {
                Some(target) if is_relative_inward(&target) => Some(target.into_owned()),
                _ => {
                    warn!("Skipping archive link that points outside: {}", path.display());
                    continue;
                }
            }
        };

        if let Some(parent) = out_path.parent() {
            if !stays_inside(&root, parent)? {
                warn!("Skipping archive entry outside destination: {}", path.display());
                continue;
            }
            std::fs::create_dir_all(parent).map_err(|e| IpmError::io("create directory", parent, e))?;
        }

        match link_target {
            // hard link targets name another entry of the same archive
            Some(target) if entry_type.is_hard_link() => {
                let Some(source_rel) = strip_first_component(&target) else {
                    continue;
                };
                let source = root.join(source_rel);
                if !stays_inside(&root, &source)? {
                    warn!("Skipping archive link that points outside: {}", path.display());
                    continue;
                }
                let _ = std::fs::remove_file(&out_path);
                if let Err(e) = std::fs::hard_link(&source, &out_path) {
                    warn!("Skipping archive link {}: {}", path.display(), e);
                }
            }
            _ => {
                entry.unpack(&out_path).map_err(archive_err)?;
            }
        }
    }
    Ok(())
}

/// Drop the first component; reject anything that could escape the target.
fn strip_first_component(path: &Path) -> Option<PathBuf> {
    let mut rel = PathBuf::new();
    for component in path.components().skip(1) {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if rel.as_os_str().is_empty() {
        None
    } else {
        Some(rel)
    }
}

/// Relative path made only of normal components.
fn is_relative_inward(target: &Path) -> bool {
    !target.as_os_str().is_empty()
        && target
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Resolve the deepest existing ancestor of `path` (following links) and check it is under `root`.
fn stays_inside(root: &Path, path: &Path) -> Result<bool> {
    let mut existing = path;
    loop {
        if std::fs::symlink_metadata(existing).is_ok() {
            break;
        }
        match existing.parent() {
            Some(parent) => existing = parent,
            None => return Ok(false),
        }
    }
    match existing.canonicalize() {
        Ok(real) => Ok(real.starts_with(root)),
        // dangling link
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(IpmError::io("resolve path", existing, e)),
    }
}

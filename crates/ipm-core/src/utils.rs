use std::fs;
use std::io;
use std::path::Path;

use crate::error::{IpmError, Result};
use crate::types::PackageMetadata;

pub const MANIFEST_FILE: &str = "package.json";

/// Strip a `-<suffix>` (e.g. a commit SHA) from a host version: `5.9.0-abc123` -> `5.9.0`.
pub fn normalize_version(version: &str) -> String {
    match version.find('-') {
        Some(idx) => version[..idx].to_string(),
        None => version.to_string(),
    }
}

/// A name usable as a single directory under `packages/` or `node_modules/`:
/// `name` or `@scope/name`, with no empty, `.` or `..` parts and no separators
/// beyond the one after the scope.
pub fn is_valid_package_name(name: &str) -> bool {
    let plain = |part: &str| {
        !part.is_empty()
            && part != "."
            && part != ".."
            && !part.contains(['/', '\\', ':', '\0'])
    };
    match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, pkg)) => plain(scope) && plain(pkg),
            None => false,
        },
        None => plain(name),
    }
}

/// Create `dir` and its parents. An existing directory is success.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| IpmError::io("create directory", dir, e))
}

pub fn path_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Recursively delete `dir` if it exists.
pub fn remove_dir_if_exists(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(IpmError::io("remove directory", dir, e)),
    }
}

/// Best-effort single file removal; failures are ignored.
pub fn remove_file_quietly(path: &Path) {
    let _ = fs::remove_file(path);
}

/// Read `<dir>/package.json`. A missing manifest is `Ok(None)`;
/// any other read or parse failure is an error.
pub fn read_manifest(dir: &Path) -> Result<Option<PackageMetadata>> {
    let path = dir.join(MANIFEST_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(IpmError::io("read manifest", &path, e)),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| IpmError::Manifest { path, source })
}

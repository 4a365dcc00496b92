//! Inventory of installed packages and their available updates.

use std::fs;
use std::io;

use tracing::warn;

use crate::environment::Environment;
use crate::error::{IpmError, Result};
use crate::registry::PackageRegistry;
use crate::resolver;
use crate::types::{OutdatedPackageInfo, PackageMetadata};
use crate::utils;

/// Manifests of every package under the packages directory, sorted by name.
///
/// A missing packages directory means nothing is installed. Entries whose
/// manifest cannot be read are skipped with a warning.
pub fn get_installed(env: &Environment) -> Result<Vec<PackageMetadata>> {
    let packages_dir = env.packages_directory()?;
    let entries = match fs::read_dir(&packages_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(IpmError::io("read packages directory", &packages_dir, e)),
    };

    let mut installed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IpmError::io("read packages directory", &packages_dir, e))?;
        let dir_name = entry.file_name().to_string_lossy().into_owned();
        match utils::read_manifest(&entry.path()) {
            Ok(Some(manifest)) => installed.push(manifest),
            Ok(None) => warn!("Warning: Could not read package.json for {}: missing", dir_name),
            Err(e) => warn!("Warning: Could not read package.json for {}: {}", dir_name, e),
        }
    }
    installed.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(installed)
}

/// Installed packages whose latest compatible release is newer than the installed one.
pub fn get_outdated<R: PackageRegistry>(
    env: &Environment,
    registry: &R,
    host_version: &str,
) -> Result<Vec<OutdatedPackageInfo>> {
    let mut outdated = Vec::new();
    for pkg in get_installed(env)? {
        let info = match registry.get_package_info(&pkg.name) {
            Ok(info) => info,
            Err(e) => {
                warn!("Warning: Could not check updates for {}: {}", pkg.name, e);
                continue;
            }
        };
        if let Some(latest) = resolver::latest_compatible_version(&info, host_version) {
            if resolver::version_gt(&latest, &pkg.version) {
                outdated.push(OutdatedPackageInfo {
                    name: pkg.name,
                    version: pkg.version,
                    latest_version: latest,
                });
            }
        }
    }
    Ok(outdated)
}

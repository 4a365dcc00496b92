//! Move an installed package to a pinned or the latest compatible release.

use tracing::info;

use crate::dependencies::DependencySource;
use crate::environment::Environment;
use crate::error::Result;
use crate::install::Installer;
use crate::registry::PackageRegistry;
use crate::resolver;
use crate::utils;

/// Update `name`. A package that is not installed (or whose manifest cannot be
/// read) is simply installed.
pub fn update<R: PackageRegistry, S: DependencySource>(
    installer: &Installer<'_, R, S>,
    env: &Environment,
    name: &str,
    version: Option<&str>,
) -> Result<()> {
    let package_dir = env.package_directory(name)?;
    let current = match utils::read_manifest(&package_dir) {
        Ok(Some(manifest)) => manifest.version,
        _ => {
            info!("Package {} is not installed, installing...", name);
            return installer.run(name, version);
        }
    };

    if version == Some(current.as_str()) {
        info!("Package {}@{} is already up to date", name, current);
        return Ok(());
    }

    let pkg = installer.request_package(name)?;
    let release = installer.resolve_release(&pkg, name, version)?;
    let target = release.version();

    if current == target {
        info!("Package {}@{} is already up to date", name, current);
        return Ok(());
    }

    if resolver::version_gt(&current, target) {
        info!("Downgrading {} from {} to {}", name, current, target);
    } else {
        info!("Updating {} from {} to {}", name, current, target);
    }
    installer.install(release)
}

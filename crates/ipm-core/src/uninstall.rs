use tracing::{error, info};

use crate::environment::Environment;
use crate::error::{IpmError, Result};
use crate::utils;

/// Remove `<packagesDir>/<name>` recursively.
pub fn uninstall(env: &Environment, name: &str) -> Result<()> {
    let package_dir = env.package_directory(name)?;
    if !utils::path_exists(&package_dir) {
        let err = IpmError::NotInstalled(name.to_string());
        error!("Failed to uninstall {}: {}", name, err);
        return Err(err);
    }

    info!("Uninstalling {}...", name);
    utils::remove_dir_if_exists(&package_dir).inspect_err(|e| {
        error!("Failed to uninstall {}: {}", name, e);
    })?;
    info!("Successfully uninstalled {}", name);
    Ok(())
}

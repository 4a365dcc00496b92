//! Plugin install pipeline: resolve, download, replace, extract, dependencies, cleanup.
//!
//! The replace step deletes the existing package directory before the new one
//! is extracted, so a crash in between leaves the package uninstalled rather
//! than at the old or new version. Nothing locks the packages directory or the
//! scratch area: two concurrent installs of the same package race on the
//! replace step.

use std::fmt;
use std::path::Path;

use tracing::{debug, error, info};

use crate::archive;
use crate::dependencies::{DependencyFetcher, DependencySource};
use crate::environment::Environment;
use crate::error::{IpmError, Result};
use crate::registry::PackageRegistry;
use crate::resolver;
use crate::types::{PackageInfo, PackageVersionInfo};
use crate::utils;

/// Pipeline states. `Failed` is reachable from every step before dependency resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Idle,
    Resolving,
    Downloading,
    Replacing,
    Extracting,
    ResolvingDependencies,
    CleaningUp,
    Done,
    Failed,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallStage::Idle => "idle",
            InstallStage::Resolving => "resolving",
            InstallStage::Downloading => "downloading",
            InstallStage::Replacing => "replacing",
            InstallStage::Extracting => "extracting",
            InstallStage::ResolvingDependencies => "resolving dependencies",
            InstallStage::CleaningUp => "cleaning up",
            InstallStage::Done => "done",
            InstallStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

pub struct Installer<'a, R: PackageRegistry, S: DependencySource> {
    host_version: &'a str,
    env: &'a Environment,
    registry: &'a R,
    dependency_source: &'a S,
}

impl<'a, R: PackageRegistry, S: DependencySource> Installer<'a, R, S> {
    pub fn new(
        host_version: &'a str,
        env: &'a Environment,
        registry: &'a R,
        dependency_source: &'a S,
    ) -> Self {
        Self {
            host_version,
            env,
            registry,
            dependency_source,
        }
    }

    /// Install `name`, pinned to `version` when given, otherwise the latest compatible release.
    pub fn run(&self, name: &str, version: Option<&str>) -> Result<()> {
        debug!(package = name, stage = %InstallStage::Resolving, "install");
        let pkg = self.request_package(name)?;
        let release = self.resolve_release(&pkg, name, version)?;
        self.install(release)
    }

    /// Fetch the package record; a package without a `latest` release cannot be installed.
    pub fn request_package(&self, name: &str) -> Result<PackageInfo> {
        let info = self.registry.get_package_info(name)?;
        if info.latest().is_some() {
            Ok(info)
        } else {
            Err(IpmError::NoReleases(name.to_string()))
        }
    }

    /// Pick the release to install: the pinned one if it accepts this host,
    /// otherwise the greatest compatible release.
    pub fn resolve_release<'p>(
        &self,
        pkg: &'p PackageInfo,
        name: &str,
        version: Option<&str>,
    ) -> Result<&'p PackageVersionInfo> {
        match version {
            Some(version) => {
                let release = pkg.version(version).ok_or_else(|| IpmError::VersionNotFound {
                    name: name.to_string(),
                    version: version.to_string(),
                })?;
                let range = release.metadata.host_range();
                if !resolver::range_accepts(range, self.host_version) {
                    return Err(IpmError::Incompatible {
                        name: name.to_string(),
                        version: version.to_string(),
                        host_version: self.host_version.to_string(),
                        range: range.to_string(),
                    });
                }
                Ok(release)
            }
            None => resolver::latest_compatible_version(pkg, self.host_version)
                .and_then(|v| pkg.version(&v))
                .ok_or_else(|| IpmError::NoCompatibleVersion {
                    name: name.to_string(),
                    host_version: self.host_version.to_string(),
                }),
        }
    }

    /// Install one release. Steps up to extraction are fatal; dependency problems are not.
    pub fn install(&self, pkg: &PackageVersionInfo) -> Result<()> {
        let mut stage = InstallStage::Idle;
        match self.install_steps(pkg, &mut stage) {
            Ok(()) => {
                info!("Successfully installed {}@{}", pkg.name(), pkg.version());
                Ok(())
            }
            Err(e) => {
                error!(
                    stage = %stage,
                    "Failed to install {}@{}: {}",
                    pkg.name(),
                    pkg.version(),
                    e
                );
                debug!(package = pkg.name(), stage = %InstallStage::Failed, "install");
                Err(e)
            }
        }
    }

    fn install_steps(&self, pkg: &PackageVersionInfo, stage: &mut InstallStage) -> Result<()> {
        let name = pkg.name();
        let version = pkg.version();
        let packages_dir = self.env.packages_directory()?;
        let package_dir = self.env.package_directory(name)?;
        let temp_dir = self.env.tarball_scratch_directory()?;
        let tarball_path = temp_dir.join(scratch_file_name(name, version));

        utils::ensure_dir(&packages_dir)?;
        utils::ensure_dir(&temp_dir)?;

        info!("Installing {}@{}...", name, version);

        advance(stage, InstallStage::Downloading, name);
        self.registry.download_package_tarball(name, version, &tarball_path)?;

        advance(stage, InstallStage::Replacing, name);
        utils::remove_dir_if_exists(&package_dir)?;
        utils::ensure_dir(&package_dir)?;

        advance(stage, InstallStage::Extracting, name);
        archive::extract_tarball(&tarball_path, &package_dir)?;

        advance(stage, InstallStage::ResolvingDependencies, name);
        self.install_dependencies(&package_dir)?;

        advance(stage, InstallStage::CleaningUp, name);
        utils::remove_file_quietly(&tarball_path);

        advance(stage, InstallStage::Done, name);
        Ok(())
    }

    fn install_dependencies(&self, package_dir: &Path) -> Result<()> {
        let scratch = self.env.dependency_scratch_directory()?;
        DependencyFetcher::new(self.dependency_source, scratch).install_dependencies(package_dir);
        Ok(())
    }
}

/// `<name>-<version>.tgz` flattened to one path component.
fn scratch_file_name(name: &str, version: &str) -> String {
    format!("{}-{}.tgz", name, version).replace(['/', '\\'], "_")
}

fn advance(stage: &mut InstallStage, next: InstallStage, name: &str) {
    *stage = next;
    debug!(package = name, stage = %next, "install");
}

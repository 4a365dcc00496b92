//! Third-party dependency provisioning for an installed package.
//!
//! Dependencies come from the public npm registry, not the plugin registry.
//! All transitive dependencies are flattened into one `node_modules` directory
//! keyed by name only; when two branches ask for different versions of the
//! same name, the entry installed last occupies the directory. There is no
//! range resolution: `^1.2.3` and `~1.2.3` install exactly `1.2.3`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive;
use crate::environment;
use crate::error::{IpmError, Result};
use crate::http_client::HttpClient;
use crate::types::{DependencyEntry, PackageMetadata};
use crate::utils;

/// Source of dependency archives.
pub trait DependencySource {
    /// Download the archive for `entry` (at its cleaned version) into `dest`.
    fn download(&self, entry: &DependencyEntry, dest: &Path) -> Result<()>;
}

/// `GET <registry>/{name}/-/{archiveBaseName}-{cleanVersion}.tgz`
#[derive(Clone)]
pub struct NpmRegistry {
    registry_url: String,
    client: HttpClient,
}

impl NpmRegistry {
    pub fn new(registry_url: &str) -> Self {
        Self {
            registry_url: registry_url.trim_end_matches('/').to_string(),
            client: HttpClient::new(),
        }
    }

    pub fn tarball_url(&self, entry: &DependencyEntry) -> String {
        format!(
            "{}/{}/-/{}",
            self.registry_url,
            entry.name,
            entry.archive_file_name()
        )
    }
}

impl DependencySource for NpmRegistry {
    fn download(&self, entry: &DependencyEntry, dest: &Path) -> Result<()> {
        let bytes = self.client.get_bytes(&self.tarball_url(entry))?;
        std::fs::write(dest, bytes).map_err(|e| IpmError::io("write dependency archive", dest, e))
    }
}

/// Discovers and installs the dependency closure of one freshly extracted package.
pub struct DependencyFetcher<'a, S: DependencySource> {
    source: &'a S,
    scratch_dir: PathBuf,
}

impl<'a, S: DependencySource> DependencyFetcher<'a, S> {
    pub fn new(source: &'a S, scratch_dir: PathBuf) -> Self {
        Self {
            source,
            scratch_dir,
        }
    }

    /// Provision `<package_dir>/node_modules` from the package's manifest.
    ///
    /// Never fails: every problem is logged as a warning so a broken
    /// dependency cannot make the host package unusable.
    pub fn install_dependencies(&self, package_dir: &Path) {
        let manifest = match utils::read_manifest(package_dir) {
            Ok(Some(m)) => m,
            Ok(None) => return,
            Err(e) => {
                warn!("Warning: Could not read package.json for dependency installation: {}", e);
                return;
            }
        };
        if manifest.dependencies.is_none() {
            return;
        }

        let node_modules = environment::dependency_directory(package_dir);
        if let Err(e) = utils::ensure_dir(&node_modules) {
            warn!("Warning: Could not prepare {}: {}", node_modules.display(), e);
            return;
        }

        for entry in self.collect_dependencies(&manifest) {
            if let Err(e) = self.install_dependency(&entry, &node_modules) {
                warn!("Warning: Failed to install dependency {}: {}", entry.key(), e);
            }
        }
    }

    /// Depth-first, pre-order walk of the dependency graph.
    ///
    /// Each distinct `name@versionSpec` pair appears once, in first-seen order.
    /// An explicit stack of sibling iterators replaces recursion so a deep or
    /// cyclic graph cannot grow the call stack.
    pub fn collect_dependencies(&self, root: &PackageMetadata) -> Vec<DependencyEntry> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut ordered = Vec::new();
        let mut stack = vec![root.dependency_entries().into_iter()];

        while let Some(siblings) = stack.last_mut() {
            let Some(entry) = siblings.next() else {
                stack.pop();
                continue;
            };
            if !utils::is_valid_package_name(&entry.name) {
                warn!("Warning: Skipping dependency with invalid name {:?}", entry.name);
                continue;
            }
            if !visited.insert(entry.key()) {
                continue;
            }
            ordered.push(entry.clone());

            match self.fetch_nested_dependencies(&entry) {
                Ok(nested) if !nested.is_empty() => stack.push(nested.into_iter()),
                Ok(_) => {}
                Err(e) => {
                    warn!("Warning: Could not fetch dependencies for {}: {}", entry.key(), e);
                }
            }
        }
        ordered
    }

    /// Download and unpack `entry` into a disposable location just to read its manifest.
    fn fetch_nested_dependencies(&self, entry: &DependencyEntry) -> Result<Vec<DependencyEntry>> {
        utils::ensure_dir(&self.scratch_dir)?;
        let stem = entry.scratch_stem();
        let tarball_path = self.scratch_dir.join(format!("{}.tgz", stem));
        let extract_dir = self.scratch_dir.join(format!("extract-{}", stem));

        let result = self.peek_manifest(entry, &tarball_path, &extract_dir);

        utils::remove_file_quietly(&tarball_path);
        let _ = utils::remove_dir_if_exists(&extract_dir);

        Ok(result?
            .map(|m| m.dependency_entries())
            .unwrap_or_default())
    }

    fn peek_manifest(
        &self,
        entry: &DependencyEntry,
        tarball_path: &Path,
        extract_dir: &Path,
    ) -> Result<Option<PackageMetadata>> {
        utils::ensure_dir(extract_dir)?;
        self.source.download(entry, tarball_path)?;
        archive::extract_tarball(tarball_path, extract_dir)?;
        utils::read_manifest(extract_dir)
    }

    /// Download, replace `node_modules/<name>`, extract.
    fn install_dependency(&self, entry: &DependencyEntry, node_modules: &Path) -> Result<()> {
        utils::ensure_dir(&self.scratch_dir)?;
        let dep_dir = node_modules.join(&entry.name);
        let tarball_path = self.scratch_dir.join(format!("{}.tgz", entry.scratch_stem()));

        info!("  Installing dependency {}@{}...", entry.name, entry.clean_version());

        self.source.download(entry, &tarball_path)?;
        utils::remove_dir_if_exists(&dep_dir)?;
        utils::ensure_dir(&dep_dir)?;
        archive::extract_tarball(&tarball_path, &dep_dir)?;
        utils::remove_file_quietly(&tarball_path);
        debug!("Installed dependency {} into {}", entry.key(), dep_dir.display());
        Ok(())
    }
}

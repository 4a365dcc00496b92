//! Shared fixtures for unit tests: in-memory archives and in-process registries.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Map, Value};

use crate::dependencies::DependencySource;
use crate::environment::{Environment, IpmOptions};
use crate::error::{IpmError, Result};
use crate::registry::PackageRegistry;
use crate::types::{
    DependencyEntry, Dist, Engines, PackageInfo, PackageMetadata, PackageVersionInfo, Releases,
};

pub enum TarItem<'a> {
    File(&'a str),
    Symlink(&'a str),
    HardLink(&'a str),
}

/// Gzipped tar holding `(path, contents)` pairs.
pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let items: Vec<(&str, TarItem)> = files
        .iter()
        .map(|(path, contents)| (*path, TarItem::File(contents)))
        .collect();
    tarball_with(&items)
}

/// Gzipped tar with regular files and links, in the given order.
pub fn tarball_with(items: &[(&str, TarItem)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, item) in items {
        let mut header = tar::Header::new_gnu();
        header.set_mode(0o644);
        match item {
            TarItem::File(contents) => {
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(contents.len() as u64);
                header.set_cksum();
                builder
                    .append_data(&mut header, path, contents.as_bytes())
                    .unwrap();
            }
            TarItem::Symlink(target) | TarItem::HardLink(target) => {
                let kind = if matches!(item, TarItem::Symlink(_)) {
                    tar::EntryType::Symlink
                } else {
                    tar::EntryType::Link
                };
                header.set_entry_type(kind);
                header.set_size(0);
                header.set_link_name(target).unwrap();
                header.set_cksum();
                builder
                    .append_data(&mut header, path, std::io::empty())
                    .unwrap();
            }
        }
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub fn write_tarball(path: &Path, bytes: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
    path.to_path_buf()
}

/// Isolated environment rooted at `home` with host version 5.9.0.
pub fn test_env(home: &Path) -> Environment {
    Environment::isolated(IpmOptions {
        app_version: "5.9.0".to_string(),
        app_home_path: Some(home.to_path_buf()),
        ..Default::default()
    })
}

fn dependency_map(deps: &[(&str, &str)]) -> Map<String, Value> {
    deps.iter()
        .map(|(name, spec)| (name.to_string(), Value::String(spec.to_string())))
        .collect()
}

pub fn manifest_with_deps(deps: &[(&str, &str)]) -> PackageMetadata {
    PackageMetadata {
        name: "root".to_string(),
        version: "1.0.0".to_string(),
        dependencies: Some(dependency_map(deps)),
        ..Default::default()
    }
}

fn not_found(url: String) -> IpmError {
    IpmError::Network {
        url,
        status: Some(404),
        message: "HTTP 404: not found".to_string(),
    }
}

/// npm stand-in. Archives are looked up by `name@cleanVersion`, then by name alone
/// (the last version registered for that name).
#[derive(Default)]
pub struct FakeDependencySource {
    archives: HashMap<String, Vec<u8>>,
    failing: Vec<String>,
    downloads: RefCell<HashMap<String, usize>>,
}

impl FakeDependencySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> Self {
        let manifest = json!({
            "name": name,
            "version": version,
            "main": "index.js",
            "dependencies": Value::Object(dependency_map(deps)),
        })
        .to_string();
        let archive = tarball(&[
            ("package/package.json", manifest.as_str()),
            ("package/index.js", "module.exports = {}"),
        ]);
        self.archives.insert(format!("{}@{}", name, version), archive.clone());
        self.archives.insert(name.to_string(), archive);
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }

    pub fn downloads(&self, name: &str) -> usize {
        self.downloads.borrow().get(name).copied().unwrap_or(0)
    }

    pub fn total_downloads(&self) -> usize {
        self.downloads.borrow().values().sum()
    }
}

impl DependencySource for FakeDependencySource {
    fn download(&self, entry: &DependencyEntry, dest: &Path) -> Result<()> {
        *self
            .downloads
            .borrow_mut()
            .entry(entry.name.clone())
            .or_default() += 1;
        if self.failing.contains(&entry.name) {
            return Err(IpmError::Network {
                url: format!("fake://{}", entry.archive_file_name()),
                status: Some(500),
                message: "HTTP 500: Internal Server Error".to_string(),
            });
        }
        let archive = self
            .archives
            .get(&format!("{}@{}", entry.name, entry.clean_version()))
            .or_else(|| self.archives.get(&entry.name))
            .ok_or_else(|| not_found(format!("fake://{}", entry.archive_file_name())))?;
        std::fs::write(dest, archive).map_err(|e| IpmError::io("write dependency archive", dest, e))
    }
}

/// Plugin registry stand-in. Archives are generated from the release records.
#[derive(Default)]
pub struct FakeRegistry {
    packages: HashMap<String, PackageInfo>,
    fail_downloads: bool,
    downloads: RefCell<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, info: PackageInfo) -> Self {
        self.packages.insert(info.name.clone(), info);
        self
    }

    pub fn failing_downloads(mut self) -> Self {
        self.fail_downloads = true;
        self
    }

    /// `name@version` of every archive handed out, in order.
    pub fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }
}

impl PackageRegistry for FakeRegistry {
    fn get_package_info(&self, name: &str) -> Result<PackageInfo> {
        self.packages
            .get(name)
            .cloned()
            .ok_or_else(|| not_found(format!("fake://packages/{}", name)))
    }

    fn get_package_version_info(&self, name: &str, version: &str) -> Result<PackageVersionInfo> {
        self.packages
            .get(name)
            .and_then(|p| p.version(version))
            .cloned()
            .ok_or_else(|| not_found(format!("fake://packages/{}/versions/{}", name, version)))
    }

    fn download_package_tarball(&self, name: &str, version: &str, dest: &Path) -> Result<()> {
        let release = self.get_package_version_info(name, version)?;
        if self.fail_downloads {
            return Err(IpmError::Network {
                url: format!("fake://packages/{}/versions/{}/tarball", name, version),
                status: None,
                message: "connection reset".to_string(),
            });
        }
        let manifest = serde_json::to_string(&release.metadata).unwrap();
        let archive = tarball(&[
            ("package/package.json", manifest.as_str()),
            ("package/lib/index.js", "module.exports = {}"),
        ]);
        self.downloads
            .borrow_mut()
            .push(format!("{}@{}", name, version));
        std::fs::write(dest, archive).map_err(|e| IpmError::io("write download", dest, e))
    }
}

fn math_release(version: &str, range: &str) -> PackageVersionInfo {
    PackageVersionInfo {
        metadata: PackageMetadata {
            name: "math".to_string(),
            version: version.to_string(),
            main: Some("./lib/index".to_string()),
            engines: Some(Engines {
                host: Some(range.to_string()),
            }),
            dependencies: Some(dependency_map(&[
                ("@matejmazur/react-katex", "^3.1.3"),
                ("katex", "^0.16.21"),
            ])),
            ..Default::default()
        },
        dist: Some(Dist {
            tarball: format!("fake://packages/math/versions/{}/tarball", version),
        }),
    }
}

/// Three releases: two for hosts 5.9 to 7, one for a far-future host.
pub fn math_package_info() -> PackageInfo {
    let mut info = PackageInfo {
        name: "math".to_string(),
        releases: Releases {
            latest: Some("1.6.1".to_string()),
        },
        ..Default::default()
    };
    for (version, range) in [
        ("1.6.0", ">=5.9.0 <7.0.0"),
        ("1.6.1", ">=5.9.0 <7.0.0"),
        ("999.0.0", ">=999.0.0 <1000.0.0"),
    ] {
        info.versions
            .insert(version.to_string(), Some(math_release(version, range)));
    }
    info
}

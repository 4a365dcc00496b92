//! Registry records and on-disk manifests.
//!
//! Every field except `name` is optional on the wire: the registry and
//! third-party manifests are not trusted to be complete.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `engines` block of a manifest. Only the host constraint is interpreted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Engines {
    #[serde(default, rename = "inkdrop", skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Contents of a `package.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Either a URL string or `{ "type": ..., "url": ... }`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engines: Option<Engines>,
    /// Kept as a JSON object so declaration order survives parsing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dev_dependencies: Option<Map<String, Value>>,
}

impl PackageMetadata {
    /// Declared host compatibility range; `*` when the manifest has none.
    pub fn host_range(&self) -> &str {
        self.engines
            .as_ref()
            .and_then(|e| e.host.as_deref())
            .unwrap_or("*")
    }

    /// Runtime dependencies in declaration order. Non-string specs are skipped.
    pub fn dependency_entries(&self) -> Vec<DependencyEntry> {
        let Some(deps) = &self.dependencies else {
            return Vec::new();
        };
        deps.iter()
            .filter_map(|(name, spec)| {
                spec.as_str().map(|s| DependencyEntry::new(name, s))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dist {
    #[serde(default)]
    pub tarball: String,
}

/// A single installable release.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageVersionInfo {
    #[serde(flatten)]
    pub metadata: PackageMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<Dist>,
}

impl PackageVersionInfo {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn tarball_url(&self) -> Option<&str> {
        self.dist
            .as_ref()
            .map(|d| d.tarball.as_str())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Releases {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
}

/// Aggregate registry record for a package name.
///
/// `versions` keys are raw strings straight from the registry; they are not
/// guaranteed to be valid semantic versions and entries may be `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
    #[serde(default)]
    pub releases: Releases,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PackageMetadata>,
    #[serde(default)]
    pub versions: BTreeMap<String, Option<PackageVersionInfo>>,
}

impl PackageInfo {
    pub fn latest(&self) -> Option<&str> {
        self.releases.latest.as_deref().filter(|v| !v.is_empty())
    }

    pub fn version(&self, version: &str) -> Option<&PackageVersionInfo> {
        self.versions.get(version).and_then(Option::as_ref)
    }
}

/// One `name -> versionSpec` pair from a manifest's `dependencies`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEntry {
    pub name: String,
    pub version_spec: String,
}

impl DependencyEntry {
    pub fn new(name: &str, version_spec: &str) -> Self {
        Self {
            name: name.to_string(),
            version_spec: version_spec.to_string(),
        }
    }

    /// Visited-set key: the literal `name@versionSpec` pair, not a resolved version.
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.version_spec)
    }

    /// Spec with a single leading `^` or `~` removed. No range resolution happens.
    pub fn clean_version(&self) -> &str {
        self.version_spec
            .strip_prefix(['^', '~'])
            .unwrap_or(&self.version_spec)
    }

    /// Archive base name on the npm registry: `@scope/pkg` -> `pkg`.
    pub fn archive_base_name(&self) -> &str {
        if self.name.starts_with('@') {
            self.name.split('/').nth(1).unwrap_or(&self.name)
        } else {
            &self.name
        }
    }

    /// Archive file name as published on the npm registry.
    pub fn archive_file_name(&self) -> String {
        format!("{}-{}.tgz", self.archive_base_name(), self.clean_version())
    }

    /// `<base>-<cleanVersion>` flattened to a single path component, for scratch files.
    pub fn scratch_stem(&self) -> String {
        format!("{}-{}", self.archive_base_name(), self.clean_version()).replace(['/', '\\'], "_")
    }
}

/// An installed package with a newer compatible release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutdatedPackageInfo {
    pub name: String,
    pub version: String,
    pub latest_version: String,
}

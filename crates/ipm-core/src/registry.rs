//! Plugin registry client: package records, release records and archive download.
//! All HTTP calls go through `crate::http_client` (shared Agent = connection reuse).

use std::path::Path;

use crate::error::{IpmError, Result};
use crate::http_client::HttpClient;
use crate::types::{PackageInfo, PackageVersionInfo};

/// What the install pipeline needs from the plugin registry.
pub trait PackageRegistry {
    /// `GET /packages/{name}`
    fn get_package_info(&self, name: &str) -> Result<PackageInfo>;

    /// `GET /packages/{name}/versions/{version}`
    fn get_package_version_info(&self, name: &str, version: &str) -> Result<PackageVersionInfo>;

    /// Fetch the release record, then write its `dist.tarball` to `dest`.
    fn download_package_tarball(&self, name: &str, version: &str, dest: &Path) -> Result<()>;
}

/// HTTP implementation against `<apiUrl>/v1/packages`.
#[derive(Clone)]
pub struct IpmRegistry {
    base_url: String,
    client: HttpClient,
}

impl IpmRegistry {
    pub fn new(api_url: &str, client_version: &str) -> Self {
        Self {
            base_url: format!("{}/v1/packages", api_url.trim_end_matches('/')),
            client: HttpClient::new().with_header("X-CLIENT-VERSION", client_version),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Keyword search, best match first.
    pub fn search(&self, query: &str) -> Result<Vec<PackageInfo>> {
        self.client.get_json_with_query(
            &self.url("search"),
            &[("q", query), ("sort", "score"), ("direction", "desc")],
        )
    }

    /// One page of the package listing (`page` counts from 0).
    pub fn packages(&self, sort: PackageSort, page: u32, theme: bool) -> Result<Vec<PackageInfo>> {
        let page = page.to_string();
        self.client.get_json_with_query(
            &self.url(""),
            &[
                ("sort", sort.as_str()),
                ("page", &page),
                ("theme", if theme { "1" } else { "" }),
            ],
        )
    }

    pub fn popular_packages(&self, page: u32, theme: bool) -> Result<Vec<PackageInfo>> {
        self.packages(PackageSort::Majority, page, theme)
    }

    pub fn new_packages(&self, page: u32, theme: bool) -> Result<Vec<PackageInfo>> {
        self.packages(PackageSort::Recency, page, theme)
    }
}

/// Orderings the package listing accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageSort {
    /// Most installed first.
    Majority,
    /// Most recently updated first.
    #[default]
    Recency,
    /// Most recently created first.
    Newness,
    ThemeMajority,
    ThemeRecency,
    ThemeNewness,
}

impl PackageSort {
    pub const ALL: [PackageSort; 6] = [
        PackageSort::Majority,
        PackageSort::Recency,
        PackageSort::Newness,
        PackageSort::ThemeMajority,
        PackageSort::ThemeRecency,
        PackageSort::ThemeNewness,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PackageSort::Majority => "majority",
            PackageSort::Recency => "recency",
            PackageSort::Newness => "newness",
            PackageSort::ThemeMajority => "theme-majority",
            PackageSort::ThemeRecency => "theme-recency",
            PackageSort::ThemeNewness => "theme-newness",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|sort| sort.as_str() == value)
    }
}

impl PackageRegistry for IpmRegistry {
    fn get_package_info(&self, name: &str) -> Result<PackageInfo> {
        self.client.get_json(&self.url(name))
    }

    fn get_package_version_info(&self, name: &str, version: &str) -> Result<PackageVersionInfo> {
        self.client
            .get_json(&self.url(&format!("{}/versions/{}", name, version)))
    }

    fn download_package_tarball(&self, name: &str, version: &str, dest: &Path) -> Result<()> {
        let info = self.get_package_version_info(name, version)?;
        let url = info.tarball_url().ok_or_else(|| IpmError::MissingTarball {
            name: name.to_string(),
            version: version.to_string(),
        })?;
        tracing::debug!("Downloading {}@{} from {}", name, version, url);
        self.client.get_to_file(url, dest)
    }
}

//! Core library for ipm: plugin resolution, install pipeline, npm dependency fetching.
//! Used by the CLI binary; the host application can embed it through [`Ipm`].

pub mod archive;
pub mod config;
pub mod dependencies;
pub mod environment;
pub mod error;
pub mod http_client;
pub mod install;
pub mod installed;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod uninstall;
pub mod update;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::{load_config, Config};
pub use dependencies::{DependencyFetcher, DependencySource, NpmRegistry};
pub use environment::{Environment, IpmOptions};
pub use error::{IpmError, Result};
pub use install::{InstallStage, Installer};
pub use registry::{IpmRegistry, PackageRegistry, PackageSort};
pub use resolver::{latest_compatible_version, FLOOR_HOST_VERSION};
pub use types::{
    DependencyEntry, OutdatedPackageInfo, PackageInfo, PackageMetadata, PackageVersionInfo,
};

/// Package manager bound to one host version and one directory layout.
pub struct Ipm {
    host_version: String,
    env: Environment,
    registry: IpmRegistry,
    npm: NpmRegistry,
}

impl Ipm {
    /// Build from options, consulting env vars and `.ipmrc` for anything unset.
    pub fn new(options: IpmOptions) -> Self {
        Self::with_environment(Environment::new(options))
    }

    pub fn with_environment(env: Environment) -> Self {
        let host_version = utils::normalize_version(&env.options().app_version);
        let registry = IpmRegistry::new(&env.api_url(), &host_version);
        let npm = NpmRegistry::new(&env.npm_registry_url());
        Self {
            host_version,
            env,
            registry,
            npm,
        }
    }

    /// Host version with any `-<suffix>` removed.
    pub fn host_version(&self) -> &str {
        &self.host_version
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn registry(&self) -> &IpmRegistry {
        &self.registry
    }

    fn installer(&self) -> Installer<'_, IpmRegistry, NpmRegistry> {
        Installer::new(&self.host_version, &self.env, &self.registry, &self.npm)
    }

    pub fn install(&self, name: &str, version: Option<&str>) -> Result<()> {
        self.installer().run(name, version)
    }

    pub fn update(&self, name: &str, version: Option<&str>) -> Result<()> {
        update::update(&self.installer(), &self.env, name, version)
    }

    pub fn uninstall(&self, name: &str) -> Result<()> {
        uninstall::uninstall(&self.env, name)
    }

    pub fn get_installed(&self) -> Result<Vec<PackageMetadata>> {
        installed::get_installed(&self.env)
    }

    pub fn get_outdated(&self) -> Result<Vec<OutdatedPackageInfo>> {
        installed::get_outdated(&self.env, &self.registry, &self.host_version)
    }

    pub fn search(&self, query: &str) -> Result<Vec<PackageInfo>> {
        self.registry.search(query)
    }

    /// One page of the registry listing in the given order.
    pub fn packages(&self, sort: PackageSort, page: u32, theme: bool) -> Result<Vec<PackageInfo>> {
        self.registry.packages(sort, page, theme)
    }
}

//! Directory layout and endpoint resolution.
//!
//! Each setting is resolved as: explicit option > environment variable >
//! `.ipmrc` > platform default. Environment variables are snapshotted when the
//! `Environment` is built so later `set_var` calls do not change its answers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::error::{IpmError, Result};
use crate::utils;

pub const HOME_ENV: &str = "INKDROP_HOME";
pub const API_URL_ENV: &str = "INKDROP_API_URL";
pub const REGISTRY_ENV: &str = "NPM_CONFIG_REGISTRY";
const APPDATA_ENV: &str = "APPDATA";

pub const DEFAULT_API_URL: &str = "https://api.inkdrop.app";
pub const DEFAULT_NPM_REGISTRY: &str = "https://registry.npmjs.org";

const APP_DIR_NAME: &str = "inkdrop";
const CACHE_DIR_NAME: &str = ".cache";
const PACKAGES_DIR_NAME: &str = "packages";
const TARBALL_SCRATCH_NAME: &str = "tmp";
const DEPENDENCY_SCRATCH_NAME: &str = "npm-tmp";
pub const DEPENDENCY_DIR_NAME: &str = "node_modules";

/// Caller-supplied settings; these take precedence over everything else.
#[derive(Debug, Clone, Default)]
pub struct IpmOptions {
    /// Running host version. Empty when unknown.
    pub app_version: String,
    pub app_home_path: Option<PathBuf>,
    pub app_data_path: Option<PathBuf>,
    pub api_url: Option<String>,
    pub npm_registry_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Environment {
    options: IpmOptions,
    config: Config,
    vars: HashMap<String, String>,
    platform: String,
    user_home: Option<PathBuf>,
}

impl Environment {
    /// Environment for the current process: real env vars and `.ipmrc` lookup.
    pub fn new(options: IpmOptions) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut env = Self::isolated(options).with_config(config::load_config(&cwd));
        for key in [HOME_ENV, API_URL_ENV, REGISTRY_ENV, APPDATA_ENV] {
            if let Ok(value) = std::env::var(key) {
                env = env.with_var(key, &value);
            }
        }
        env
    }

    /// Environment that sees no env vars and no rc file.
    pub fn isolated(options: IpmOptions) -> Self {
        Self {
            options,
            config: Config::default(),
            vars: HashMap::new(),
            platform: std::env::consts::OS.to_string(),
            user_home: dirs::home_dir(),
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        if !value.trim().is_empty() {
            self.vars.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = platform.to_string();
        self
    }

    pub fn with_user_home(mut self, home: Option<PathBuf>) -> Self {
        self.user_home = home;
        self
    }

    pub fn options(&self) -> &IpmOptions {
        &self.options
    }

    fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Where the host keeps its data, configuration, cache and packages.
    pub fn install_directory(&self) -> Result<PathBuf> {
        if let Some(path) = &self.options.app_home_path {
            return Ok(path.clone());
        }
        if let Some(path) = self.var(HOME_ENV) {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.config.home_path {
            return Ok(path.clone());
        }
        Ok(self.app_data_path()?.join(APP_DIR_NAME))
    }

    pub fn cache_directory(&self) -> Result<PathBuf> {
        Ok(self.install_directory()?.join(CACHE_DIR_NAME))
    }

    /// Per-user application data root. Fails on platforms without a known default.
    pub fn app_data_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.options.app_data_path {
            return Ok(path.clone());
        }
        if let Some(path) = &self.config.app_data_path {
            return Ok(path.clone());
        }
        let home = || self.user_home.clone().unwrap_or_default();
        match self.platform.as_str() {
            "macos" => Ok(home().join("Library").join("Application Support")),
            "linux" => Ok(home().join(".config")),
            "windows" => self
                .var(APPDATA_ENV)
                .map(PathBuf::from)
                .or_else(dirs::config_dir)
                .ok_or_else(|| IpmError::UnsupportedPlatform("windows without %APPDATA%".into())),
            other => Err(IpmError::UnsupportedPlatform(other.to_string())),
        }
    }

    pub fn packages_directory(&self) -> Result<PathBuf> {
        Ok(self.install_directory()?.join(PACKAGES_DIR_NAME))
    }

    /// `<packagesDir>/<name>`. Names that would resolve outside the packages
    /// directory are rejected.
    pub fn package_directory(&self, name: &str) -> Result<PathBuf> {
        if !utils::is_valid_package_name(name) {
            return Err(IpmError::InvalidPackageName(name.to_string()));
        }
        Ok(self.packages_directory()?.join(name))
    }

    /// Scratch area for plugin archives.
    pub fn tarball_scratch_directory(&self) -> Result<PathBuf> {
        Ok(self.cache_directory()?.join(TARBALL_SCRATCH_NAME))
    }

    /// Scratch area for dependency archives and manifest peeks.
    pub fn dependency_scratch_directory(&self) -> Result<PathBuf> {
        Ok(self.cache_directory()?.join(DEPENDENCY_SCRATCH_NAME))
    }

    pub fn api_url(&self) -> String {
        self.options
            .api_url
            .as_deref()
            .or_else(|| self.var(API_URL_ENV))
            .or(self.config.api_url.as_deref())
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
            .to_string()
    }

    /// Public registry that serves third-party dependency archives.
    pub fn npm_registry_url(&self) -> String {
        self.options
            .npm_registry_url
            .as_deref()
            .or_else(|| self.var(REGISTRY_ENV))
            .or(self.config.registry.as_deref())
            .unwrap_or(DEFAULT_NPM_REGISTRY)
            .trim()
            .trim_end_matches('/')
            .to_string()
    }
}

/// Dependency directory inside an installed package.
pub fn dependency_directory(package_dir: &Path) -> PathBuf {
    package_dir.join(DEPENDENCY_DIR_NAME)
}

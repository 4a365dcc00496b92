//! Error taxonomy for ipm operations.
//!
//! Not-found and incompatibility errors are fatal to the current command.
//! Dependency errors never surface here: the dependency fetcher logs and swallows them.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IpmError>;

#[derive(Debug, Error)]
pub enum IpmError {
    #[error("No releases available for {0}")]
    NoReleases(String),

    #[error("No compatible version found for package `{name}` with host v{host_version}")]
    NoCompatibleVersion { name: String, host_version: String },

    #[error("{name}@{version} is not compatible with your host v{host_version}. Compatible range: {range}")]
    Incompatible {
        name: String,
        version: String,
        host_version: String,
        range: String,
    },

    #[error("Version {version} of `{name}` does not exist")]
    VersionNotFound { name: String, version: String },

    #[error("Invalid package name `{0}`")]
    InvalidPackageName(String),

    #[error("Package `{0}` is not installed")]
    NotInstalled(String),

    #[error("No tarball URL published for {name}@{version}")]
    MissingTarball { name: String, version: String },

    #[error("I/O error in {operation}: {source} (path: {})", .path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Network error for {url}: {message}")]
    Network {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid registry response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid manifest {}: {source}", .path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to extract {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

impl IpmError {
    pub fn io(operation: &str, path: &Path, source: io::Error) -> Self {
        IpmError::Io {
            operation: operation.to_string(),
            path: path.to_path_buf(),
            source,
        }
    }

    /// True when the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        match self {
            IpmError::Io { source, .. } | IpmError::Archive { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            IpmError::Network { status, .. } => *status == Some(404),
            _ => false,
        }
    }
}

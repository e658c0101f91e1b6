//! Probe traits - the boundary between reconciliation logic and the OS
//!
//! Every read of live state and every mutation goes through one of these
//! traits, so the decision logic in [`crate::kinds`] can be exercised against
//! the in-memory implementations in [`crate::memory`].

use crate::error::{MutationError, ProbeError};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Metadata of an existing file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    /// Permission bits (`0o7777` mask)
    pub mode: u32,
    /// Owning user name
    pub owner: String,
    /// Owning group name
    pub group: String,
}

/// Filesystem probe and mutator.
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Whether `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> Result<bool, ProbeError>;

    /// Metadata of the file at `path`, or `None` if it does not exist.
    fn stat(&self, path: &Path) -> Result<Option<FileStat>, ProbeError>;

    /// Full contents of the file at `path`.
    fn read(&self, path: &Path) -> Result<Vec<u8>, ProbeError>;

    /// Replace the contents of the file at `path`, creating it if needed.
    fn write(&self, path: &Path, content: &[u8]) -> Result<(), MutationError>;

    /// Set the permission bits of `path`.
    fn chmod(&self, path: &Path, mode: u32) -> Result<(), MutationError>;

    /// Set owner and group of `path` by name.
    fn chown(&self, path: &Path, owner: &str, group: &str) -> Result<(), MutationError>;

    /// Create `path` and any missing parents with the given permission bits.
    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<(), MutationError>;
}

/// Installation status of a package.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageStatus {
    /// Whether the package is in an installed state
    pub installed: bool,
    /// Installed version, empty when not installed
    pub version: String,
}

impl PackageStatus {
    /// Status of a package that is not installed.
    pub fn absent() -> Self {
        Self::default()
    }

    /// Status of an installed package.
    pub fn installed(version: impl Into<String>) -> Self {
        Self {
            installed: true,
            version: version.into(),
        }
    }
}

/// Package database probe and mutator.
pub trait PackageManager: Send + Sync + fmt::Debug {
    /// Query the installation status of `name`.
    fn query_installed(&self, name: &str) -> Result<PackageStatus, ProbeError>;

    /// Install `name` pinned to `version`.
    fn install(&self, name: &str, version: &str) -> Result<(), MutationError>;
}

/// Service manager probe and mutator.
pub trait ServiceManager: Send + Sync + fmt::Debug {
    /// Whether the service is currently running.
    fn is_active(&self, name: &str) -> Result<bool, ProbeError>;

    /// Start the service.
    fn start(&self, name: &str) -> Result<(), MutationError>;

    /// Stop the service.
    fn stop(&self, name: &str) -> Result<(), MutationError>;

    /// Restart the service.
    fn restart(&self, name: &str) -> Result<(), MutationError>;
}

/// The set of probes handed to resource kinds at instantiation.
#[derive(Debug, Clone)]
pub struct Probes {
    pub fs: Arc<dyn FileSystem>,
    pub packages: Arc<dyn PackageManager>,
    pub services: Arc<dyn ServiceManager>,
}

impl Probes {
    /// Bundle three probe implementations.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        packages: Arc<dyn PackageManager>,
        services: Arc<dyn ServiceManager>,
    ) -> Self {
        Self {
            fs,
            packages,
            services,
        }
    }
}

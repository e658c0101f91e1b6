//! In-memory probe implementations
//!
//! These stand in for the real filesystem, package database and service
//! manager. They record every mutation so callers can assert on what a pass
//! did, and failures can be injected per path or name.

use crate::error::{MutationError, ProbeError};
use crate::probe::{FileStat, FileSystem, PackageManager, PackageStatus, ServiceManager};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn injected(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, format!("injected {what} failure"))
}

// ============================================================================
// Filesystem
// ============================================================================

/// A file held by [`MemoryFileSystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFile {
    pub content: Vec<u8>,
    pub mode: u32,
    pub owner: String,
    pub group: String,
}

#[derive(Debug, Default)]
struct FsState {
    dirs: BTreeMap<PathBuf, u32>,
    files: BTreeMap<PathBuf, MemoryFile>,
    mutations: Vec<String>,
    probes: usize,
    failing_probes: HashSet<PathBuf>,
    failing_mutations: HashSet<PathBuf>,
}

impl FsState {
    fn insert_dir_all(&mut self, path: &Path, mode: u32) {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            self.dirs.entry(ancestor.to_path_buf()).or_insert(mode);
        }
    }

    fn probe(&mut self, path: &Path, action: &'static str) -> Result<(), ProbeError> {
        self.probes += 1;
        if self.failing_probes.contains(path) {
            return Err(ProbeError::io(action, path.display().to_string(), injected(action)));
        }
        Ok(())
    }

    fn mutate(&mut self, path: &Path, action: &'static str) -> Result<(), MutationError> {
        if self.failing_mutations.contains(path) {
            return Err(MutationError::io(action, path.display().to_string(), injected(action)));
        }
        self.mutations.push(format!("{action} {}", path.display()));
        Ok(())
    }

    fn file_mut(
        &mut self,
        path: &Path,
        action: &'static str,
    ) -> Result<&mut MemoryFile, MutationError> {
        self.files.get_mut(path).ok_or_else(|| {
            MutationError::io(
                action,
                path.display().to_string(),
                io::Error::from(io::ErrorKind::NotFound),
            )
        })
    }
}

/// In-memory [`FileSystem`].
///
/// New files are created with mode `0o644` and owned by `root:root`, matching
/// what a privileged agent would produce before `chown`/`chmod`.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    state: Mutex<FsState>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a directory (and its parents).
    pub fn add_dir(&self, path: impl AsRef<Path>, mode: u32) {
        lock(&self.state).insert_dir_all(path.as_ref(), mode);
    }

    /// Seed a file; its parent directories are created with mode `0o755`.
    pub fn add_file(
        &self,
        path: impl AsRef<Path>,
        content: impl Into<Vec<u8>>,
        mode: u32,
        owner: &str,
        group: &str,
    ) {
        let path = path.as_ref();
        let mut state = lock(&self.state);
        if let Some(parent) = path.parent() {
            state.insert_dir_all(parent, 0o755);
        }
        state.files.insert(
            path.to_path_buf(),
            MemoryFile {
                content: content.into(),
                mode,
                owner: owner.to_string(),
                group: group.to_string(),
            },
        );
    }

    /// Snapshot of a file.
    pub fn file(&self, path: impl AsRef<Path>) -> Option<MemoryFile> {
        lock(&self.state).files.get(path.as_ref()).cloned()
    }

    /// Mode of a directory, if it exists.
    pub fn dir_mode(&self, path: impl AsRef<Path>) -> Option<u32> {
        lock(&self.state).dirs.get(path.as_ref()).copied()
    }

    /// Mutations performed so far, as `"<action> <path>"` lines.
    pub fn mutations(&self) -> Vec<String> {
        lock(&self.state).mutations.clone()
    }

    /// Forget recorded mutations and probe counts.
    pub fn clear_log(&self) {
        let mut state = lock(&self.state);
        state.mutations.clear();
        state.probes = 0;
    }

    /// Number of read calls made so far.
    pub fn probe_count(&self) -> usize {
        lock(&self.state).probes
    }

    /// Make every read of `path` fail.
    pub fn fail_probes_for(&self, path: impl AsRef<Path>) {
        lock(&self.state)
            .failing_probes
            .insert(path.as_ref().to_path_buf());
    }

    /// Make every mutation of `path` fail.
    pub fn fail_mutations_for(&self, path: impl AsRef<Path>) {
        lock(&self.state)
            .failing_mutations
            .insert(path.as_ref().to_path_buf());
    }
}

impl FileSystem for MemoryFileSystem {
    fn is_dir(&self, path: &Path) -> Result<bool, ProbeError> {
        let mut state = lock(&self.state);
        state.probe(path, "stat")?;
        Ok(state.dirs.contains_key(path))
    }

    fn stat(&self, path: &Path) -> Result<Option<FileStat>, ProbeError> {
        let mut state = lock(&self.state);
        state.probe(path, "stat")?;
        Ok(state.files.get(path).map(|f| FileStat {
            mode: f.mode,
            owner: f.owner.clone(),
            group: f.group.clone(),
        }))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, ProbeError> {
        let mut state = lock(&self.state);
        state.probe(path, "read")?;
        state.files.get(path).map(|f| f.content.clone()).ok_or_else(|| {
            ProbeError::io(
                "read",
                path.display().to_string(),
                io::Error::from(io::ErrorKind::NotFound),
            )
        })
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<(), MutationError> {
        let mut state = lock(&self.state);
        let parent_exists = path
            .parent()
            .is_none_or(|p| p.as_os_str().is_empty() || state.dirs.contains_key(p));
        if !parent_exists {
            return Err(MutationError::io(
                "write",
                path.display().to_string(),
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }
        state.mutate(path, "write")?;
        state
            .files
            .entry(path.to_path_buf())
            .and_modify(|f| f.content = content.to_vec())
            .or_insert_with(|| MemoryFile {
                content: content.to_vec(),
                mode: 0o644,
                owner: "root".to_string(),
                group: "root".to_string(),
            });
        Ok(())
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<(), MutationError> {
        let mut state = lock(&self.state);
        state.mutate(path, "chmod")?;
        state.file_mut(path, "chmod")?.mode = mode;
        Ok(())
    }

    fn chown(&self, path: &Path, owner: &str, group: &str) -> Result<(), MutationError> {
        let mut state = lock(&self.state);
        state.mutate(path, "chown")?;
        let file = state.file_mut(path, "chown")?;
        file.owner = owner.to_string();
        file.group = group.to_string();
        Ok(())
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<(), MutationError> {
        let mut state = lock(&self.state);
        state.mutate(path, "mkdir")?;
        state.insert_dir_all(path, mode);
        Ok(())
    }
}

// ============================================================================
// Packages
// ============================================================================

#[derive(Debug, Default)]
struct PackageState {
    packages: BTreeMap<String, PackageStatus>,
    installs: Vec<(String, String)>,
    probes: usize,
    failing_probes: HashSet<String>,
    failing_installs: HashSet<String>,
}

/// In-memory [`PackageManager`].
#[derive(Debug, Default)]
pub struct MemoryPackageManager {
    state: Mutex<PackageState>,
}

impl MemoryPackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an installed package.
    pub fn add_installed(&self, name: &str, version: &str) {
        lock(&self.state)
            .packages
            .insert(name.to_string(), PackageStatus::installed(version));
    }

    /// Installs performed so far, as `(name, version)`.
    pub fn installs(&self) -> Vec<(String, String)> {
        lock(&self.state).installs.clone()
    }

    /// Number of status queries made so far.
    pub fn probe_count(&self) -> usize {
        lock(&self.state).probes
    }

    /// Make status queries for `name` fail.
    pub fn fail_probes_for(&self, name: &str) {
        lock(&self.state).failing_probes.insert(name.to_string());
    }

    /// Make installs of `name` fail.
    pub fn fail_installs_for(&self, name: &str) {
        lock(&self.state).failing_installs.insert(name.to_string());
    }
}

impl PackageManager for MemoryPackageManager {
    fn query_installed(&self, name: &str) -> Result<PackageStatus, ProbeError> {
        let mut state = lock(&self.state);
        state.probes += 1;
        if state.failing_probes.contains(name) {
            return Err(ProbeError::Command {
                tool: "memory".to_string(),
                target: name.to_string(),
                message: "package database unreachable".to_string(),
            });
        }
        Ok(state.packages.get(name).cloned().unwrap_or_default())
    }

    fn install(&self, name: &str, version: &str) -> Result<(), MutationError> {
        let mut state = lock(&self.state);
        if state.failing_installs.contains(name) {
            return Err(MutationError::Command {
                tool: "memory".to_string(),
                action: "install",
                target: name.to_string(),
                message: "no candidate".to_string(),
            });
        }
        state
            .installs
            .push((name.to_string(), version.to_string()));
        state
            .packages
            .insert(name.to_string(), PackageStatus::installed(version));
        Ok(())
    }
}

// ============================================================================
// Services
// ============================================================================

/// A service manager call recorded by [`MemoryServiceManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Start(String),
    Stop(String),
    Restart(String),
}

#[derive(Debug, Default)]
struct ServiceStateTable {
    active: BTreeMap<String, bool>,
    calls: Vec<ServiceCall>,
    probes: usize,
    failing_probes: HashSet<String>,
    failing_calls: HashSet<String>,
}

impl ServiceStateTable {
    fn call(
        &mut self,
        call: ServiceCall,
        name: &str,
        action: &'static str,
        active: bool,
    ) -> Result<(), MutationError> {
        if self.failing_calls.contains(name) {
            return Err(MutationError::Command {
                tool: "memory".to_string(),
                action,
                target: name.to_string(),
                message: "unit failed".to_string(),
            });
        }
        self.calls.push(call);
        self.active.insert(name.to_string(), active);
        Ok(())
    }
}

/// In-memory [`ServiceManager`]. Unknown services are inactive.
#[derive(Debug, Default)]
pub struct MemoryServiceManager {
    state: Mutex<ServiceStateTable>,
}

impl MemoryServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a service as running or stopped.
    pub fn set_active(&self, name: &str, active: bool) {
        lock(&self.state).active.insert(name.to_string(), active);
    }

    /// Whether a service is currently running.
    pub fn active(&self, name: &str) -> bool {
        lock(&self.state).active.get(name).copied().unwrap_or(false)
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<ServiceCall> {
        lock(&self.state).calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Number of status queries made so far.
    pub fn probe_count(&self) -> usize {
        lock(&self.state).probes
    }

    /// Make status queries for `name` fail.
    pub fn fail_probes_for(&self, name: &str) {
        lock(&self.state).failing_probes.insert(name.to_string());
    }

    /// Make start/stop/restart of `name` fail.
    pub fn fail_calls_for(&self, name: &str) {
        lock(&self.state).failing_calls.insert(name.to_string());
    }
}

impl ServiceManager for MemoryServiceManager {
    fn is_active(&self, name: &str) -> Result<bool, ProbeError> {
        let mut state = lock(&self.state);
        state.probes += 1;
        if state.failing_probes.contains(name) {
            return Err(ProbeError::Command {
                tool: "memory".to_string(),
                target: name.to_string(),
                message: "service manager unreachable".to_string(),
            });
        }
        Ok(state.active.get(name).copied().unwrap_or(false))
    }

    fn start(&self, name: &str) -> Result<(), MutationError> {
        lock(&self.state).call(ServiceCall::Start(name.to_string()), name, "start", true)
    }

    fn stop(&self, name: &str) -> Result<(), MutationError> {
        lock(&self.state).call(ServiceCall::Stop(name.to_string()), name, "stop", false)
    }

    fn restart(&self, name: &str) -> Result<(), MutationError> {
        lock(&self.state).call(ServiceCall::Restart(name.to_string()), name, "restart", true)
    }
}

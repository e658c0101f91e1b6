//! Host filesystem probe backed by std::fs

use super::users;
use declarative::{FileStat, FileSystem, MutationError, ProbeError};
use std::fs::{self, DirBuilder, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt, PermissionsExt};
use std::path::Path;

/// The local filesystem
#[derive(Debug, Default)]
pub struct HostFileSystem;

impl HostFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn target(path: &Path) -> String {
    path.display().to_string()
}

fn not_found(what: &str, name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such {what}: {name}"))
}

/// Resolve an owner name to a uid. Numeric names are taken as ids when no
/// user of that name exists.
fn resolve_uid(name: &str) -> io::Result<u32> {
    match users::user_id(name)? {
        Some(uid) => Ok(uid),
        None => name.parse().map_err(|_| not_found("user", name)),
    }
}

fn resolve_gid(name: &str) -> io::Result<u32> {
    match users::group_id(name)? {
        Some(gid) => Ok(gid),
        None => name.parse().map_err(|_| not_found("group", name)),
    }
}

impl FileSystem for HostFileSystem {
    fn is_dir(&self, path: &Path) -> Result<bool, ProbeError> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProbeError::io("stat", target(path), e)),
        }
    }

    fn stat(&self, path: &Path) -> Result<Option<FileStat>, ProbeError> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ProbeError::io("stat", target(path), e)),
        };

        // unnamed ids are reported numerically
        let owner = users::user_name(meta.uid())
            .map_err(|e| ProbeError::io("resolve owner of", target(path), e))?
            .unwrap_or_else(|| meta.uid().to_string());
        let group = users::group_name(meta.gid())
            .map_err(|e| ProbeError::io("resolve group of", target(path), e))?
            .unwrap_or_else(|| meta.gid().to_string());

        Ok(Some(FileStat {
            mode: meta.permissions().mode() & 0o7777,
            owner,
            group,
        }))
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>, ProbeError> {
        fs::read(path).map_err(|e| ProbeError::io("read", target(path), e))
    }

    fn write(&self, path: &Path, content: &[u8]) -> Result<(), MutationError> {
        log::debug!("Writing {} bytes to {}", content.len(), path.display());
        fs::write(path, content).map_err(|e| MutationError::io("write", target(path), e))
    }

    fn chmod(&self, path: &Path, mode: u32) -> Result<(), MutationError> {
        log::debug!("chmod {:o} {}", mode, path.display());
        fs::set_permissions(path, Permissions::from_mode(mode))
            .map_err(|e| MutationError::io("chmod", target(path), e))
    }

    fn chown(&self, path: &Path, owner: &str, group: &str) -> Result<(), MutationError> {
        log::debug!("chown {owner}:{group} {}", path.display());
        let uid = resolve_uid(owner).map_err(|e| MutationError::io("chown", target(path), e))?;
        let gid = resolve_gid(group).map_err(|e| MutationError::io("chown", target(path), e))?;
        std::os::unix::fs::chown(path, Some(uid), Some(gid))
            .map_err(|e| MutationError::io("chown", target(path), e))
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> Result<(), MutationError> {
        log::debug!("mkdir -p -m {:o} {}", mode, path.display());
        DirBuilder::new()
            .recursive(true)
            .mode(mode)
            .create(path)
            .map_err(|e| MutationError::io("create directory", target(path), e))
    }
}

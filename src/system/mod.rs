//! Probes for the local host

mod dpkg;
mod fs;
mod systemd;
mod users;

pub use dpkg::DpkgPackageManager;
pub use fs::HostFileSystem;
pub use systemd::SystemdServiceManager;

use crate::runner;
use declarative::Probes;
use std::sync::Arc;

/// Probes for a Debian-family host running systemd.
pub fn host_probes() -> Probes {
    for tool in ["dpkg-query", "apt-get", "systemctl"] {
        if !runner::command_exists(tool) {
            log::warn!("{tool} not found; resources that need it will fail to probe");
        }
    }

    Probes::new(
        Arc::new(HostFileSystem::new()),
        Arc::new(DpkgPackageManager::new()),
        Arc::new(SystemdServiceManager::new()),
    )
}

//! Package probe for Debian-family hosts (dpkg-query + apt-get)

use crate::runner;
use declarative::{MutationError, PackageManager, PackageStatus, ProbeError};

const STATUS_FORMAT: &str = "${Status}\t${Version}";

/// Queries dpkg's database and installs through apt-get
#[derive(Debug)]
pub struct DpkgPackageManager {
    dpkg_query: String,
    apt_get: String,
}

impl Default for DpkgPackageManager {
    fn default() -> Self {
        Self {
            dpkg_query: "dpkg-query".to_string(),
            apt_get: "apt-get".to_string(),
        }
    }
}

impl DpkgPackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use other executables in place of dpkg-query and apt-get.
    pub fn with_programs(dpkg_query: impl Into<String>, apt_get: impl Into<String>) -> Self {
        Self {
            dpkg_query: dpkg_query.into(),
            apt_get: apt_get.into(),
        }
    }
}

/// Parse one `${Status}\t${Version}` line.
///
/// Only the "installed" status word counts; "config-files" and
/// "half-installed" leave the package absent.
fn parse_status(line: &str) -> PackageStatus {
    let (status, version) = line.trim_end().split_once('\t').unwrap_or((line, ""));
    if status.split_whitespace().last() == Some("installed") {
        PackageStatus::installed(version.trim())
    } else {
        PackageStatus::absent()
    }
}

impl PackageManager for DpkgPackageManager {
    fn query_installed(&self, name: &str) -> Result<PackageStatus, ProbeError> {
        let out = runner::run_capture(&self.dpkg_query, &["-W", "-f", STATUS_FORMAT, name])
            .map_err(|e| ProbeError::io("query package", name, e))?;

        if out.success {
            return Ok(parse_status(&out.stdout));
        }
        // dpkg-query exits 1 for packages it has never heard of
        if out.code == Some(1) {
            return Ok(PackageStatus::absent());
        }
        Err(ProbeError::Command {
            tool: self.dpkg_query.clone(),
            target: name.to_string(),
            message: out.message(),
        })
    }

    fn install(&self, name: &str, version: &str) -> Result<(), MutationError> {
        let pinned = format!("{name}={version}");
        log::info!("Installing {pinned}");
        let out = runner::run_capture(&self.apt_get, &["install", "-y", "-q", &pinned])
            .map_err(|e| MutationError::io("install", name, e))?;

        if out.success {
            Ok(())
        } else {
            Err(MutationError::Command {
                tool: self.apt_get.clone(),
                action: "install",
                target: pinned,
                message: out.message(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn fake_dpkg(dir: &Path) -> DpkgPackageManager {
        // "$4" is the package name after -W -f FORMAT
        let query = script(
            dir,
            "dpkg-query",
            r#"case "$4" in
  curl) printf 'install ok installed\t7.88.1-10+deb12u5' ;;
  old) printf 'deinstall ok config-files\t1.0' ;;
  locked) echo 'dpkg: database locked' >&2; exit 2 ;;
  *) echo "dpkg-query: no packages found matching $4" >&2; exit 1 ;;
esac"#,
        );
        let apt = script(
            dir,
            "apt-get",
            r#"[ "$4" = "curl=7.88.1" ] || { echo "E: Version not found" >&2; exit 100; }"#,
        );
        DpkgPackageManager::with_programs(query, apt)
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(
            parse_status("install ok installed\t1.24.0-2"),
            PackageStatus::installed("1.24.0-2")
        );
        assert_eq!(parse_status("deinstall ok config-files\t1.0"), PackageStatus::absent());
        assert_eq!(parse_status(""), PackageStatus::absent());
    }

    #[test]
    fn test_query_installed() {
        let temp = TempDir::new().unwrap();
        let dpkg = fake_dpkg(temp.path());

        assert_eq!(
            dpkg.query_installed("curl").unwrap(),
            PackageStatus::installed("7.88.1-10+deb12u5")
        );
        assert_eq!(dpkg.query_installed("old").unwrap(), PackageStatus::absent());
        assert_eq!(dpkg.query_installed("unknown").unwrap(), PackageStatus::absent());
    }

    #[test]
    fn test_query_failure_is_probe_error() {
        let temp = TempDir::new().unwrap();
        let dpkg = fake_dpkg(temp.path());

        let err = dpkg.query_installed("locked").unwrap_err();
        assert!(err.to_string().contains("database locked"));
    }

    #[test]
    fn test_install_pins_version() {
        let temp = TempDir::new().unwrap();
        let dpkg = fake_dpkg(temp.path());

        dpkg.install("curl", "7.88.1").unwrap();
        let err = dpkg.install("curl", "9.9").unwrap_err();
        assert!(err.to_string().contains("Version not found"));
    }

    #[test]
    fn test_missing_tool_is_io_error() {
        let dpkg = DpkgPackageManager::with_programs("converge-no-dpkg", "converge-no-apt");
        assert!(matches!(
            dpkg.query_installed("curl"),
            Err(ProbeError::Io { .. })
        ));
    }
}

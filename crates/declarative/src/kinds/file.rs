//! Managed file resource - content, permissions and ownership

use super::{Kind, invalid, required_attr};
use crate::descriptor::ResourceDescriptor;
use crate::error::{ProbeError, Result, ValidationError};
use crate::probe::FileSystem;
use crate::resource::Resource;
use crate::types::ApplyResult;
use std::path::PathBuf;
use std::sync::Arc;

pub(crate) const FIELDS: &[&str] = &["path", "name", "mode", "owner", "group", "content"];

/// Validated attributes of a managed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Directory holding the file
    pub dir: PathBuf,
    /// File name inside `dir`
    pub file_name: String,
    /// Permission bits
    pub mode: u32,
    pub owner: String,
    pub group: String,
    pub content: Vec<u8>,
}

impl FileSpec {
    pub(crate) fn parse(
        descriptor: &ResourceDescriptor,
    ) -> std::result::Result<Self, ValidationError> {
        let dir = required_attr(descriptor, "path")?;
        let file_name = required_attr(descriptor, "name")?;
        if file_name.contains('/') || file_name == "." || file_name == ".." {
            return Err(invalid(
                descriptor,
                "name",
                file_name,
                "must be a plain file name; put directories in 'path'",
            ));
        }

        let raw_mode = required_attr(descriptor, "mode")?;
        let mode = parse_mode(raw_mode).ok_or_else(|| {
            invalid(
                descriptor,
                "mode",
                raw_mode,
                "must be an octal permission string between 0 and 7777",
            )
        })?;

        let content = descriptor.attr("content").unwrap_or_default();

        Ok(Self {
            dir: PathBuf::from(dir),
            file_name: file_name.to_string(),
            mode,
            owner: required_attr(descriptor, "owner")?.to_string(),
            group: required_attr(descriptor, "group")?.to_string(),
            content: content.as_bytes().to_vec(),
        })
    }

    /// Full path of the managed file.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Parse an octal mode such as "644", "0644" or "0o644".
fn parse_mode(raw: &str) -> Option<u32> {
    let digits = raw.trim();
    let digits = digits.strip_prefix("0o").unwrap_or(digits);
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(8)) {
        return None;
    }
    u32::from_str_radix(digits, 8)
        .ok()
        .filter(|mode| *mode <= 0o7777)
}

/// What the last probe found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
enum FileFindings {
    MissingDirectory,
    MissingFile,
    Present {
        content_matches: bool,
        mode: u32,
        owner: String,
        group: String,
    },
}

/// A file whose content, mode and ownership are managed
#[derive(Debug)]
pub struct ManagedFile {
    name: String,
    dependencies: Vec<String>,
    spec: FileSpec,
    fs: Arc<dyn FileSystem>,
    findings: Option<FileFindings>,
}

impl ManagedFile {
    pub fn new(
        descriptor: &ResourceDescriptor,
        fs: Arc<dyn FileSystem>,
    ) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            name: descriptor.name.clone(),
            dependencies: descriptor.dependencies.clone(),
            spec: FileSpec::parse(descriptor)?,
            fs,
            findings: None,
        })
    }

    pub fn spec(&self) -> &FileSpec {
        &self.spec
    }

    fn inspect(&self) -> std::result::Result<FileFindings, ProbeError> {
        if !self.fs.is_dir(&self.spec.dir)? {
            return Ok(FileFindings::MissingDirectory);
        }

        let path = self.spec.file_path();
        let Some(stat) = self.fs.stat(&path)? else {
            return Ok(FileFindings::MissingFile);
        };

        let content = self.fs.read(&path)?;
        Ok(FileFindings::Present {
            content_matches: content == self.spec.content,
            mode: stat.mode & 0o7777,
            owner: stat.owner,
            group: stat.group,
        })
    }

    fn drifted(&self, findings: &FileFindings) -> bool {
        match findings {
            FileFindings::MissingDirectory => {
                log::debug!("{}: directory {} missing", self.name, self.spec.dir.display());
                true
            }
            FileFindings::MissingFile => {
                log::debug!("{}: file {} missing", self.name, self.spec.file_path().display());
                true
            }
            FileFindings::Present {
                content_matches,
                mode,
                owner,
                group,
            } => {
                let mut drifted = false;
                if !content_matches {
                    log::debug!("{}: content differs", self.name);
                    drifted = true;
                }
                if *mode != self.spec.mode {
                    log::debug!("{}: mode {:o} != {:o}", self.name, mode, self.spec.mode);
                    drifted = true;
                }
                if *owner != self.spec.owner {
                    log::debug!("{}: owner {} != {}", self.name, owner, self.spec.owner);
                    drifted = true;
                }
                if *group != self.spec.group {
                    log::debug!("{}: group {} != {}", self.name, group, self.spec.group);
                    drifted = true;
                }
                drifted
            }
        }
    }
}

impl Resource for ManagedFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> Kind {
        Kind::File
    }

    fn description(&self) -> String {
        format!(
            "File {} ({:o} {}:{})",
            self.spec.file_path().display(),
            self.spec.mode,
            self.spec.owner,
            self.spec.group
        )
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn probe_drift(&mut self) -> std::result::Result<bool, ProbeError> {
        let findings = self.inspect()?;
        let drifted = self.drifted(&findings);
        self.findings = Some(findings);
        Ok(drifted)
    }

    fn converge(&mut self) -> Result<ApplyResult> {
        let findings = match self.findings.take() {
            Some(findings) => findings,
            None => self.inspect()?,
        };

        if !self.drifted(&findings) {
            return Ok(ApplyResult::NoChange);
        }

        let path = self.spec.file_path();
        let rewrite = match &findings {
            FileFindings::MissingDirectory => {
                self.fs.mkdir_all(&self.spec.dir, self.spec.mode)?;
                true
            }
            FileFindings::MissingFile => true,
            FileFindings::Present {
                content_matches, ..
            } => !content_matches,
        };

        if rewrite {
            self.fs.write(&path, &self.spec.content)?;
        }
        self.fs.chown(&path, &self.spec.owner, &self.spec.group)?;
        self.fs.chmod(&path, self.spec.mode)?;

        log::debug!("{}: converged {}", self.name, path.display());

        match findings {
            FileFindings::MissingDirectory | FileFindings::MissingFile => Ok(ApplyResult::Created),
            FileFindings::Present { .. } => Ok(ApplyResult::Modified),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Ledger;
    use crate::memory::MemoryFileSystem;

    const PATH: &str = "/etc/app/config.conf";

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("app_config", "file")
            .with_attr("path", "/etc/app")
            .with_attr("name", "config.conf")
            .with_attr("mode", "644")
            .with_attr("owner", "root")
            .with_attr("group", "root")
            .with_attr("content", "X=1")
    }

    fn managed(fs: &Arc<MemoryFileSystem>) -> ManagedFile {
        ManagedFile::new(&descriptor(), fs.clone()).unwrap()
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("644"), Some(0o644));
        assert_eq!(parse_mode("0644"), Some(0o644));
        assert_eq!(parse_mode("0o600"), Some(0o600));
        assert_eq!(parse_mode("4755"), Some(0o4755));
        assert_eq!(parse_mode("648"), None);
        assert_eq!(parse_mode("17777"), None);
        assert_eq!(parse_mode("rw-r--r--"), None);
        assert_eq!(parse_mode(""), None);
    }

    #[test]
    fn test_name_must_be_plain() {
        let desc = descriptor().with_attr("name", "conf.d/app.conf");
        assert!(matches!(
            FileSpec::parse(&desc),
            Err(ValidationError::InvalidValue { ref field, .. }) if field == "name"
        ));
    }

    #[test]
    fn test_missing_directory_is_created() {
        let fs = Arc::new(MemoryFileSystem::new());
        let mut file = managed(&fs);

        assert!(file.detect_drift(&Ledger::new()).unwrap());
        assert_eq!(file.converge().unwrap(), ApplyResult::Created);

        assert_eq!(fs.dir_mode("/etc/app"), Some(0o644));
        let written = fs.file(PATH).unwrap();
        assert_eq!(written.content, b"X=1");
        assert_eq!(written.mode, 0o644);
        assert!(!file.detect_drift(&Ledger::new()).unwrap());
    }

    #[test]
    fn test_missing_directory_takes_declared_mode() {
        let fs = Arc::new(MemoryFileSystem::new());
        let desc = descriptor().with_attr("mode", "0600");
        let mut file = ManagedFile::new(&desc, fs.clone()).unwrap();

        assert!(file.detect_drift(&Ledger::new()).unwrap());
        file.converge().unwrap();

        assert_eq!(fs.dir_mode("/etc/app"), Some(0o600));
        assert_eq!(fs.file(PATH).unwrap().mode, 0o600);
    }

    #[test]
    fn test_in_sync_is_noop() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file(PATH, "X=1", 0o644, "root", "root");
        let mut file = managed(&fs);

        assert!(!file.detect_drift(&Ledger::new()).unwrap());
        assert_eq!(file.converge().unwrap(), ApplyResult::NoChange);
        assert!(fs.mutations().is_empty());
    }

    #[test]
    fn test_mode_only_drift_reapplies_everything_but_content() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file(PATH, "X=1", 0o600, "root", "root");
        let mut file = managed(&fs);

        assert!(file.detect_drift(&Ledger::new()).unwrap());
        assert_eq!(file.converge().unwrap(), ApplyResult::Modified);
        assert_eq!(
            fs.mutations(),
            vec![format!("chown {PATH}"), format!("chmod {PATH}")]
        );
        assert_eq!(fs.file(PATH).unwrap().mode, 0o644);
    }

    #[test]
    fn test_content_drift_rewrites() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file(PATH, "X=2", 0o644, "app", "root");
        let mut file = managed(&fs);

        assert!(file.detect_drift(&Ledger::new()).unwrap());
        assert_eq!(file.converge().unwrap(), ApplyResult::Modified);

        let written = fs.file(PATH).unwrap();
        assert_eq!(written.content, b"X=1");
        assert_eq!(written.owner, "root");
    }

    #[test]
    fn test_converge_reuses_findings() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file(PATH, "X=1", 0o600, "root", "root");
        let mut file = managed(&fs);

        file.detect_drift(&Ledger::new()).unwrap();
        let probes = fs.probe_count();
        file.converge().unwrap();
        assert_eq!(fs.probe_count(), probes);
    }

    #[test]
    fn test_converge_without_detect_probes_first() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file(PATH, "X=1", 0o644, "root", "root");
        let mut file = managed(&fs);

        assert_eq!(file.converge().unwrap(), ApplyResult::NoChange);
        assert!(fs.probe_count() > 0);
    }

    #[test]
    fn test_dependency_drift_without_live_drift() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file(PATH, "X=1", 0o644, "root", "root");
        let desc = descriptor().depends_on("base");
        let mut file = ManagedFile::new(&desc, fs.clone()).unwrap();

        let mut ledger = Ledger::new();
        ledger.mark_changed("base");

        assert!(file.detect_drift(&ledger).unwrap());
        assert_eq!(file.converge().unwrap(), ApplyResult::NoChange);
        assert!(fs.mutations().is_empty());
    }

    #[test]
    fn test_probe_failure_surfaces() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.fail_probes_for("/etc/app");
        let mut file = managed(&fs);

        assert!(file.detect_drift(&Ledger::new()).is_err());
    }
}

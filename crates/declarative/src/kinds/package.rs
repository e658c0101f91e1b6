//! Managed package resource - installed and pinned to a version

use super::{Kind, required_attr};
use crate::descriptor::ResourceDescriptor;
use crate::error::{ProbeError, Result, ValidationError};
use crate::probe::{PackageManager, PackageStatus};
use crate::resource::Resource;
use crate::types::ApplyResult;
use std::sync::Arc;

pub(crate) const FIELDS: &[&str] = &["name", "version"];

/// Validated attributes of a managed package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Package name as known to the package manager
    pub package: String,
    /// Declared version
    pub version: String,
}

impl PackageSpec {
    pub(crate) fn parse(
        descriptor: &ResourceDescriptor,
    ) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            package: required_attr(descriptor, "name")?.to_string(),
            version: required_attr(descriptor, "version")?.to_string(),
        })
    }

    /// Whether `status` satisfies this spec.
    ///
    /// The installed version string must contain the declared one, so "1.24"
    /// is satisfied by "1.24.0-1ubuntu1" and by "2:1.24".
    pub fn is_satisfied_by(&self, status: &PackageStatus) -> bool {
        status.installed && status.version.contains(&self.version)
    }
}

/// A package that must be installed at a given version
#[derive(Debug)]
pub struct ManagedPackage {
    name: String,
    dependencies: Vec<String>,
    spec: PackageSpec,
    packages: Arc<dyn PackageManager>,
    status: Option<PackageStatus>,
}

impl ManagedPackage {
    pub fn new(
        descriptor: &ResourceDescriptor,
        packages: Arc<dyn PackageManager>,
    ) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            name: descriptor.name.clone(),
            dependencies: descriptor.dependencies.clone(),
            spec: PackageSpec::parse(descriptor)?,
            packages,
            status: None,
        })
    }

    pub fn spec(&self) -> &PackageSpec {
        &self.spec
    }
}

impl Resource for ManagedPackage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> Kind {
        Kind::Package
    }

    fn description(&self) -> String {
        format!("Package {}={}", self.spec.package, self.spec.version)
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn probe_drift(&mut self) -> std::result::Result<bool, ProbeError> {
        let status = self.packages.query_installed(&self.spec.package)?;
        let drifted = !self.spec.is_satisfied_by(&status);
        if drifted {
            log::debug!(
                "{}: installed={} version='{}', want '{}'",
                self.name,
                status.installed,
                status.version,
                self.spec.version
            );
        }
        self.status = Some(status);
        Ok(drifted)
    }

    fn converge(&mut self) -> Result<ApplyResult> {
        let status = match self.status.take() {
            Some(status) => status,
            None => self.packages.query_installed(&self.spec.package)?,
        };

        if self.spec.is_satisfied_by(&status) {
            return Ok(ApplyResult::NoChange);
        }

        self.packages
            .install(&self.spec.package, &self.spec.version)?;

        if status.installed {
            Ok(ApplyResult::Modified)
        } else {
            Ok(ApplyResult::Created)
        }
    }
}

//! Placeholder resources - declared but never drift

use super::Kind;
use crate::descriptor::ResourceDescriptor;
use crate::error::{ProbeError, Result};
use crate::ledger::Ledger;
use crate::resource::Resource;
use crate::types::ApplyResult;

pub(crate) const TEST_FIELDS: &[&str] = &["test1", "test2"];

/// A resource with nothing behind it.
///
/// Covers the `dummy` kind (no attributes) and the `test` kind (`test1` and
/// `test2`). Neither probes anything, and dependency changes do not propagate
/// through them.
#[derive(Debug, Clone)]
pub struct Placeholder {
    name: String,
    kind: Kind,
    dependencies: Vec<String>,
}

impl Placeholder {
    pub fn new(kind: Kind, descriptor: &ResourceDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            kind,
            dependencies: descriptor.dependencies.clone(),
        }
    }
}

impl Resource for Placeholder {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> Kind {
        self.kind
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn probe_drift(&mut self) -> std::result::Result<bool, ProbeError> {
        Ok(false)
    }

    fn detect_drift(&mut self, _ledger: &Ledger) -> std::result::Result<bool, ProbeError> {
        Ok(false)
    }

    fn converge(&mut self) -> Result<ApplyResult> {
        Ok(ApplyResult::NoChange)
    }
}

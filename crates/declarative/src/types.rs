//! Core types for reconciliation results and options

use serde::{Deserialize, Serialize};

/// Result of converging a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Live state already matched, nothing was touched
    NoChange,
    /// Resource was created (file written, package installed)
    Created,
    /// Existing resource was brought back in line
    Modified,
    /// Service was started
    Started,
    /// Service was stopped
    Stopped,
    /// Service was restarted because a dependency changed
    Restarted,
    /// Convergence failed
    Failed { error: String },
    /// Convergence was not attempted
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change to live state
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::Modified | Self::Started | Self::Stopped | Self::Restarted
        )
    }
}

/// Outcome of a drift check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriftOutcome {
    /// Live state matches and no dependency changed
    InSync,
    /// Live state differs or a dependency changed
    Drifted,
    /// Live state could not be read
    Unknown { error: String },
}

impl DriftOutcome {
    /// Whether the resource must be treated as changed.
    ///
    /// Unknown counts as changed so that dependents are not silently skipped.
    pub fn is_changed(&self) -> bool {
        !matches!(self, Self::InSync)
    }

    /// The plain drift flag, `None` when unknown.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::InSync => Some(false),
            Self::Drifted => Some(true),
            Self::Unknown { .. } => None,
        }
    }
}

/// Per-resource line of a run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceOutcome {
    /// Resource name
    pub name: String,
    /// Kind tag
    pub kind: String,
    /// Drift check result
    pub drift: DriftOutcome,
    /// Convergence result, `None` in check-only mode
    pub apply: Option<ApplyResult>,
}

impl ResourceOutcome {
    /// Whether probing or converging this resource failed.
    pub fn is_failure(&self) -> bool {
        matches!(self.drift, DriftOutcome::Unknown { .. })
            || self.apply.as_ref().is_some_and(|a| !a.is_success())
    }
}

/// Summary of a reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub in_sync: usize,
    pub drifted: usize,
    pub unknown: usize,
    pub changed: usize,
    pub no_change: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    /// Check if the pass was fully successful (no probe or converge failures)
    pub fn is_success(&self) -> bool {
        self.unknown == 0 && self.failed == 0
    }

    /// Total number of resources evaluated
    pub fn total(&self) -> usize {
        self.in_sync + self.drifted + self.unknown
    }

    /// Add one resource outcome to the summary
    pub fn add_outcome(&mut self, outcome: &ResourceOutcome) {
        match outcome.drift {
            DriftOutcome::InSync => self.in_sync += 1,
            DriftOutcome::Drifted => self.drifted += 1,
            DriftOutcome::Unknown { .. } => self.unknown += 1,
        }
        match &outcome.apply {
            None => {}
            Some(ApplyResult::NoChange) => self.no_change += 1,
            Some(ApplyResult::Failed { .. }) => self.failed += 1,
            Some(ApplyResult::Skipped { .. }) => self.skipped += 1,
            Some(_) => self.changed += 1,
        }
    }
}

/// Everything a pass found and did, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Whether the pass was check-only
    pub check_only: bool,
    /// One entry per resource, in declaration order
    pub resources: Vec<ResourceOutcome>,
    /// Names recorded in the ledger during the pass, sorted
    pub changed: Vec<String>,
    /// Aggregated counts
    pub summary: RunSummary,
}

impl RunReport {
    /// Names of resources whose drift was detected or unknown.
    pub fn drifted(&self) -> impl Iterator<Item = &str> {
        self.resources
            .iter()
            .filter(|r| r.drift.is_changed())
            .map(|r| r.name.as_str())
    }

    /// Outcomes of resources that failed to probe or converge.
    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.resources.iter().filter(|r| r.is_failure())
    }

    /// Look up a resource outcome by name.
    pub fn get(&self, name: &str) -> Option<&ResourceOutcome> {
        self.resources.iter().find(|r| r.name == name)
    }
}

/// Options for a reconciliation pass
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Only detect and report drift, never converge
    pub check_only: bool,
    /// Number of resources evaluated concurrently within a dependency level
    pub jobs: usize,
}

impl RunOptions {
    /// Sequential check-only pass.
    pub fn check() -> Self {
        Self {
            check_only: true,
            ..Self::default()
        }
    }

    /// Sequential apply pass.
    pub fn apply() -> Self {
        Self::default()
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            check_only: false,
            jobs: 1,
        }
    }
}

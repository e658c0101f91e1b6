//! Reporting sink for reconciliation passes
//!
//! The engine reports through this trait so the crate stays free of any
//! particular terminal or output format.

use crate::kinds::Kind;
use crate::types::{ApplyResult, DriftOutcome, RunReport};

/// Receives per-resource results as a pass progresses
pub trait ReportSink: Send {
    /// Called once validation passed, before any probe runs
    fn on_run_start(&mut self, count: usize, check_only: bool);

    /// Called when a resource's drift is known and recorded in the ledger
    fn on_drift(&mut self, name: &str, kind: Kind, drift: &DriftOutcome);

    /// Called after a resource was converged (never in check-only mode)
    fn on_converged(&mut self, name: &str, result: &ApplyResult);

    /// Called once at the end of the pass
    fn on_run_complete(&mut self, report: &RunReport);
}

/// No-op sink
pub struct NoReport;

impl ReportSink for NoReport {
    fn on_run_start(&mut self, _count: usize, _check_only: bool) {}
    fn on_drift(&mut self, _name: &str, _kind: Kind, _drift: &DriftOutcome) {}
    fn on_converged(&mut self, _name: &str, _result: &ApplyResult) {}
    fn on_run_complete(&mut self, _report: &RunReport) {}
}

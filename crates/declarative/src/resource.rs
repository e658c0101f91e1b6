//! Resource trait for drift detection and convergence
//!
//! A Resource wraps one validated descriptor for the duration of a single
//! pass. It answers "does live state differ from what was declared?" and knows
//! how to make it match.

use crate::error::{ProbeError, Result};
use crate::kinds::Kind;
use crate::ledger::Ledger;
use crate::types::ApplyResult;
use std::fmt;

/// Core trait implemented by every resource kind
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyResult, Kind, Ledger, ProbeError, Resource};
///
/// #[derive(Debug)]
/// struct Marker { name: String, present: bool }
///
/// impl Resource for Marker {
///     fn name(&self) -> &str { &self.name }
///     fn kind(&self) -> Kind { Kind::Generic }
///     fn dependencies(&self) -> &[String] { &[] }
///     fn probe_drift(&mut self) -> Result<bool, ProbeError> { Ok(!self.present) }
///     fn converge(&mut self) -> declarative::Result<ApplyResult> {
///         self.present = true;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: Send + fmt::Debug {
    /// Unique name of the resource within the run
    fn name(&self) -> &str;

    /// Kind governing this resource
    fn kind(&self) -> Kind;

    /// Human-readable description
    fn description(&self) -> String {
        format!("{} {}", self.kind(), self.name())
    }

    /// Names of resources this one depends on
    fn dependencies(&self) -> &[String];

    /// Compare live state against declared state
    ///
    /// Performs read-only probes and returns true on any mismatch.
    /// Implementations cache what they found so that [`Resource::converge`]
    /// does not have to probe again.
    fn probe_drift(&mut self) -> std::result::Result<bool, ProbeError>;

    /// Determine whether this resource needs to be reconverged
    ///
    /// True when live state differs from declared state, or when any declared
    /// dependency has been recorded as changed in `ledger`. Live state is
    /// always probed, even if a dependency already forces drift, so the
    /// findings are available to `converge`.
    fn detect_drift(&mut self, ledger: &Ledger) -> std::result::Result<bool, ProbeError> {
        let live = self.probe_drift()?;
        let propagated = ledger.any_changed(self.dependencies());
        if propagated && !live {
            log::debug!("{}: in sync, but a dependency changed", self.name());
        }
        Ok(live || propagated)
    }

    /// Bring live state in line with declared state
    ///
    /// Must be safe to call when nothing drifted; in that case it returns
    /// [`ApplyResult::NoChange`] without mutating anything.
    fn converge(&mut self) -> Result<ApplyResult>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;

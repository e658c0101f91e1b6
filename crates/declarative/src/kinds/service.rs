//! Managed service resource - running or stopped, restarted on dependency change

use super::{Kind, invalid, required_attr};
use crate::descriptor::ResourceDescriptor;
use crate::error::{ProbeError, Result, ValidationError};
use crate::ledger::Ledger;
use crate::probe::ServiceManager;
use crate::resource::Resource;
use crate::types::ApplyResult;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub(crate) const FIELDS: &[&str] = &["name", "state"];

/// Declared activity of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    Stopped,
}

impl FromStr for ServiceState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown service state: {other}")),
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Validated attributes of a managed service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    /// Unit name as known to the service manager
    pub unit: String,
    pub state: ServiceState,
}

impl ServiceSpec {
    pub(crate) fn parse(
        descriptor: &ResourceDescriptor,
    ) -> std::result::Result<Self, ValidationError> {
        let raw_state = required_attr(descriptor, "state")?;
        let state = raw_state.parse().map_err(|_| {
            invalid(
                descriptor,
                "state",
                raw_state,
                "must be 'running' or 'stopped'",
            )
        })?;

        Ok(Self {
            unit: required_attr(descriptor, "name")?.to_string(),
            state,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ServiceFindings {
    active: bool,
    restart_required: bool,
}

/// A service whose activity is managed
///
/// Drift is either a mismatch between live and declared activity, or a
/// changed dependency. The two need different corrective actions: a service
/// that should run and whose dependency changed is restarted even when it is
/// already running, while a plain mismatch is fixed with start or stop.
#[derive(Debug)]
pub struct ManagedService {
    name: String,
    dependencies: Vec<String>,
    spec: ServiceSpec,
    services: Arc<dyn ServiceManager>,
    findings: Option<ServiceFindings>,
}

impl ManagedService {
    pub fn new(
        descriptor: &ResourceDescriptor,
        services: Arc<dyn ServiceManager>,
    ) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            name: descriptor.name.clone(),
            dependencies: descriptor.dependencies.clone(),
            spec: ServiceSpec::parse(descriptor)?,
            services,
            findings: None,
        })
    }

    pub fn spec(&self) -> &ServiceSpec {
        &self.spec
    }

    /// Whether the last drift check asked for a restart.
    pub fn restart_required(&self) -> bool {
        self.findings.is_some_and(|f| f.restart_required)
    }

    fn should_run(&self) -> bool {
        self.spec.state == ServiceState::Running
    }
}

impl Resource for ManagedService {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> Kind {
        Kind::Service
    }

    fn description(&self) -> String {
        format!("Service {} ({})", self.spec.unit, self.spec.state)
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    fn probe_drift(&mut self) -> std::result::Result<bool, ProbeError> {
        let active = self.services.is_active(&self.spec.unit)?;
        self.findings = Some(ServiceFindings {
            active,
            restart_required: false,
        });
        Ok(active != self.should_run())
    }

    fn detect_drift(&mut self, ledger: &Ledger) -> std::result::Result<bool, ProbeError> {
        let live = self.probe_drift()?;
        let propagated = ledger.any_changed(&self.dependencies);
        let restart_required = propagated && self.should_run();

        if let Some(findings) = self.findings.as_mut() {
            findings.restart_required = restart_required;
        }
        if restart_required {
            log::debug!("{}: dependency changed, restart required", self.name);
        } else if live {
            log::debug!("{}: should be {}", self.name, self.spec.state);
        }

        Ok(live || propagated)
    }

    fn converge(&mut self) -> Result<ApplyResult> {
        let findings = match self.findings.take() {
            Some(findings) => findings,
            None => ServiceFindings {
                active: self.services.is_active(&self.spec.unit)?,
                restart_required: false,
            },
        };

        if findings.restart_required {
            self.services.restart(&self.spec.unit)?;
            return Ok(ApplyResult::Restarted);
        }

        match (self.spec.state, findings.active) {
            (ServiceState::Running, false) => {
                self.services.start(&self.spec.unit)?;
                Ok(ApplyResult::Started)
            }
            (ServiceState::Stopped, true) => {
                self.services.stop(&self.spec.unit)?;
                Ok(ApplyResult::Stopped)
            }
            _ => Ok(ApplyResult::NoChange),
        }
    }
}

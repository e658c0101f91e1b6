//! Service probe for systemd hosts

use crate::runner;
use declarative::{MutationError, ProbeError, ServiceManager};

/// `is-active` states that mean the unit is known and not running
const INACTIVE_STATES: &[&str] = &["inactive", "failed", "activating", "deactivating", "unknown"];

/// Drives units through systemctl
#[derive(Debug)]
pub struct SystemdServiceManager {
    systemctl: String,
}

impl Default for SystemdServiceManager {
    fn default() -> Self {
        Self {
            systemctl: "systemctl".to_string(),
        }
    }
}

impl SystemdServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another executable in place of systemctl.
    pub fn with_program(systemctl: impl Into<String>) -> Self {
        Self {
            systemctl: systemctl.into(),
        }
    }

    fn control(&self, action: &'static str, unit: &str) -> Result<(), MutationError> {
        log::info!("systemctl {action} {unit}");
        let out = runner::run_capture(&self.systemctl, &[action, unit])
            .map_err(|e| MutationError::io(action, unit, e))?;

        if out.success {
            Ok(())
        } else {
            Err(MutationError::Command {
                tool: self.systemctl.clone(),
                action,
                target: unit.to_string(),
                message: out.message(),
            })
        }
    }
}

impl ServiceManager for SystemdServiceManager {
    /// Exit 0 means active. A non-zero exit is only "not running" when
    /// systemctl names an inactive state; anything else (bus errors,
    /// permission problems) is a failed query.
    fn is_active(&self, name: &str) -> Result<bool, ProbeError> {
        let out = runner::run_capture(&self.systemctl, &["is-active", name])
            .map_err(|e| ProbeError::io("query service", name, e))?;

        if out.success {
            return Ok(true);
        }

        let state = out.stdout.lines().next().unwrap_or("").trim();
        if out.stderr.trim().is_empty() && INACTIVE_STATES.contains(&state) {
            log::trace!("{name} is {state}");
            return Ok(false);
        }

        Err(ProbeError::Command {
            tool: self.systemctl.clone(),
            target: name.to_string(),
            message: out.message(),
        })
    }

    fn start(&self, name: &str) -> Result<(), MutationError> {
        self.control("start", name)
    }

    fn stop(&self, name: &str) -> Result<(), MutationError> {
        self.control("stop", name)
    }

    fn restart(&self, name: &str) -> Result<(), MutationError> {
        self.control("restart", name)
    }
}

use std::fmt;
use tracing::{debug, info, warn};

use super::inspector::StatusInspector;
use super::ServiceError;
use crate::report::Reporter;
use crate::state::{ServiceEnsure, ServiceSpec};
use crate::system::{CommandRunner, Invocation};

/// Options controlling service convergence
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceOptions {
    /// Suppress the restart of services that are already running
    pub no_restart: bool,
}

/// Action issued against a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Enable,
    Disable,
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    pub fn verb(&self) -> &'static str {
        match self {
            ServiceAction::Enable => "enable",
            ServiceAction::Disable => "disable",
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Converge services toward their declared policy.
///
/// The manager configuration is reloaded first, unconditionally. A unit that
/// does not exist aborts the whole run. A unit declared `running` that is
/// already active is restarted on every run unless `no_restart` is set.
pub async fn converge_services(
    specs: &[ServiceSpec],
    inspector: &dyn StatusInspector,
    runner: &dyn CommandRunner,
    options: ServiceOptions,
    reporter: &mut Reporter,
) -> Result<Vec<(String, ServiceAction)>, ServiceError> {
    let reload = Invocation::new("systemctl", ["daemon-reload"]).privileged();
    runner.run(&reload).await?;

    let mut actions = Vec::new();

    for spec in specs {
        let unit = spec.name.as_str();

        if !inspector.exists(unit).await? {
            reporter.error(&format!("service {} does not exist", unit));
            return Err(ServiceError::NotFound(unit.to_string()));
        }

        let active = inspector.is_active(unit).await?;
        let enabled = inspector.is_enabled(unit).await?;
        debug!(unit, active, enabled, "Service status");

        match spec.enabled {
            Some(false) if enabled => {
                issue(runner, unit, ServiceAction::Disable).await?;
                reporter.action(&format!("disabled service {}", unit));
                actions.push((unit.to_string(), ServiceAction::Disable));
            }
            Some(true) if !enabled => {
                issue(runner, unit, ServiceAction::Enable).await?;
                reporter.action(&format!("enabled service {}", unit));
                actions.push((unit.to_string(), ServiceAction::Enable));
            }
            _ => {}
        }

        match spec.ensure {
            Some(ServiceEnsure::Stopped) if active => {
                issue(runner, unit, ServiceAction::Stop).await?;
                reporter.action(&format!("stopped service {}", unit));
                actions.push((unit.to_string(), ServiceAction::Stop));
            }
            Some(ServiceEnsure::Running) if !active => {
                reporter.action(&format!("starting service {}", unit));
                issue(runner, unit, ServiceAction::Start).await?;
                actions.push((unit.to_string(), ServiceAction::Start));
            }
            Some(ServiceEnsure::Running) if !options.no_restart => {
                reporter.action(&format!("restarting service {}", unit));
                issue(runner, unit, ServiceAction::Restart).await?;
                actions.push((unit.to_string(), ServiceAction::Restart));
            }
            _ => {}
        }
    }

    Ok(actions)
}

async fn issue(
    runner: &dyn CommandRunner,
    unit: &str,
    action: ServiceAction,
) -> Result<(), ServiceError> {
    let invocation = Invocation::new("systemctl", [action.verb(), unit]).privileged();
    let output = runner.run(&invocation).await?;
    if output.success() {
        info!(unit, action = %action, "Service action issued");
    } else {
        warn!(unit, action = %action, code = ?output.code, stderr = %output.stderr.trim(), "Service command exited non-zero");
    }
    Ok(())
}

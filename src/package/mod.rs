//! Package reconciliation through dpkg/apt.
//!
//! Install and purge are fire-and-forget: their exit status is logged but
//! never checked, so a failed install is only visible on the next run.

use crate::report::Reporter;
use crate::state::{PackageEnsure, PackageSpec};
use crate::system::{CommandError, CommandRunner, Invocation};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Action issued for a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    Install,
    Purge,
}

/// Query whether a package is currently installed
pub async fn is_installed(runner: &dyn CommandRunner, name: &str) -> Result<bool, PackageError> {
    let query = Invocation::new("dpkg-query", ["-W", "-f=${Status}", name]).privileged();
    let output = runner.run(&query).await?;
    Ok(output.success() && parse_installed(&output.stdout))
}

/// dpkg status words, e.g. `install ok installed`
pub fn parse_installed(status: &str) -> bool {
    status.split_whitespace().last() == Some("installed")
}

/// Converge packages toward their declared state
pub async fn converge_packages(
    specs: &[PackageSpec],
    runner: &dyn CommandRunner,
    reporter: &mut Reporter,
) -> Result<Vec<(String, PackageAction)>, PackageError> {
    let mut actions = Vec::new();

    for spec in specs {
        let installed = is_installed(runner, &spec.name).await?;
        debug!(package = %spec.name, installed, ensure = %spec.ensure, "Package status");

        let action = match (spec.ensure, installed) {
            (PackageEnsure::Installed, false) => PackageAction::Install,
            (PackageEnsure::Purged, true) => PackageAction::Purge,
            _ => continue,
        };

        let (verb, report) = match action {
            PackageAction::Install => ("install", "installed"),
            PackageAction::Purge => ("purge", "purged"),
        };
        let invocation =
            Invocation::new("apt-get", [verb, "-y", spec.name.as_str()]).privileged();
        let output = runner.run(&invocation).await?;
        debug!(package = %spec.name, code = ?output.code, "Package command finished (unchecked)");

        reporter.action(&format!("{} package {}", report, spec.name));
        actions.push((spec.name.clone(), action));
    }

    Ok(actions)
}

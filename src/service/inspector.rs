use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::ServiceError;
use crate::system::{CommandOutput, CommandRunner, Invocation};

/// Unit loaded and persistently enabled (`enabled` or `static`)
static LOADED_ENABLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*Loaded:\s+loaded\s+\([^;)]*;\s*(enabled|static)\s*[;)]")
        .expect("valid regex")
});

/// Unit active in a running, waiting or exited substate
static ACTIVE_SUBSTATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*Active:\s+active\s+\((running|waiting|exited)\)").expect("valid regex")
});

static NOT_FOUND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(could not be found|^\s*Loaded:\s+not-found)").expect("valid regex")
});

/// Three questions asked about a named unit
#[async_trait]
pub trait StatusInspector: Send + Sync {
    async fn exists(&self, unit: &str) -> Result<bool, ServiceError>;
    async fn is_active(&self, unit: &str) -> Result<bool, ServiceError>;
    async fn is_enabled(&self, unit: &str) -> Result<bool, ServiceError>;
}

/// Answers status questions by parsing `systemctl status`
pub struct SystemctlInspector<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> SystemctlInspector<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    async fn status(&self, unit: &str) -> Result<CommandOutput, ServiceError> {
        let invocation = Invocation::new("systemctl", ["status", "--no-pager", unit]).privileged();
        Ok(self.runner.run(&invocation).await?)
    }
}

#[async_trait]
impl StatusInspector for SystemctlInspector<'_> {
    async fn exists(&self, unit: &str) -> Result<bool, ServiceError> {
        Ok(parse_exists(&self.status(unit).await?))
    }

    async fn is_active(&self, unit: &str) -> Result<bool, ServiceError> {
        Ok(parse_active(&self.status(unit).await?.stdout))
    }

    async fn is_enabled(&self, unit: &str) -> Result<bool, ServiceError> {
        Ok(parse_enabled(&self.status(unit).await?.stdout))
    }
}

pub fn parse_exists(output: &CommandOutput) -> bool {
    !(NOT_FOUND.is_match(&output.stdout) || NOT_FOUND.is_match(&output.stderr))
}

pub fn parse_active(status: &str) -> bool {
    ACTIVE_SUBSTATE.is_match(status)
}

pub fn parse_enabled(status: &str) -> bool {
    LOADED_ENABLED.is_match(status)
}

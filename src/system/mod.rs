//! External command invocation.
//!
//! Every OS collaborator (package tool, service manager) is reached through
//! [`CommandRunner`] so reconcilers can be exercised with a recording fake.
//! Commands run one at a time and are awaited to completion; there is no
//! timeout and no cancellation.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A single external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Run with elevated privilege
    pub privileged: bool,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            privileged: false,
        }
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, None when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion and capture its output.
    /// A non-zero exit is not an error; only failing to launch is.
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;
}

/// Runs commands on the local host, escalating through `sudo` when needed
#[derive(Debug, Clone)]
pub struct SystemRunner {
    escalate: bool,
}

impl SystemRunner {
    /// Escalate privileged commands unless already running as root
    pub fn new() -> Self {
        Self {
            escalate: !nix::unistd::geteuid().is_root(),
        }
    }

    fn command_for(&self, invocation: &Invocation) -> Command {
        if invocation.privileged && self.escalate {
            let mut command = Command::new("sudo");
            command.arg(&invocation.program).args(&invocation.args);
            command
        } else {
            let mut command = Command::new(&invocation.program);
            command.args(&invocation.args);
            command
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        debug!(command = %invocation, privileged = invocation.privileged, "Running command");

        let output = self
            .command_for(invocation)
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                command: invocation.to_string(),
                source,
            })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        debug!(command = %invocation, code = ?result.code, "Command finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_display() {
        let invocation = Invocation::new("systemctl", ["restart", "nginx"]).privileged();
        assert_eq!(invocation.to_string(), "systemctl restart nginx");
        assert!(invocation.privileged);
    }

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let runner = SystemRunner { escalate: false };
        let output = runner
            .run(&Invocation::new("sh", ["-c", "echo out; echo err >&2; exit 3"]))
            .await
            .unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_system_runner_missing_program() {
        let runner = SystemRunner { escalate: false };
        let result = runner
            .run(&Invocation::new("/nonexistent/program", Vec::<String>::new()))
            .await;
        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }
}

#![allow(dead_code)]

use async_trait::async_trait;
use hostconverge::{
    CommandError, CommandOutput, CommandRunner, Invocation, ServiceError, StatusInspector,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;
use tokio::fs;

/// Create a temporary directory for testing
pub fn create_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Write a file, creating parent directories
pub async fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .expect("Should create parent dirs");
    }
    fs::write(path, content).await.expect("Should write file");
}

/// Command runner that records every invocation and answers from a table
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    responses: HashMap<String, CommandOutput>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `command` (as displayed, e.g. "systemctl restart nginx")
    pub fn respond(mut self, command: &str, code: i32, stdout: &str) -> Self {
        self.responses.insert(
            command.to_string(),
            CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        );
        self
    }

    /// Every command issued so far, as displayed
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Commands issued that are not read-only queries
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("dpkg-query") && !c.starts_with("systemctl status"))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok(self
            .responses
            .get(&invocation.to_string())
            .cloned()
            .unwrap_or(CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }))
    }
}

/// Status inspector backed by a table of (active, enabled) per unit
#[derive(Default)]
pub struct FakeInspector {
    units: HashMap<String, (bool, bool)>,
}

impl FakeInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(mut self, name: &str, active: bool, enabled: bool) -> Self {
        self.units.insert(name.to_string(), (active, enabled));
        self
    }
}

#[async_trait]
impl StatusInspector for FakeInspector {
    async fn exists(&self, unit: &str) -> Result<bool, ServiceError> {
        Ok(self.units.contains_key(unit))
    }

    async fn is_active(&self, unit: &str) -> Result<bool, ServiceError> {
        Ok(self.units.get(unit).map(|u| u.0).unwrap_or(false))
    }

    async fn is_enabled(&self, unit: &str) -> Result<bool, ServiceError> {
        Ok(self.units.get(unit).map(|u| u.1).unwrap_or(false))
    }
}

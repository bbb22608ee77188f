//! Runs the reconcilers for each module: packages, then files, then services.
//!
//! Modules are processed one after another. Any fatal error stops the run
//! where it happened; nothing already applied is rolled back.

use crate::config::{ConfigError, EngineConfig};
use crate::package::{converge_packages, PackageAction, PackageError};
use crate::reconciliation::{converge_files, FileError, FileSummary, Verb};
use crate::report::Reporter;
use crate::service::{converge_services, ServiceAction, ServiceError, ServiceOptions, StatusInspector};
use crate::state::{read_desired_state, StateError};
use crate::system::CommandRunner;
use crate::template::{TemplateContext, TemplateEngine};
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConvergeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Module directory not found: {0}")]
    MissingSourceDirectory(String),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Package error: {0}")]
    Package(#[from] PackageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ConvergeError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ConvergeError::Config(_) | ConvergeError::State(_) => 2,
            _ => 1,
        }
    }
}

/// Options for a whole run
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub no_restart: bool,
}

/// What one module's convergence did
#[derive(Debug, Clone, Default)]
pub struct ModuleReport {
    pub name: String,
    pub packages: Vec<(String, PackageAction)>,
    pub files: FileSummary,
    pub services: Vec<(String, ServiceAction)>,
}

impl ModuleReport {
    pub fn change_count(&self) -> usize {
        self.packages.len() + self.files.changes() + self.services.len()
    }
}

/// Ties configuration, OS collaborators and global variables together
pub struct Engine<'a> {
    config: &'a EngineConfig,
    runner: &'a dyn CommandRunner,
    inspector: &'a dyn StatusInspector,
    templates: TemplateEngine,
    globals: Map<String, Value>,
    options: RunOptions,
}

impl<'a> Engine<'a> {
    pub fn new(
        config: &'a EngineConfig,
        runner: &'a dyn CommandRunner,
        inspector: &'a dyn StatusInspector,
        globals: Map<String, Value>,
        options: RunOptions,
    ) -> Self {
        Self {
            config,
            runner,
            inspector,
            templates: TemplateEngine::new(),
            globals,
            options,
        }
    }

    /// Converge a single named module
    pub async fn converge_module(
        &self,
        name: &str,
        reporter: &mut Reporter,
    ) -> Result<ModuleReport, ConvergeError> {
        let module_path = self.config.module_path(name);
        if !module_path.is_dir() {
            return Err(ConvergeError::MissingSourceDirectory(
                module_path.display().to_string(),
            ));
        }

        info!(module = %name, "Converging module");
        reporter.module(name);

        let state = read_desired_state(&module_path.join(&self.config.state_file)).await?;
        let context = TemplateContext::merge(&self.globals, &state.variables);

        let mut report = ModuleReport {
            name: name.to_string(),
            ..Default::default()
        };

        report.packages = converge_packages(&state.packages, self.runner, reporter).await?;

        report.files = converge_files(
            &module_path.join(&self.config.files_dir),
            &self.config.destination_root,
            &self.templates,
            &context,
            &self.config.template_suffix,
            reporter,
        )
        .await?;

        let service_options = ServiceOptions {
            no_restart: self.options.no_restart,
        };
        report.services = converge_services(
            &state.services,
            self.inspector,
            self.runner,
            service_options,
            reporter,
        )
        .await?;

        info!(module = %name, changes = report.change_count(), "Module converged");
        Ok(report)
    }

    /// Converge every module, in name order
    pub async fn converge_all(
        &self,
        reporter: &mut Reporter,
    ) -> Result<Vec<ModuleReport>, ConvergeError> {
        let modules = list_modules(&self.config.modules_dir).await?;
        let mut reports = Vec::with_capacity(modules.len());
        for name in modules {
            reports.push(self.converge_module(&name, reporter).await?);
        }
        Ok(reports)
    }
}

/// Names of the module directories under `modules_dir`, sorted
pub async fn list_modules(modules_dir: &Path) -> Result<Vec<String>, ConvergeError> {
    if !modules_dir.is_dir() {
        return Err(ConvergeError::MissingSourceDirectory(
            modules_dir.display().to_string(),
        ));
    }

    let mut names = Vec::new();
    let mut entries = fs::read_dir(modules_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Print the end-of-run totals
pub fn report_summary(reports: &[ModuleReport], reporter: &mut Reporter) {
    let mut created = 0;
    let mut updated = 0;
    let mut failed = 0;
    let mut packages = 0;
    let mut services = 0;
    for report in reports {
        created += report.files.count(Verb::Create);
        updated += report.files.count(Verb::Update);
        failed += report.files.failures.len();
        packages += report.packages.len();
        services += report.services.len();
    }

    reporter.section("summary");
    reporter.plain(&format!(
        "{} module(s): {} created, {} updated, {} skipped with errors, {} package action(s), {} service action(s)",
        reports.len(),
        created,
        updated,
        failed,
        packages,
        services
    ));
}

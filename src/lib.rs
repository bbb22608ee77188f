pub mod config;
pub mod orchestrator;
pub mod package;
pub mod reconciliation;
pub mod report;
pub mod service;
pub mod state;
pub mod system;
pub mod template;
pub mod utils;

// Re-export commonly used types
pub use config::{read_config, ConfigError, EngineConfig};
pub use orchestrator::{list_modules, report_summary, ConvergeError, Engine, ModuleReport, RunOptions};
pub use package::{converge_packages, PackageAction, PackageError};
pub use reconciliation::{
    converge_files, EntryKind, FileError, FileReconciler, FileSummary, FileTreeEntry,
    ReconciliationAction, Verb,
};
pub use report::{render_diff, Reporter};
pub use service::{
    converge_services, ServiceAction, ServiceError, ServiceOptions, StatusInspector,
    SystemctlInspector,
};
pub use state::{
    parse_desired_state, read_desired_state, read_globals, DesiredState, PackageEnsure,
    PackageSpec, ServiceEnsure, ServiceSpec, StateError,
};
pub use system::{CommandError, CommandOutput, CommandRunner, Invocation, SystemRunner};
pub use template::{TemplateContext, TemplateEngine, TemplateError};

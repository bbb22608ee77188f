//! File tree reconciliation.
//!
//! A module's `files/` directory mirrors the destination filesystem. Each
//! entry is compared with what is on disk and created or updated when its
//! content, link target, owner, group or mode differ. Files whose name ends
//! in the template suffix are rendered first and land without the suffix.

mod apply;
mod entry;
mod files;

pub use entry::{
    group_name, mode_string, owner_name, Attributes, EntryKind, FileSummary, FileTreeEntry,
    ReconciliationAction, Verb,
};
pub use files::{converge_files, FileReconciler};

use crate::template::TemplateError;
use thiserror::Error;

/// Fatal file reconciliation errors. Everything recoverable is reported
/// and recorded in [`FileSummary::failures`] instead.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Cannot render {path}: {source}")]
    UndefinedVariable {
        path: String,
        #[source]
        source: TemplateError,
    },
}

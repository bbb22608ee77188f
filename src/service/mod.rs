//! Service reconciliation against the OS service manager.

mod inspector;
mod reconcile;

pub use inspector::{parse_active, parse_enabled, parse_exists, StatusInspector, SystemctlInspector};
pub use reconcile::{converge_services, ServiceAction, ServiceOptions};

use crate::system::CommandError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service unit not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

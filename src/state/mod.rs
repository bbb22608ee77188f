//! Desired-state documents and global variables.
//!
//! Documents are YAML mappings with at most the keys `packages`, `services`
//! and `variables`. Anything else is rejected here, before the engine runs.

mod types;

pub use types::{DesiredState, PackageEnsure, PackageSpec, ServiceEnsure, ServiceSpec};

use std::path::Path;
use thiserror::Error;
use tokio::fs;
use types::{PackageBody, RawDesiredState, ServiceBody};

#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid desired state in {path}: {message}")]
    Shape { path: String, message: String },
}

/// Read a module's desired-state document. A missing file is an empty state.
pub async fn read_desired_state(path: &Path) -> Result<DesiredState, StateError> {
    if !path.exists() {
        return Ok(DesiredState::default());
    }

    let content = fs::read_to_string(path).await?;
    parse_desired_state(&content).map_err(|message| StateError::Shape {
        path: path.display().to_string(),
        message,
    })
}

/// Parse and validate a desired-state document
pub fn parse_desired_state(content: &str) -> Result<DesiredState, String> {
    if content.trim().is_empty() {
        return Ok(DesiredState::default());
    }

    let raw: Option<RawDesiredState> =
        serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    let raw = raw.unwrap_or_default();

    let mut state = DesiredState::default();

    for (key, value) in raw.packages.unwrap_or_default() {
        let name = entry_name(&key, "packages")?;
        let body: PackageBody = entry_body(value, &name)?;
        state.packages.push(PackageSpec {
            name,
            ensure: body.ensure,
        });
    }

    for (key, value) in raw.services.unwrap_or_default() {
        let name = entry_name(&key, "services")?;
        let body: ServiceBody = entry_body(value, &name)?;
        state.services.push(ServiceSpec {
            name,
            enabled: body.enabled,
            ensure: body.ensure,
        });
    }

    if let Some(variables) = raw.variables {
        state.variables = yaml_mapping_to_json(variables)?;
    }

    Ok(state)
}

/// Read the global variables file. A missing file means no globals.
pub async fn read_globals(
    path: &Path,
) -> Result<serde_json::Map<String, serde_json::Value>, StateError> {
    if !path.exists() {
        return Ok(serde_json::Map::new());
    }

    let shape_error = |message: String| StateError::Shape {
        path: path.display().to_string(),
        message,
    };

    let content = fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Ok(serde_json::Map::new());
    }
    let mapping: Option<serde_yaml::Mapping> =
        serde_yaml::from_str(&content).map_err(|e| shape_error(e.to_string()))?;
    yaml_mapping_to_json(mapping.unwrap_or_default()).map_err(shape_error)
}

fn entry_name(key: &serde_yaml::Value, section: &str) -> Result<String, String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        other => Err(format!("{} keys must be strings, got {:?}", section, other)),
    }
}

fn entry_body<T>(value: serde_yaml::Value, name: &str) -> Result<T, String>
where
    T: serde::de::DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(value).map_err(|e| format!("{}: {}", name, e))
}

fn yaml_mapping_to_json(
    mapping: serde_yaml::Mapping,
) -> Result<serde_json::Map<String, serde_json::Value>, String> {
    let mut out = serde_json::Map::new();
    for (key, value) in mapping {
        let name = entry_name(&key, "variables")?;
        let json = serde_json::to_value(&value).map_err(|e| format!("{}: {}", name, e))?;
        out.insert(name, json);
    }
    Ok(out)
}

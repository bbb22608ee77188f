use crate::utils::{DEFAULT_FILES_DIR, DEFAULT_STATE_FILE, DEFAULT_TEMPLATE_SUFFIX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config file not found: {0}")]
    NotFound(String),
}

fn default_modules_dir() -> PathBuf {
    PathBuf::from("modules")
}

fn default_destination_root() -> PathBuf {
    PathBuf::from("/")
}

fn default_template_suffix() -> String {
    DEFAULT_TEMPLATE_SUFFIX.to_string()
}

fn default_state_file() -> String {
    DEFAULT_STATE_FILE.to_string()
}

fn default_files_dir() -> String {
    DEFAULT_FILES_DIR.to_string()
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Directory holding one sub-directory per module
    #[serde(default = "default_modules_dir")]
    pub modules_dir: PathBuf,
    /// Root that module file trees are mirrored onto
    #[serde(default = "default_destination_root")]
    pub destination_root: PathBuf,
    /// Global variables shared by every module. Defaults to
    /// `globals.yaml` next to the modules directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub globals_file: Option<PathBuf>,
    #[serde(default = "default_template_suffix")]
    pub template_suffix: String,
    #[serde(default = "default_state_file")]
    pub state_file: String,
    #[serde(default = "default_files_dir")]
    pub files_dir: String,
    /// None = colour when stdout is a terminal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<bool>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            modules_dir: default_modules_dir(),
            destination_root: default_destination_root(),
            globals_file: None,
            template_suffix: default_template_suffix(),
            state_file: default_state_file(),
            files_dir: default_files_dir(),
            color: None,
        }
    }
}

impl EngineConfig {
    /// Path of the globals file, explicit or derived from the modules directory
    pub fn globals_path(&self) -> PathBuf {
        match &self.globals_file {
            Some(path) => path.clone(),
            None => self
                .modules_dir
                .parent()
                .map(|p| p.join("globals.yaml"))
                .unwrap_or_else(|| PathBuf::from("globals.yaml")),
        }
    }

    pub fn module_path(&self, module: &str) -> PathBuf {
        self.modules_dir.join(module)
    }
}

/// Read the configuration file
pub async fn read_config(config_path: &Path) -> Result<EngineConfig, ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path.display().to_string()));
    }

    let content = fs::read_to_string(config_path).await?;
    let config: EngineConfig = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: EngineConfig = serde_json::from_str(r#"{"destinationRoot": "/srv"}"#).unwrap();
        assert_eq!(config.destination_root, Path::new("/srv"));
        assert_eq!(config.modules_dir, Path::new("modules"));
        assert_eq!(config.template_suffix, ".hbs");
        assert_eq!(config.state_file, "state.yaml");
        assert!(config.color.is_none());
    }

    #[test]
    fn test_globals_path_next_to_modules_dir() {
        let config = EngineConfig {
            modules_dir: PathBuf::from("/etc/hostconverge/modules"),
            ..Default::default()
        };
        assert_eq!(
            config.globals_path(),
            Path::new("/etc/hostconverge/globals.yaml")
        );
    }

    #[tokio::test]
    async fn test_read_config_missing_file() {
        let result = read_config(Path::new("/nonexistent/hostconverge.json")).await;
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }
}

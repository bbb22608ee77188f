use serde::{Deserialize, Serialize};
use std::fmt;

/// Desired package state
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageEnsure {
    #[default]
    Installed,
    Purged,
}

/// Desired service activity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceEnsure {
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub ensure: PackageEnsure,
}

/// Service policy. `None` on either axis means "leave as is".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub enabled: Option<bool>,
    pub ensure: Option<ServiceEnsure>,
}

/// Body of a `packages` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PackageBody {
    #[serde(default)]
    pub ensure: PackageEnsure,
}

/// Body of a `services` entry
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ServiceBody {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub ensure: Option<ServiceEnsure>,
}

/// Raw document shape. Mappings stay as YAML mappings so declaration
/// order survives until the entries are converted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawDesiredState {
    #[serde(default)]
    pub packages: Option<serde_yaml::Mapping>,
    #[serde(default)]
    pub services: Option<serde_yaml::Mapping>,
    #[serde(default)]
    pub variables: Option<serde_yaml::Mapping>,
}

/// A module's validated desired state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    pub packages: Vec<PackageSpec>,
    pub services: Vec<ServiceSpec>,
    pub variables: serde_json::Map<String, serde_json::Value>,
}

impl fmt::Display for PackageEnsure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageEnsure::Installed => write!(f, "installed"),
            PackageEnsure::Purged => write!(f, "purged"),
        }
    }
}

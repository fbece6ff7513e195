//! Domain types for locator pallets.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a derived artifact (a locator), e.g. `Roads_AddressSystem_STREET`.
///
/// Doubles as the base name shared by every sidecar file of the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactName(pub String);

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ArtifactName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ArtifactName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name of an upstream source table refreshed before the pallet runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceName(pub String);

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SourceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SourceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name of a deployment environment (`Dev`, `Staging`, `Production`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnvironmentName(pub String);

impl fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EnvironmentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EnvironmentName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Outcome of the upstream refresh for one source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChangeResult {
    #[default]
    #[serde(alias = "NoChanges")]
    NoChanges,
    #[serde(alias = "Created")]
    Created,
    #[serde(alias = "Updated")]
    Updated,
    #[serde(alias = "Deleted")]
    Deleted,
    #[serde(alias = "Error")]
    Error,
}

impl ChangeResult {
    /// `true` for the results that require downstream rebuilds.
    pub fn is_change(self) -> bool {
        matches!(self, ChangeResult::Created | ChangeResult::Updated)
    }
}

impl fmt::Display for ChangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeResult::NoChanges => write!(f, "no_changes"),
            ChangeResult::Created => write!(f, "created"),
            ChangeResult::Updated => write!(f, "updated"),
            ChangeResult::Deleted => write!(f, "deleted"),
            ChangeResult::Error => write!(f, "error"),
        }
    }
}

/// Desired state for a gated service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Offline,
    Online,
}

impl ServiceState {
    /// Admin API verb that brings a service into this state.
    pub fn verb(self) -> &'static str {
        match self {
            ServiceState::Offline => "stop",
            ServiceState::Online => "start",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Offline => write!(f, "offline"),
            ServiceState::Online => write!(f, "online"),
        }
    }
}

/// Per-run upstream results, keyed by source name.
pub type ChangeResults = HashMap<SourceName, ChangeResult>;

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A running service that must be paused while its artifact is swapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBinding {
    /// Folder-qualified service name, e.g. `Geolocators/Roads_AddressSystem_STREET`.
    pub name: String,
    /// Service type, e.g. `GeocodeServer`.
    #[serde(rename = "type")]
    pub service_type: String,
}

impl fmt::Display for ServiceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.service_type)
    }
}

/// One derived artifact and what it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDecl {
    pub name: ArtifactName,
    /// Upstream sources; any one of them changing makes the artifact dirty.
    pub sources: Vec<SourceName>,
    /// Overrides the environment's `locators_path` as the live location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<PathBuf>,
    /// Replica destinations in addition to the environment's `copy_destinations`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replicas: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceBinding>,
}

/// One administration surface through which services are started and stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Server instance path segment (`https://host:port/<instance>/admin`).
    #[serde(default = "default_instance")]
    pub instance: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ChannelConfig {
    /// Username and password, only when both are present and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some((u, p)),
            _ => None,
        }
    }

    /// `https://host:6443/arcgis/admin`
    pub fn admin_url(&self) -> String {
        format!(
            "{}://{}:{}/{}/admin",
            self.scheme, self.host, self.port, self.instance
        )
    }
}

fn default_port() -> u16 {
    6443
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_instance() -> String {
    "arcgis".to_string()
}

/// Per-environment locations and channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnvironmentConfig {
    /// Canonical live location of every artifact without its own `live`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locators_path: Option<PathBuf>,
    #[serde(default)]
    pub copy_destinations: Vec<PathBuf>,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
    /// Artifacts rebuilt on every run in this environment regardless of changes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub force: Vec<ArtifactName>,
    /// Leave a failed rebuild's staging directory on disk for inspection.
    #[serde(default)]
    pub keep_failed_staging: bool,
}

/// External command that rebuilds a staged locator.
///
/// `{locator}` in `args` is replaced with the staged artifact path
/// (`<staging>/<artifact>`, no extension).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Root of the pallet YAML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PalletConfig {
    pub version: u32,
    /// Sidecar files are `<artifact>.<ext>` where `<ext>` starts with this prefix.
    #[serde(default = "default_extension_prefix")]
    pub extension_prefix: String,
    /// Extension that must exist in a rebuilt file set.
    #[serde(default = "default_primary_extension")]
    pub primary_extension: String,
    pub rebuild: RebuildCommand,
    #[serde(default)]
    pub artifacts: Vec<ArtifactDecl>,
    #[serde(default)]
    pub environments: BTreeMap<EnvironmentName, EnvironmentConfig>,
}

fn default_extension_prefix() -> String {
    "lo".to_string()
}

fn default_primary_extension() -> String {
    "loc".to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(ArtifactName::from("Roads").to_string(), "Roads");
        assert_eq!(SourceName::from("AddressPoints").to_string(), "AddressPoints");
        assert_eq!(EnvironmentName::from("Dev").to_string(), "Dev");
    }

    #[test]
    fn only_created_and_updated_are_changes() {
        assert!(ChangeResult::Created.is_change());
        assert!(ChangeResult::Updated.is_change());
        assert!(!ChangeResult::NoChanges.is_change());
        assert!(!ChangeResult::Deleted.is_change());
        assert!(!ChangeResult::Error.is_change());
    }

    #[test]
    fn change_result_accepts_snake_and_pascal_case() {
        let snake: ChangeResult = serde_yaml::from_str("no_changes").expect("snake");
        let pascal: ChangeResult = serde_yaml::from_str("Updated").expect("pascal");
        assert_eq!(snake, ChangeResult::NoChanges);
        assert_eq!(pascal, ChangeResult::Updated);
    }

    #[test]
    fn channel_without_password_has_no_credentials() {
        let channel = ChannelConfig {
            name: "extra".to_string(),
            host: "gis.example.com".to_string(),
            port: default_port(),
            scheme: default_scheme(),
            instance: default_instance(),
            username: Some("admin".to_string()),
            password: None,
        };
        assert!(channel.credentials().is_none());
        assert_eq!(channel.admin_url(), "https://gis.example.com:6443/arcgis/admin");
    }

    #[test]
    fn service_state_verbs() {
        assert_eq!(ServiceState::Offline.verb(), "stop");
        assert_eq!(ServiceState::Online.verb(), "start");
    }

    #[test]
    fn binding_display_joins_name_and_type() {
        let binding = ServiceBinding {
            name: "Geolocators/Roads_AddressSystem_STREET".to_string(),
            service_type: "GeocodeServer".to_string(),
        };
        assert_eq!(
            binding.to_string(),
            "Geolocators/Roads_AddressSystem_STREET.GeocodeServer"
        );
    }
}

//! Per-run and per-artifact results.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pallet_core::{ArtifactName, EnvironmentName, ServiceState, SourceName};

/// Final classification of one artifact in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    /// Not dirty; nothing was touched.
    Skipped,
    Succeeded,
    /// Live location untouched, services never gated.
    FailedAtRebuild { error: String },
    /// Distributed, but at least one channel failed to toggle.
    FailedAtToggle,
    /// At least one destination did not receive a verified copy.
    FailedAtDistribution,
}

impl ArtifactOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ArtifactOutcome::FailedAtRebuild { .. }
                | ArtifactOutcome::FailedAtToggle
                | ArtifactOutcome::FailedAtDistribution
        )
    }

    pub fn key(&self) -> &'static str {
        match self {
            ArtifactOutcome::Skipped => "skipped",
            ArtifactOutcome::Succeeded => "succeeded",
            ArtifactOutcome::FailedAtRebuild { .. } => "failed_at_rebuild",
            ArtifactOutcome::FailedAtToggle => "failed_at_toggle",
            ArtifactOutcome::FailedAtDistribution => "failed_at_distribution",
        }
    }
}

/// Result of one service binding on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToggleStatus {
    Toggled,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResult {
    pub channel: String,
    pub service: String,
    pub state: ServiceState,
    #[serde(flatten)]
    pub status: ToggleStatus,
}

impl ToggleResult {
    pub fn failed(&self) -> bool {
        matches!(self.status, ToggleStatus::Failed { .. })
    }
}

/// Result of copying the staged file set to one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationResult {
    pub path: PathBuf,
    /// `true` for the canonical live location, `false` for replicas.
    pub live: bool,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

impl DestinationResult {
    pub fn failed(&self) -> bool {
        matches!(self.status, DeliveryStatus::Failed { .. })
    }
}

/// Everything that happened to one declared artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub name: ArtifactName,
    #[serde(flatten)]
    pub outcome: ArtifactOutcome,
    /// Sources whose Created/Updated result made the artifact dirty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggered_by: Vec<SourceName>,
    #[serde(default)]
    pub forced: bool,
    /// Sources that reported an upstream error this run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream_errors: Vec<SourceName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offline: Vec<ToggleResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distribution: Vec<DestinationResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub online: Vec<ToggleResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleanup_error: Option<String>,
    #[serde(default)]
    pub elapsed_ms: u64,
}

impl ArtifactReport {
    pub fn new(name: ArtifactName) -> Self {
        Self {
            name,
            outcome: ArtifactOutcome::Skipped,
            triggered_by: vec![],
            forced: false,
            upstream_errors: vec![],
            digest: None,
            offline: vec![],
            distribution: vec![],
            online: vec![],
            cleanup_error: None,
            elapsed_ms: 0,
        }
    }

    /// Outcome of a processed artifact whose rebuild succeeded.
    ///
    /// Distribution failures outrank toggle failures.
    pub fn classify_completed(&self) -> ArtifactOutcome {
        if self.distribution.iter().any(DestinationResult::failed) {
            ArtifactOutcome::FailedAtDistribution
        } else if self
            .offline
            .iter()
            .chain(self.online.iter())
            .any(ToggleResult::failed)
        {
            ArtifactOutcome::FailedAtToggle
        } else {
            ArtifactOutcome::Succeeded
        }
    }
}

/// The cumulative result of one pallet run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub environment: EnvironmentName,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub artifacts: Vec<ArtifactReport>,
}

impl RunReport {
    pub fn count(&self, key: &str) -> usize {
        self.artifacts
            .iter()
            .filter(|a| a.outcome.key() == key)
            .count()
    }

    pub fn failures(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| a.outcome.is_failure())
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0
    }

    pub fn artifact(&self, name: &str) -> Option<&ArtifactReport> {
        self.artifacts.iter().find(|a| a.name.0 == name)
    }
}

use std::path::{Path, PathBuf};

use crate::types::{ArtifactName, EnvironmentName};

pub const CONFIG_FILE: &str = "locators.yaml";
pub const LOG_FILE: &str = "pallet.log";
/// Directory under a live location that holds per-artifact staging copies.
pub const STAGING_DIR: &str = "rebuilding";

pub fn pallet_root(home: &Path) -> PathBuf {
    home.join(".pallet")
}

pub fn config_path(home: &Path) -> PathBuf {
    pallet_root(home).join(CONFIG_FILE)
}

pub fn runs_dir(home: &Path) -> PathBuf {
    pallet_root(home).join("runs")
}

pub fn run_journal_path(home: &Path, environment: &EnvironmentName) -> PathBuf {
    runs_dir(home).join(format!("{}.json", environment.0))
}

pub fn logs_dir(home: &Path) -> PathBuf {
    pallet_root(home).join("logs")
}

pub fn log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(LOG_FILE)
}

/// Artifact and environment names become file and directory names. Reject
/// anything that could step outside its parent directory.
pub fn is_single_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// `<live>/rebuilding/<artifact>`, unique per artifact and reused across runs.
pub fn staging_dir(live: &Path, artifact: &ArtifactName) -> PathBuf {
    live.join(STAGING_DIR).join(&artifact.0)
}

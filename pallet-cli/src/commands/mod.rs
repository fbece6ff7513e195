pub mod check;
pub mod init;
pub mod plan;
pub mod run;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use pallet_core::{
    config, ArtifactName, ChangeResult, ChangeResults, EnvironmentName, PalletConfig, SourceName,
};

pub fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Load `--config`, or `~/.pallet/locators.yaml` when it is not given.
pub fn load_config(config: Option<&Path>) -> Result<PalletConfig> {
    match config {
        Some(path) => config::load_from(path)
            .with_context(|| format!("failed to load config '{}'", path.display())),
        None => config::load_at(&home()?)
            .context("failed to load config; run `pallet init` first"),
    }
}

/// Environment, upstream results and forced artifacts shared by `plan` and `run`.
#[derive(Args, Debug)]
pub struct ChangeArgs {
    /// Environment to operate on (e.g. Dev, Staging, Production).
    #[arg(long, short = 'e', value_name = "NAME")]
    pub env: String,

    /// YAML or JSON map of source name to refresh result
    /// (created, updated, no_changes, deleted, error).
    #[arg(long, value_name = "FILE")]
    pub changes: Option<PathBuf>,

    /// Mark a source as updated. Repeatable; applied after `--changes`.
    #[arg(long, value_name = "SOURCE")]
    pub changed: Vec<String>,

    /// Rebuild this artifact even if none of its sources changed. Repeatable.
    #[arg(long, value_name = "ARTIFACT")]
    pub force: Vec<String>,
}

impl ChangeArgs {
    pub fn environment(&self) -> EnvironmentName {
        EnvironmentName::from(self.env.as_str())
    }

    pub fn change_results(&self) -> Result<ChangeResults> {
        let mut results = match &self.changes {
            Some(path) => read_changes(path)?,
            None => ChangeResults::new(),
        };
        for source in &self.changed {
            results.insert(SourceName::from(source.as_str()), ChangeResult::Updated);
        }
        Ok(results)
    }

    pub fn forced(&self) -> Vec<ArtifactName> {
        self.force.iter().map(|f| ArtifactName::from(f.as_str())).collect()
    }
}

/// JSON is valid YAML, so one parser covers both.
fn read_changes(path: &Path) -> Result<ChangeResults> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read change results '{}'", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(ChangeResults::new());
    }
    serde_yaml::from_str(&contents)
        .with_context(|| format!("invalid change results in '{}'", path.display()))
}

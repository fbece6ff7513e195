//! Run journal: the last [`RunReport`] per environment.
//!
//! Persists JSON at `<home>/.pallet/runs/<environment>.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the config file.

use std::path::{Path, PathBuf};

use pallet_core::{paths, ConfigError, EnvironmentName};

use crate::error::{io_err, SwapError};
use crate::report::RunReport;

/// Load the last run for `environment`, or `None` if it never ran.
pub fn load_at(home: &Path, environment: &EnvironmentName) -> Result<Option<RunReport>, SwapError> {
    let path = journal_path(home, environment)?;
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(Some(serde_json::from_str(&contents)?))
}

/// Save `report` atomically, replacing the previous run.
pub fn save_at(home: &Path, report: &RunReport) -> Result<(), SwapError> {
    let path = journal_path(home, &report.environment)?;
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid run journal path")));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(report)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// `status --env` names arrive unvalidated, so check here too.
fn journal_path(home: &Path, environment: &EnvironmentName) -> Result<PathBuf, SwapError> {
    if !paths::is_single_component(&environment.0) {
        return Err(ConfigError::InvalidEnvironmentName {
            name: environment.0.clone(),
        }
        .into());
    }
    Ok(paths::run_journal_path(home, environment))
}

/// Environments with a saved run, sorted by name.
pub fn list_at(home: &Path) -> Result<Vec<EnvironmentName>, SwapError> {
    let dir = paths::runs_dir(home);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names: Vec<EnvironmentName> = std::fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.strip_suffix(".json").map(EnvironmentName::from)
        })
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ArtifactOutcome, ArtifactReport};
    use chrono::Utc;
    use pallet_core::ArtifactName;
    use tempfile::TempDir;

    fn report(env: &str) -> RunReport {
        let mut artifact = ArtifactReport::new(ArtifactName::from("Streets"));
        artifact.outcome = ArtifactOutcome::Succeeded;
        artifact.digest = Some("deadbeef".to_string());
        let now = Utc::now();
        RunReport {
            environment: EnvironmentName::from(env),
            started_at: now,
            finished_at: now,
            artifacts: vec![artifact],
        }
    }

    #[test]
    fn environment_outside_runs_dir_is_refused() {
        let tmp = TempDir::new().unwrap();
        let err = save_at(tmp.path(), &report("../escape")).unwrap_err();
        assert!(
            matches!(err, SwapError::Config(ConfigError::InvalidEnvironmentName { .. })),
            "got: {err}"
        );
        assert!(!tmp.path().join(".pallet").join("escape.json").exists());
        assert!(load_at(tmp.path(), &EnvironmentName::from("..")).is_err());
    }

    #[test]
    fn missing_journal_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_at(tmp.path(), &EnvironmentName::from("Dev")).unwrap().is_none());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let saved = report("Dev");
        save_at(tmp.path(), &saved).unwrap();
        let loaded = load_at(tmp.path(), &EnvironmentName::from("Dev"))
            .unwrap()
            .expect("journal");
        assert_eq!(loaded, saved);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &report("Dev")).unwrap();
        let tmp_path =
            paths::run_journal_path(tmp.path(), &EnvironmentName::from("Dev")).with_extension("json.tmp");
        assert!(!tmp_path.exists(), "tmp file should be removed after atomic rename");
    }

    #[test]
    fn list_is_sorted_and_ignores_tmp() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &report("Production")).unwrap();
        save_at(tmp.path(), &report("Dev")).unwrap();
        std::fs::write(paths::runs_dir(tmp.path()).join("Dev.json.tmp"), "{").unwrap();
        let names = list_at(tmp.path()).unwrap();
        assert_eq!(
            names,
            vec![EnvironmentName::from("Dev"), EnvironmentName::from("Production")]
        );
    }
}

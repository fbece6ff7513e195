//! Stage → rebuild → validate for one artifact.
//!
//! Nothing here writes to the live location; it is only read from.

use std::time::Instant;

use pallet_core::ArtifactTarget;

use crate::engine::RebuildEngine;
use crate::error::SwapError;
use crate::fileset::FileSet;
use crate::pipeline::RunSettings;
use crate::staging::StagingWorkspace;

/// A rebuilt, validated file set waiting in its staging directory.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    pub files: FileSet,
    /// Digest of `files`; every distributed copy must match it.
    pub digest: String,
}

/// Copy the live file set into `workspace`, rebuild it, and validate the result.
pub fn rebuild(
    target: &ArtifactTarget,
    workspace: &StagingWorkspace,
    settings: &RunSettings,
    engine: &dyn RebuildEngine,
) -> Result<StagedArtifact, SwapError> {
    let name = &target.name;
    let started = Instant::now();

    workspace.prepare()?;
    let live = FileSet::require(&target.live, name, &settings.extension_prefix)?;
    tracing::debug!(
        artifact = %name,
        files = live.names.len(),
        "copying {} to {}",
        target.live.display(),
        workspace.path().display()
    );
    live.copy_to(workspace.path())?;

    let locator = workspace.path().join(&name.0);
    tracing::info!(artifact = %name, "rebuilding {}", locator.display());
    engine.rebuild(&locator)?;

    let staged = FileSet::list(workspace.path(), name, &settings.extension_prefix)?;
    let primary = format!("{}.{}", name.0, settings.primary_extension);
    if !staged.contains(&primary) {
        return Err(SwapError::Validation {
            artifact: name.0.clone(),
            reason: format!("{primary} missing after rebuild"),
        });
    }
    let digest = staged.digest()?;

    tracing::info!(
        artifact = %name,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "rebuilt"
    );
    Ok(StagedArtifact {
        files: staged,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use pallet_core::ArtifactName;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct Touch;
    impl RebuildEngine for Touch {
        fn rebuild(&self, locator: &Path) -> Result<(), EngineError> {
            let lox = PathBuf::from(format!("{}.lox", locator.display()));
            fs::write(lox, "rebuilt index").unwrap();
            Ok(())
        }
    }

    struct DeletePrimary;
    impl RebuildEngine for DeletePrimary {
        fn rebuild(&self, locator: &Path) -> Result<(), EngineError> {
            fs::remove_file(format!("{}.loc", locator.display())).unwrap();
            Ok(())
        }
    }

    fn target(live: &Path) -> ArtifactTarget {
        ArtifactTarget {
            name: ArtifactName::from("Streets"),
            sources: vec!["Roads".into()],
            live: live.to_path_buf(),
            replicas: vec![],
            services: vec![],
        }
    }

    fn settings() -> RunSettings {
        RunSettings {
            extension_prefix: "lo".to_string(),
            primary_extension: "loc".to_string(),
            keep_failed_staging: false,
        }
    }

    #[test]
    fn rebuild_happens_in_staging_only() {
        let live = TempDir::new().unwrap();
        fs::write(live.path().join("Streets.loc"), "props").unwrap();
        fs::write(live.path().join("Streets.lox"), "old index").unwrap();
        let t = target(live.path());
        let ws = StagingWorkspace::for_artifact(live.path(), &t.name);

        let staged = rebuild(&t, &ws, &settings(), &Touch).expect("rebuild");
        assert_eq!(staged.files.dir, ws.path());
        assert_eq!(
            fs::read_to_string(ws.path().join("Streets.lox")).unwrap(),
            "rebuilt index"
        );
        assert_eq!(
            fs::read_to_string(live.path().join("Streets.lox")).unwrap(),
            "old index"
        );
    }

    #[test]
    fn missing_primary_fails_validation() {
        let live = TempDir::new().unwrap();
        fs::write(live.path().join("Streets.loc"), "props").unwrap();
        let t = target(live.path());
        let ws = StagingWorkspace::for_artifact(live.path(), &t.name);

        let err = rebuild(&t, &ws, &settings(), &DeletePrimary).unwrap_err();
        assert!(matches!(err, SwapError::Validation { .. }), "got: {err}");
        assert!(live.path().join("Streets.loc").exists());
    }

    #[test]
    fn nothing_live_is_empty_file_set() {
        let live = TempDir::new().unwrap();
        let t = target(live.path());
        let ws = StagingWorkspace::for_artifact(live.path(), &t.name);
        let err = rebuild(&t, &ws, &settings(), &Touch).unwrap_err();
        assert!(matches!(err, SwapError::EmptyFileSet { .. }));
    }
}

//! Per-artifact staging directories.

use std::path::{Path, PathBuf};

use pallet_core::{paths, ArtifactName};

use crate::error::{io_err, SwapError};

/// Disposable working directory for one artifact's rebuild.
///
/// Lives at `<live>/rebuilding/<artifact>`, so two artifacts never share one
/// and a directory left behind by a crashed run is found again next time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingWorkspace {
    artifact: ArtifactName,
    path: PathBuf,
}

impl StagingWorkspace {
    pub fn for_artifact(live: &Path, artifact: &ArtifactName) -> Self {
        Self {
            artifact: artifact.clone(),
            path: paths::staging_dir(live, artifact),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory empty, discarding anything a previous run left.
    pub fn prepare(&self) -> Result<(), SwapError> {
        self.check_contained()?;
        if self.path.exists() {
            tracing::warn!(path = %self.path.display(), "clearing leftover staging directory");
            std::fs::remove_dir_all(&self.path).map_err(|e| io_err(&self.path, e))?;
        }
        std::fs::create_dir_all(&self.path).map_err(|e| io_err(&self.path, e))
    }

    /// Delete the directory. Succeeds when it is already gone.
    ///
    /// The shared `rebuilding/` parent is removed too once it is empty.
    pub fn remove(&self) -> Result<(), SwapError> {
        self.check_contained()?;
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(io_err(&self.path, err)),
        }
        if let Some(parent) = self.path.parent() {
            // Fails while another artifact's staging dir is still present.
            let _ = std::fs::remove_dir(parent);
        }
        Ok(())
    }

    /// Both operations delete recursively; the path must stay one level
    /// below `rebuilding/`.
    fn check_contained(&self) -> Result<(), SwapError> {
        if paths::is_single_component(&self.artifact.0) {
            return Ok(());
        }
        Err(SwapError::StagingOutsideWorkspace {
            artifact: self.artifact.0.clone(),
            path: self.path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn prepare_clears_leftovers() {
        let live = TempDir::new().unwrap();
        let ws = StagingWorkspace::for_artifact(live.path(), &ArtifactName::from("Streets"));
        fs::create_dir_all(ws.path()).unwrap();
        fs::write(ws.path().join("Streets.loc"), "half rebuilt").unwrap();

        ws.prepare().unwrap();
        assert!(ws.path().exists());
        assert_eq!(fs::read_dir(ws.path()).unwrap().count(), 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let live = TempDir::new().unwrap();
        let ws = StagingWorkspace::for_artifact(live.path(), &ArtifactName::from("Streets"));
        ws.prepare().unwrap();
        ws.remove().unwrap();
        ws.remove().unwrap();
        assert!(!ws.path().exists());
        assert!(!live.path().join(paths::STAGING_DIR).exists());
    }

    #[test]
    fn dot_dot_artifact_never_touches_live() {
        let live = TempDir::new().unwrap();
        fs::write(live.path().join("Streets.loc"), "live").unwrap();
        for name in ["..", ".", "x/.."] {
            let ws = StagingWorkspace::for_artifact(live.path(), &ArtifactName::from(name));
            let err = ws.prepare().unwrap_err();
            assert!(matches!(err, SwapError::StagingOutsideWorkspace { .. }), "got: {err}");
            assert!(ws.remove().is_err());
        }
        assert_eq!(fs::read_to_string(live.path().join("Streets.loc")).unwrap(), "live");
    }

    #[test]
    fn remove_keeps_parent_while_siblings_exist() {
        let live = TempDir::new().unwrap();
        let a = StagingWorkspace::for_artifact(live.path(), &ArtifactName::from("A"));
        let b = StagingWorkspace::for_artifact(live.path(), &ArtifactName::from("B"));
        a.prepare().unwrap();
        b.prepare().unwrap();
        a.remove().unwrap();
        assert!(b.path().exists());
    }
}

//! Sidecar file sets.
//!
//! An artifact on disk is every regular file named `<artifact>.<ext>` where
//! `<ext>` starts with the configured prefix (`lo` covers `.loc`, `.lox` and
//! `.loc.xml`). The set is copied, digested, and verified as one unit.
//!
//! ## `copy_to`: per-file protocol
//!
//! 1. Ensure the destination directory exists.
//! 2. Copy to `<dest>/<file>.pallet.tmp`.
//! 3. Rename over `<dest>/<file>` (atomic on POSIX).
//! 4. On any failure remove the `.tmp` and stop.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use pallet_core::ArtifactName;

use crate::error::{io_err, SwapError};

const TMP_SUFFIX: &str = ".pallet.tmp";

/// The files making up one artifact inside one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet {
    pub dir: PathBuf,
    /// File names (not paths), sorted.
    pub names: Vec<String>,
}

impl FileSet {
    /// Collect the artifact's sidecar files in `dir`.
    ///
    /// A missing directory yields an empty set.
    pub fn list(dir: &Path, artifact: &ArtifactName, prefix: &str) -> Result<Self, SwapError> {
        let stem = format!("{}.", artifact.0);
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    dir: dir.to_path_buf(),
                    names: vec![],
                })
            }
            Err(err) => return Err(io_err(dir, err)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(dir, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let matches = name
                .strip_prefix(&stem)
                .is_some_and(|ext| !ext.is_empty() && ext.starts_with(prefix));
            if is_file && matches && !name.ends_with(TMP_SUFFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(Self {
            dir: dir.to_path_buf(),
            names,
        })
    }

    /// Like [`FileSet::list`], but an empty set is an error.
    pub fn require(dir: &Path, artifact: &ArtifactName, prefix: &str) -> Result<Self, SwapError> {
        let set = Self::list(dir, artifact, prefix)?;
        if set.is_empty() {
            return Err(SwapError::EmptyFileSet {
                artifact: artifact.0.clone(),
                prefix: prefix.to_string(),
                dir: dir.to_path_buf(),
            });
        }
        Ok(set)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.names.iter().map(|n| self.dir.join(n))
    }

    /// SHA-256 over every `(name, contents)` pair in name order, hex encoded.
    ///
    /// Contents are streamed; each is framed by its name, a NUL and its
    /// length as a little-endian `u64`.
    pub fn digest(&self) -> Result<String, SwapError> {
        let mut hasher = Sha256::new();
        for name in &self.names {
            let path = self.dir.join(name);
            let mut file = File::open(&path).map_err(|e| io_err(&path, e))?;
            let len = file.metadata().map_err(|e| io_err(&path, e))?.len();
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
            hasher.update(len.to_le_bytes());
            let hashed = io::copy(&mut file, &mut hasher).map_err(|e| io_err(&path, e))?;
            if hashed != len {
                return Err(io_err(
                    &path,
                    io::Error::other(format!("file changed while hashing ({len} -> {hashed} bytes)")),
                ));
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Copy every file into `dest`, returning the set as it now exists there.
    pub fn copy_to(&self, dest: &Path) -> Result<FileSet, SwapError> {
        std::fs::create_dir_all(dest).map_err(|e| io_err(dest, e))?;
        for name in &self.names {
            let src = self.dir.join(name);
            let target = dest.join(name);
            let tmp = dest.join(format!("{name}{TMP_SUFFIX}"));

            if let Err(e) = std::fs::copy(&src, &tmp) {
                let _ = std::fs::remove_file(&tmp);
                return Err(io_err(&src, e));
            }
            if let Err(e) = std::fs::rename(&tmp, &target) {
                let _ = std::fs::remove_file(&tmp);
                return Err(io_err(&target, e));
            }
            tracing::debug!("copied {} -> {}", src.display(), target.display());
        }
        Ok(FileSet {
            dir: dest.to_path_buf(),
            names: self.names.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn streets() -> ArtifactName {
        ArtifactName::from("Streets")
    }

    fn seed(dir: &Path) {
        fs::write(dir.join("Streets.loc"), "loc").unwrap();
        fs::write(dir.join("Streets.lox"), "lox").unwrap();
        fs::write(dir.join("Streets.loc.xml"), "<xml/>").unwrap();
        fs::write(dir.join("Streets2.loc"), "other locator").unwrap();
        fs::write(dir.join("Streets.txt"), "not a sidecar").unwrap();
        fs::write(dir.join("Streets"), "no extension").unwrap();
    }

    #[test]
    fn list_matches_all_sidecars_and_nothing_else() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let set = FileSet::list(tmp.path(), &streets(), "lo").unwrap();
        assert_eq!(set.names, vec!["Streets.loc", "Streets.loc.xml", "Streets.lox"]);
    }

    #[test]
    fn empty_prefix_matches_every_extension() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let set = FileSet::list(tmp.path(), &streets(), "").unwrap();
        assert_eq!(set.names.len(), 4);
        assert!(set.contains("Streets.txt"));
    }

    #[test]
    fn missing_dir_is_empty_but_require_fails() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(FileSet::list(&missing, &streets(), "lo").unwrap().is_empty());
        let err = FileSet::require(&missing, &streets(), "lo").unwrap_err();
        assert!(matches!(err, SwapError::EmptyFileSet { .. }));
    }

    #[test]
    fn copy_creates_dest_and_leaves_no_tmp() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        seed(src.path());
        let set = FileSet::require(src.path(), &streets(), "lo").unwrap();
        let dest = dst.path().join("nested").join("replica");

        let copied = set.copy_to(&dest).unwrap();
        assert_eq!(copied.digest().unwrap(), set.digest().unwrap());
        let leftovers: Vec<_> = fs::read_dir(&dest)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(TMP_SUFFIX))
            .collect();
        assert!(leftovers.is_empty(), ".pallet.tmp must be renamed away");
    }

    #[test]
    fn copy_overwrites_existing_files() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        seed(src.path());
        fs::write(dst.path().join("Streets.loc"), "stale").unwrap();
        let set = FileSet::require(src.path(), &streets(), "lo").unwrap();
        set.copy_to(dst.path()).unwrap();
        assert_eq!(fs::read_to_string(dst.path().join("Streets.loc")).unwrap(), "loc");
    }

    #[test]
    fn digest_frames_each_file_by_name_and_length() {
        let tmp = TempDir::new().unwrap();
        let big: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(tmp.path().join("Streets.loc"), "loc").unwrap();
        fs::write(tmp.path().join("Streets.lox"), &big).unwrap();
        let set = FileSet::require(tmp.path(), &streets(), "lo").unwrap();

        let mut expected = Sha256::new();
        for (name, bytes) in [("Streets.loc", b"loc".as_slice()), ("Streets.lox", big.as_slice())] {
            expected.update(name.as_bytes());
            expected.update([0u8]);
            expected.update((bytes.len() as u64).to_le_bytes());
            expected.update(bytes);
        }
        assert_eq!(set.digest().unwrap(), hex::encode(expected.finalize()));
    }

    #[test]
    fn digest_changes_with_content() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let set = FileSet::require(tmp.path(), &streets(), "lo").unwrap();
        let before = set.digest().unwrap();
        fs::write(tmp.path().join("Streets.lox"), "rebuilt").unwrap();
        assert_ne!(before, set.digest().unwrap());
    }
}

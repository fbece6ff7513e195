//! Tracing setup and size-based rotation of the run log.
//!
//! Human-readable events always go to stderr. `pallet run --log-file` adds a
//! second, colourless writer appending to the run log, which is rotated
//! before opening once it reaches 10 MiB, keeping five numbered backups.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// `verbose` picks the default level (0 info, 1 debug, 2+ trace) when
/// `RUST_LOG` is unset.
pub fn init(verbose: u8, log_file: Option<&Path>) -> Result<()> {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = open_log(path, RunLogRotation::default())?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")
}

fn open_log(path: &Path, rotation: RunLogRotation) -> Result<fs::File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    }
    // Keep appending to the oversized file rather than fail the run.
    if let Err(err) = rotation.apply(path) {
        eprintln!("warning: log rotation failed for {}: {err}", path.display());
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))
}

/// When and how far back the run log is rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLogRotation {
    pub max_bytes: u64,
    pub keep: usize,
}

impl Default for RunLogRotation {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            keep: 5,
        }
    }
}

impl RunLogRotation {
    /// Shift `log` into `log.1` once it reaches `max_bytes`, pushing older
    /// backups up by one. Renaming onto `log.<keep>` discards the oldest.
    ///
    /// Returns whether anything moved; a missing log is left alone.
    pub fn apply(&self, log: &Path) -> io::Result<bool> {
        match fs::metadata(log) {
            Ok(meta) if meta.len() >= self.max_bytes => {}
            Ok(_) => return Ok(false),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        }
        if self.keep == 0 {
            fs::remove_file(log)?;
            return Ok(true);
        }
        for slot in (1..=self.keep).rev() {
            let from = if slot == 1 {
                log.to_path_buf()
            } else {
                backup(log, slot - 1)
            };
            if from.exists() {
                fs::rename(&from, backup(log, slot))?;
            }
        }
        Ok(true)
    }
}

/// `pallet.log` with `.n` appended.
fn backup(log: &Path, n: usize) -> PathBuf {
    let mut name = OsString::from(log.as_os_str());
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small() -> RunLogRotation {
        RunLogRotation {
            max_bytes: 32,
            keep: 3,
        }
    }

    #[test]
    fn below_threshold_or_missing_is_untouched() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("pallet.log");
        assert!(!small().apply(&log).unwrap());

        fs::write(&log, "short").unwrap();
        assert!(!small().apply(&log).unwrap());
        assert!(!backup(&log, 1).exists());
    }

    #[test]
    fn full_history_drops_the_oldest_backup() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("pallet.log");
        for n in 1..=3 {
            fs::write(backup(&log, n), format!("gen{n}")).unwrap();
        }
        fs::write(&log, "x".repeat(40)).unwrap();

        assert!(small().apply(&log).unwrap());
        assert!(!log.exists());
        assert_eq!(fs::read_to_string(backup(&log, 1)).unwrap().len(), 40);
        assert_eq!(fs::read_to_string(backup(&log, 2)).unwrap(), "gen1");
        assert_eq!(fs::read_to_string(backup(&log, 3)).unwrap(), "gen2");
        assert!(!backup(&log, 4).exists());
    }

    #[test]
    fn open_log_rotates_then_appends() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("logs").join("pallet.log");
        fs::create_dir_all(log.parent().unwrap()).unwrap();
        fs::write(&log, "x".repeat(40)).unwrap();
        {
            use std::io::Write;
            let mut f = open_log(&log, small()).unwrap();
            f.write_all(b"fresh\n").unwrap();
        }
        assert_eq!(fs::read_to_string(&log).unwrap(), "fresh\n");
        assert!(backup(&log, 1).exists());

        {
            use std::io::Write;
            let mut f = open_log(&log, small()).unwrap();
            f.write_all(b"more\n").unwrap();
        }
        assert_eq!(fs::read_to_string(&log).unwrap(), "fresh\nmore\n");
    }
}

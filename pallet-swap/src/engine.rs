//! External rebuild engine seam.

use std::path::{Path, PathBuf};
use std::process::Command;

use pallet_core::RebuildCommand;

use crate::error::EngineError;

/// Rebuilds a staged artifact in place.
///
/// `locator` is the staged artifact path without extension
/// (`<staging>/<artifact>`). The call may be slow; no timeout is applied here.
pub trait RebuildEngine {
    fn rebuild(&self, locator: &Path) -> Result<(), EngineError>;
}

/// Runs a configured program, substituting `{locator}` in its arguments.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandEngine {
    pub fn new(command: &RebuildCommand) -> Self {
        Self {
            program: command.program.clone(),
            args: command.args.clone(),
        }
    }

    fn args_for(&self, locator: &Path) -> Vec<String> {
        let locator = locator.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{locator}", &locator))
            .collect()
    }
}

impl RebuildEngine for CommandEngine {
    fn rebuild(&self, locator: &Path) -> Result<(), EngineError> {
        let args = self.args_for(locator);
        tracing::debug!(program = %self.program.display(), ?args, "invoking rebuild engine");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| EngineError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        Err(EngineError::Failed {
            code: output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(program: &str, args: &[&str]) -> CommandEngine {
        CommandEngine::new(&RebuildCommand {
            program: PathBuf::from(program),
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn locator_placeholder_is_substituted() {
        let e = engine("rebuild", &["--in", "{locator}", "--fast"]);
        let args = e.args_for(Path::new("/srv/rebuilding/Streets/Streets"));
        assert_eq!(args, vec!["--in", "/srv/rebuilding/Streets/Streets", "--fast"]);
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let e = engine("/definitely/not/a/real/rebuild-engine", &[]);
        let err = e.rebuild(Path::new("/tmp/x")).unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_carries_stderr() {
        let e = engine("sh", &["-c", "echo 'locator is locked' >&2; exit 3"]);
        let err = e.rebuild(Path::new("/tmp/x")).unwrap_err();
        match err {
            EngineError::Failed { code, message } => {
                assert_eq!(code, "3");
                assert_eq!(message, "locator is locked");
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn zero_exit_is_success() {
        let e = engine("sh", &["-c", "test -n \"$0\"", "{locator}"]);
        e.rebuild(Path::new("/tmp/x")).expect("rebuild");
    }
}

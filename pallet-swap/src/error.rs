//! Error types for pallet-swap.

use std::path::PathBuf;

use thiserror::Error;

use pallet_core::ConfigError;

/// Errors from staging, rebuilding, distributing, and journaling artifacts.
#[derive(Debug, Error)]
pub enum SwapError {
    /// A configuration error surfaced while planning a run.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (run journal).
    #[error("run journal JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no files matching '{artifact}.{prefix}*' in {dir}")]
    EmptyFileSet {
        artifact: String,
        prefix: String,
        dir: PathBuf,
    },

    #[error("rebuild engine failed: {0}")]
    Engine(#[from] EngineError),

    #[error("staging path {path} for '{artifact}' is not inside the rebuilding directory")]
    StagingOutsideWorkspace { artifact: String, path: PathBuf },

    #[error("rebuilt '{artifact}' is not load-ready: {reason}")]
    Validation { artifact: String, reason: String },

    #[error("copy at {dest} does not match staged files (expected {expected}, got {actual})")]
    DigestMismatch {
        dest: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Failure reported by an external rebuild engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not start '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("exited with {code}: {message}")]
    Failed { code: String, message: String },
}

/// Failure toggling a service through one administration channel.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("token request for channel '{channel}' rejected: {message}")]
    Token { channel: String, message: String },

    #[error("{service} rejected '{verb}': {message}")]
    Rejected {
        service: String,
        verb: String,
        message: String,
    },
}

/// Convenience constructor for [`SwapError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SwapError {
    SwapError::Io {
        path: path.into(),
        source,
    }
}

//! Error types for pallet-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading, saving, or validating a pallet
/// configuration. Every one of them is fatal before any artifact is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with file path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    #[error("config not found at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("artifact name must not be empty")]
    EmptyArtifactName,

    #[error("artifact name '{name}' must be a single path component")]
    InvalidArtifactName { name: String },

    #[error("environment name '{name}' must be a single path component")]
    InvalidEnvironmentName { name: String },

    #[error("artifact '{name}' is declared more than once")]
    DuplicateArtifact { name: String },

    #[error("artifact '{artifact}' declares no upstream sources")]
    NoSources { artifact: String },

    #[error("artifact '{artifact}' has a service binding with an empty name or type")]
    InvalidBinding { artifact: String },

    #[error("unknown environment '{name}'; configured: {known}")]
    UnknownEnvironment { name: String, known: String },

    #[error("environment '{environment}' forces unknown artifact '{artifact}'")]
    UnknownForcedArtifact { environment: String, artifact: String },

    #[error("artifact '{artifact}' has no live location in environment '{environment}'")]
    MissingLiveLocation { environment: String, artifact: String },

    #[error("environment '{environment}' declares channel '{channel}' more than once")]
    DuplicateChannel { environment: String, channel: String },

    #[error("rebuild program must not be empty")]
    EmptyRebuildProgram,

    #[error("extension '{value}' must be non-empty and contain no path separators or dots")]
    InvalidExtension { value: String },
}

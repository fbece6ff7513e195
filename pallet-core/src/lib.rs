//! Pallet core library: domain types, configuration persistence, errors.
//!
//! - [`types`]: newtypes, change results, artifact and channel declarations
//! - [`error`]: [`ConfigError`]
//! - [`config`]: load / save / init / validate / resolve targets
//! - [`paths`]: on-disk layout under `~/.pallet/` and staging directories

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::ArtifactTarget;
pub use error::ConfigError;
pub use types::{
    ArtifactDecl, ArtifactName, ChangeResult, ChangeResults, ChannelConfig, EnvironmentConfig,
    EnvironmentName, PalletConfig, RebuildCommand, ServiceBinding, ServiceState, SourceName,
};

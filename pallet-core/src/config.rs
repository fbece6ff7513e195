//! YAML pallet configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.pallet/
//!   locators.yaml   (mode 0600, may hold channel credentials)
//!   runs/<env>.json (run journal, written by pallet-swap)
//!   logs/pallet.log
//! ```
//!
//! # API pattern
//!
//! Functions that touch the home directory have two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Every load validates the declarations, so a malformed config fails before
//! any artifact is processed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::ConfigError;
use crate::paths;
use crate::types::{
    ArtifactDecl, ArtifactName, ChannelConfig, EnvironmentConfig, EnvironmentName, PalletConfig,
    RebuildCommand, ServiceBinding, SourceName,
};

// ---------------------------------------------------------------------------
// 1. Load
// ---------------------------------------------------------------------------

/// Load and validate a config from an explicit file path.
///
/// Returns `ConfigError::ConfigNotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<PalletConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let config: PalletConfig = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Load `<home>/.pallet/locators.yaml`.
pub fn load_at(home: &Path) -> Result<PalletConfig, ConfigError> {
    load_from(&paths::config_path(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<PalletConfig, ConfigError> {
    load_at(&home()?)
}

// ---------------------------------------------------------------------------
// 2. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a config to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_to(path: &Path, config: &PalletConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = path.with_extension("yaml.tmp");
    let yaml = serde_yaml::to_string(config)?;
    let header = format!("# pallet config, written {}\n", Utc::now().to_rfc3339());
    std::fs::write(&tmp_path, header + &yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Save to `<home>/.pallet/locators.yaml`.
pub fn save_at(home: &Path, config: &PalletConfig) -> Result<(), ConfigError> {
    save_to(&paths::config_path(home), config)
}

// ---------------------------------------------------------------------------
// 3. Init
// ---------------------------------------------------------------------------

/// Write the scaffold config to `<home>/.pallet/locators.yaml`.
///
/// Idempotent: if the file already exists it is loaded and returned unchanged.
/// The boolean is `true` when a new file was written.
pub fn init_at(home: &Path) -> Result<(PalletConfig, bool), ConfigError> {
    let path = paths::config_path(home);
    if path.exists() {
        return Ok((load_from(&path)?, false));
    }
    let config = scaffold();
    save_to(&path, &config)?;
    Ok((config, true))
}

/// `init_at` convenience wrapper.
pub fn init() -> Result<(PalletConfig, bool), ConfigError> {
    init_at(&home()?)
}

/// Starter config: the road centerline and address point locators, with a
/// filled-in `Dev` environment and empty `Staging`/`Production` ones.
pub fn scaffold() -> PalletConfig {
    let centerline = [
        "Roads_AddressSystem_ACSALIAS",
        "Roads_AddressSystem_ALIAS1",
        "Roads_AddressSystem_ALIAS2",
        "Roads_AddressSystem_STREET",
    ];
    let mut artifacts: Vec<ArtifactDecl> = centerline
        .iter()
        .map(|name| geocoder(name, "Roads"))
        .collect();
    artifacts.push(geocoder("AddressPoints_AddressSystem", "AddressPoints"));

    let dev = EnvironmentConfig {
        locators_path: Some(PathBuf::from("/tmp/locators")),
        copy_destinations: vec![PathBuf::from("/tmp/locators/copy_location")],
        channels: vec![ChannelConfig {
            name: "primary".to_string(),
            host: "localhost".to_string(),
            port: 6443,
            scheme: "https".to_string(),
            instance: "arcgis".to_string(),
            username: None,
            password: None,
        }],
        force: vec![],
        keep_failed_staging: false,
    };

    PalletConfig {
        version: 1,
        extension_prefix: "lo".to_string(),
        primary_extension: "loc".to_string(),
        rebuild: RebuildCommand {
            program: PathBuf::from("python"),
            args: vec!["rebuild_locator.py".to_string(), "{locator}".to_string()],
        },
        artifacts,
        environments: [
            (EnvironmentName::from("Dev"), dev),
            (EnvironmentName::from("Staging"), EnvironmentConfig::default()),
            (EnvironmentName::from("Production"), EnvironmentConfig::default()),
        ]
        .into_iter()
        .collect(),
    }
}

fn geocoder(name: &str, source: &str) -> ArtifactDecl {
    ArtifactDecl {
        name: ArtifactName::from(name),
        sources: vec![SourceName::from(source)],
        live: None,
        replicas: vec![],
        services: vec![ServiceBinding {
            name: format!("Geolocators/{name}"),
            service_type: "GeocodeServer".to_string(),
        }],
    }
}

// ---------------------------------------------------------------------------
// 4. Validate
// ---------------------------------------------------------------------------

/// Check the environment-independent declarations.
pub fn validate(config: &PalletConfig) -> Result<(), ConfigError> {
    if config.rebuild.program.as_os_str().is_empty() {
        return Err(ConfigError::EmptyRebuildProgram);
    }
    check_extension(&config.primary_extension, false)?;
    check_extension(&config.extension_prefix, true)?;

    let mut seen = HashSet::new();
    for artifact in &config.artifacts {
        if artifact.name.0.trim().is_empty() {
            return Err(ConfigError::EmptyArtifactName);
        }
        if !paths::is_single_component(&artifact.name.0) {
            return Err(ConfigError::InvalidArtifactName {
                name: artifact.name.0.clone(),
            });
        }
        if !seen.insert(&artifact.name) {
            return Err(ConfigError::DuplicateArtifact {
                name: artifact.name.0.clone(),
            });
        }
        if artifact.sources.iter().all(|s| s.0.trim().is_empty()) {
            return Err(ConfigError::NoSources {
                artifact: artifact.name.0.clone(),
            });
        }
        if artifact
            .services
            .iter()
            .any(|b| b.name.trim().is_empty() || b.service_type.trim().is_empty())
        {
            return Err(ConfigError::InvalidBinding {
                artifact: artifact.name.0.clone(),
            });
        }
    }

    for (env_name, env) in &config.environments {
        if !paths::is_single_component(&env_name.0) {
            return Err(ConfigError::InvalidEnvironmentName {
                name: env_name.0.clone(),
            });
        }
        if let Some(unknown) = env.force.iter().find(|a| !seen.contains(a)) {
            return Err(ConfigError::UnknownForcedArtifact {
                environment: env_name.0.clone(),
                artifact: unknown.0.clone(),
            });
        }
        let mut channels = HashSet::new();
        for channel in &env.channels {
            if !channels.insert(channel.name.as_str()) {
                return Err(ConfigError::DuplicateChannel {
                    environment: env_name.0.clone(),
                    channel: channel.name.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_extension(value: &str, allow_empty: bool) -> Result<(), ConfigError> {
    let bad_char = value.contains(['.', '/', '\\', '*']);
    if bad_char || (!allow_empty && value.is_empty()) {
        return Err(ConfigError::InvalidExtension {
            value: value.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// 5. Resolve
// ---------------------------------------------------------------------------

/// Look up an environment by name.
pub fn environment<'a>(
    config: &'a PalletConfig,
    name: &EnvironmentName,
) -> Result<&'a EnvironmentConfig, ConfigError> {
    config
        .environments
        .get(name)
        .ok_or_else(|| ConfigError::UnknownEnvironment {
            name: name.0.clone(),
            known: config
                .environments
                .keys()
                .map(|k| k.0.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// An artifact declaration with its locations resolved for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactTarget {
    pub name: ArtifactName,
    pub sources: Vec<SourceName>,
    pub live: PathBuf,
    /// Replica destinations in fan-out order, without duplicates or `live`.
    pub replicas: Vec<PathBuf>,
    pub services: Vec<ServiceBinding>,
}

/// Resolve every declared artifact against `env_name`, in declaration order.
///
/// Fails with `MissingLiveLocation` when an artifact has neither its own
/// `live` path nor an environment `locators_path`.
pub fn targets(
    config: &PalletConfig,
    env_name: &EnvironmentName,
) -> Result<Vec<ArtifactTarget>, ConfigError> {
    let env = environment(config, env_name)?;
    config
        .artifacts
        .iter()
        .map(|decl| {
            let live = decl
                .live
                .clone()
                .or_else(|| env.locators_path.clone())
                .ok_or_else(|| ConfigError::MissingLiveLocation {
                    environment: env_name.0.clone(),
                    artifact: decl.name.0.clone(),
                })?;
            let mut replicas: Vec<PathBuf> = Vec::new();
            for dest in env.copy_destinations.iter().chain(decl.replicas.iter()) {
                if *dest != live && !replicas.contains(dest) {
                    replicas.push(dest.clone());
                }
            }
            Ok(ArtifactTarget {
                name: decl.name.clone(),
                sources: decl.sources.clone(),
                live,
                replicas,
                services: decl.services.clone(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dev() -> EnvironmentName {
        EnvironmentName::from("Dev")
    }

    #[test]
    fn scaffold_is_valid() {
        validate(&scaffold()).expect("scaffold validates");
    }

    #[test]
    fn init_writes_once_then_loads() {
        let home = TempDir::new().expect("tempdir");
        let (_, created) = init_at(home.path()).expect("first init");
        assert!(created);
        let (config, created) = init_at(home.path()).expect("second init");
        assert!(!created);
        assert_eq!(config.artifacts.len(), 5);
    }

    #[test]
    fn config_file_is_private() {
        let home = TempDir::new().expect("tempdir");
        init_at(home.path()).expect("init");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let path = paths::config_path(home.path());
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn duplicate_artifact_is_rejected() {
        let mut config = scaffold();
        let first = config.artifacts[0].clone();
        config.artifacts.push(first);
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateArtifact { .. }));
    }

    #[test]
    fn artifact_without_sources_is_rejected() {
        let mut config = scaffold();
        config.artifacts[0].sources.clear();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::NoSources { .. }));
    }

    #[test]
    fn forcing_unknown_artifact_is_rejected() {
        let mut config = scaffold();
        config
            .environments
            .get_mut(&dev())
            .unwrap()
            .force
            .push(ArtifactName::from("Nope"));
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownForcedArtifact { .. }));
    }

    #[test]
    fn dotted_primary_extension_is_rejected() {
        let mut config = scaffold();
        config.primary_extension = ".loc".to_string();
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::InvalidExtension { .. }
        ));
    }

    #[test]
    fn unknown_environment_lists_known_ones() {
        let config = scaffold();
        let err = environment(&config, &EnvironmentName::from("Test")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Dev") && msg.contains("Production"), "got: {msg}");
    }

    #[test]
    fn targets_merge_and_dedupe_replicas() {
        let mut config = scaffold();
        config.artifacts[0].replicas = vec![
            PathBuf::from("/tmp/locators/copy_location"),
            PathBuf::from("/mnt/replica"),
            PathBuf::from("/tmp/locators"),
        ];
        let resolved = targets(&config, &dev()).expect("targets");
        assert_eq!(resolved[0].live, PathBuf::from("/tmp/locators"));
        assert_eq!(
            resolved[0].replicas,
            vec![
                PathBuf::from("/tmp/locators/copy_location"),
                PathBuf::from("/mnt/replica"),
            ]
        );
        assert_eq!(resolved.len(), config.artifacts.len());
    }

    #[test]
    fn targets_without_live_location_fail() {
        let config = scaffold();
        let err = targets(&config, &EnvironmentName::from("Production")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingLiveLocation { .. }));
    }
}

//! Rebuild-and-swap pipeline shared by `pallet plan` and `pallet run`.
//!
//! For each dirty artifact, strictly one after another:
//!
//! 1. Rebuild in `<live>/rebuilding/<artifact>` (live files are only read).
//! 2. Take bound services offline on every channel (best effort).
//! 3. Distribute the staged file set to live, then to each replica.
//! 4. Bring services online on every channel, whatever step 3 reported.
//! 5. Remove the staging directory; a failure here is only recorded.
//!
//! A rebuild failure skips steps 2–4 for that artifact only. Nothing but a
//! configuration error stops the run.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;

use pallet_core::{
    config, ArtifactName, ArtifactTarget, ChangeResults, EnvironmentName, PalletConfig,
    ServiceState,
};

use crate::engine::{CommandEngine, RebuildEngine};
use crate::error::SwapError;
use crate::gate::GateCoordinator;
use crate::journal;
use crate::rebuild;
use crate::report::{ArtifactOutcome, ArtifactReport, RunReport};
use crate::resolver::{self, Dirtiness};
use crate::staging::StagingWorkspace;

/// Knobs shared by every artifact in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub extension_prefix: String,
    pub primary_extension: String,
    pub keep_failed_staging: bool,
}

/// Everything a run needs, resolved up front so configuration errors
/// surface before any artifact is touched.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub environment: EnvironmentName,
    pub settings: RunSettings,
    /// Declaration order.
    pub targets: Vec<ArtifactTarget>,
    /// Parallel to `targets`.
    pub resolution: Vec<Dirtiness>,
}

impl RunPlan {
    /// Dirty targets with their resolution, in declaration order.
    pub fn dirty(&self) -> impl Iterator<Item = (&ArtifactTarget, &Dirtiness)> {
        self.targets
            .iter()
            .zip(self.resolution.iter())
            .filter(|(_, d)| d.dirty)
    }
}

/// Resolve targets and dirtiness for `environment`.
///
/// The configuration is validated again here since callers may build it in
/// code rather than load it. `force` adds to the environment's own `force` list; unknown names are a
/// configuration error.
pub fn plan(
    cfg: &PalletConfig,
    environment: &EnvironmentName,
    changes: &ChangeResults,
    force: &[ArtifactName],
) -> Result<RunPlan, SwapError> {
    config::validate(cfg)?;
    let env = config::environment(cfg, environment)?;
    let targets = config::targets(cfg, environment)?;

    let mut forced = env.force.clone();
    for name in force {
        if !targets.iter().any(|t| &t.name == name) {
            return Err(pallet_core::ConfigError::UnknownForcedArtifact {
                environment: environment.0.clone(),
                artifact: name.0.clone(),
            }
            .into());
        }
        if !forced.contains(name) {
            forced.push(name.clone());
        }
    }

    let resolution = resolver::resolve_targets(&targets, changes, &forced);
    Ok(RunPlan {
        environment: environment.clone(),
        settings: RunSettings {
            extension_prefix: cfg.extension_prefix.clone(),
            primary_extension: cfg.primary_extension.clone(),
            keep_failed_staging: env.keep_failed_staging,
        },
        targets,
        resolution,
    })
}

/// Process every artifact of `plan`. Never fails; see the report.
pub fn execute(plan: &RunPlan, engine: &dyn RebuildEngine, gate: &GateCoordinator) -> RunReport {
    let started_at = Utc::now();
    let dirty: Vec<String> = plan.dirty().map(|(t, _)| t.name.0.clone()).collect();
    tracing::info!(environment = %plan.environment, "dirty artifacts: {}", dirty.join(","));

    let artifacts = plan
        .targets
        .iter()
        .zip(plan.resolution.iter())
        .map(|(target, dirtiness)| {
            let mut report = ArtifactReport::new(target.name.clone());
            report.triggered_by = dirtiness.triggered_by.clone();
            report.upstream_errors = dirtiness.upstream_errors.clone();
            report.forced = dirtiness.forced;
            if dirtiness.dirty {
                process_artifact(target, &plan.settings, engine, gate, &mut report);
            } else {
                tracing::debug!(artifact = %target.name, "not dirty; skipped");
            }
            report
        })
        .collect();

    RunReport {
        environment: plan.environment.clone(),
        started_at,
        finished_at: Utc::now(),
        artifacts,
    }
}

fn process_artifact(
    target: &ArtifactTarget,
    settings: &RunSettings,
    engine: &dyn RebuildEngine,
    gate: &GateCoordinator,
    report: &mut ArtifactReport,
) {
    let started = Instant::now();
    let workspace = StagingWorkspace::for_artifact(&target.live, &target.name);

    match rebuild::rebuild(target, &workspace, settings, engine) {
        Err(err) => {
            tracing::error!(
                artifact = %target.name,
                staging = %workspace.path().display(),
                error = %err,
                "rebuild failed; live copy left untouched"
            );
            report.outcome = ArtifactOutcome::FailedAtRebuild {
                error: err.to_string(),
            };
            if settings.keep_failed_staging {
                tracing::warn!(artifact = %target.name, "keeping {} for inspection", workspace.path().display());
            } else {
                cleanup(&workspace, report);
            }
        }
        Ok(staged) => {
            report.digest = Some(staged.digest.clone());

            tracing::debug!(artifact = %target.name, "stopping services");
            report.offline = gate.ensure(ServiceState::Offline, &target.services);

            report.distribution = crate::fanout::distribute(&staged, &target.live, &target.replicas);

            tracing::debug!(artifact = %target.name, "starting services");
            report.online = gate.ensure(ServiceState::Online, &target.services);

            cleanup(&workspace, report);
            report.outcome = report.classify_completed();
        }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(
        artifact = %target.name,
        outcome = report.outcome.key(),
        elapsed_ms = report.elapsed_ms,
        "artifact processed"
    );
}

fn cleanup(workspace: &StagingWorkspace, report: &mut ArtifactReport) {
    if let Err(err) = workspace.remove() {
        tracing::error!(staging = %workspace.path().display(), error = %err, "error removing staging directory");
        report.cleanup_error = Some(err.to_string());
    }
}

/// A finished run and whether it reached the journal.
#[derive(Debug)]
pub struct CompletedRun {
    pub report: RunReport,
    /// The artifacts were still processed; only `status` will not see them.
    pub journal_error: Option<SwapError>,
}

/// Plan, execute with the configured command engine and admin channels, and
/// journal the report under `home`.
///
/// Only planning errors are returned as `Err`. Once artifacts have been
/// processed the report is always handed back, even if journaling fails.
pub fn run(
    home: &Path,
    cfg: &PalletConfig,
    environment: &EnvironmentName,
    changes: &ChangeResults,
    force: &[ArtifactName],
) -> Result<CompletedRun, SwapError> {
    let plan = plan(cfg, environment, changes, force)?;
    let env = config::environment(cfg, environment)?;
    let engine = CommandEngine::new(&cfg.rebuild);
    let gate = GateCoordinator::from_config(&env.channels);

    let report = execute(&plan, &engine, &gate);
    let journal_error = journal::save_at(home, &report).err();
    if let Some(err) = &journal_error {
        tracing::error!(environment = %environment, error = %err, "failed to journal run report");
    }
    Ok(CompletedRun {
        report,
        journal_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pallet_core::{ChangeResult, SourceName};

    fn changed(source: &str) -> ChangeResults {
        [(SourceName::from(source), ChangeResult::Updated)]
            .into_iter()
            .collect()
    }

    #[test]
    fn plan_marks_centerline_locators_for_roads() {
        let cfg = config::scaffold();
        let plan = plan(&cfg, &EnvironmentName::from("Dev"), &changed("Roads"), &[]).expect("plan");
        let dirty: Vec<&str> = plan.dirty().map(|(t, _)| t.name.0.as_str()).collect();
        assert_eq!(
            dirty,
            vec![
                "Roads_AddressSystem_ACSALIAS",
                "Roads_AddressSystem_ALIAS1",
                "Roads_AddressSystem_ALIAS2",
                "Roads_AddressSystem_STREET",
            ]
        );
        assert_eq!(plan.targets.len(), plan.resolution.len());
    }

    #[test]
    fn plan_rejects_unknown_force() {
        let cfg = config::scaffold();
        let err = plan(
            &cfg,
            &EnvironmentName::from("Dev"),
            &ChangeResults::new(),
            &[ArtifactName::from("Nope")],
        )
        .unwrap_err();
        assert!(matches!(err, SwapError::Config(_)), "got: {err}");
    }

    #[test]
    fn plan_fails_fast_for_unknown_environment() {
        let cfg = config::scaffold();
        let err = plan(&cfg, &EnvironmentName::from("Test"), &ChangeResults::new(), &[]).unwrap_err();
        assert!(err.to_string().contains("unknown environment"));
    }

    #[test]
    fn unwritable_journal_still_returns_the_report() {
        let home = tempfile::TempDir::new().unwrap();
        let runs = pallet_core::paths::runs_dir(home.path());
        std::fs::create_dir_all(runs.parent().unwrap()).unwrap();
        std::fs::write(&runs, "not a directory").unwrap();

        let cfg = config::scaffold();
        let done = run(
            home.path(),
            &cfg,
            &EnvironmentName::from("Dev"),
            &ChangeResults::new(),
            &[],
        )
        .expect("planning succeeds");

        assert!(matches!(done.journal_error, Some(SwapError::Io { .. })), "got: {:?}", done.journal_error);
        assert_eq!(done.report.artifacts.len(), cfg.artifacts.len());
        assert!(done.report.is_success());
    }

    #[test]
    fn cli_force_merges_with_environment_force() {
        let mut cfg = config::scaffold();
        cfg.environments
            .get_mut(&EnvironmentName::from("Dev"))
            .unwrap()
            .force
            .push(ArtifactName::from("Roads_AddressSystem_ALIAS1"));
        let plan = plan(
            &cfg,
            &EnvironmentName::from("Dev"),
            &ChangeResults::new(),
            &[ArtifactName::from("AddressPoints_AddressSystem")],
        )
        .expect("plan");
        let dirty: Vec<&str> = plan.dirty().map(|(t, _)| t.name.0.as_str()).collect();
        assert_eq!(
            dirty,
            vec!["Roads_AddressSystem_ALIAS1", "AddressPoints_AddressSystem"]
        );
        assert!(plan.dirty().all(|(_, d)| d.forced));
    }
}

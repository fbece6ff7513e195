//! `pallet run`: rebuild, gate and distribute dirty locators.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use pallet_core::paths;
use pallet_swap::{pipeline, ArtifactOutcome, RunReport, ToggleStatus};

use super::status::{outcome_indicator, outcome_label};

/// Arguments for `pallet run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub changes: super::ChangeArgs,

    /// Also append the run log to a file (default ~/.pallet/logs/pallet.log).
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    pub log_file: Option<Option<PathBuf>>,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub fn log_file(&self) -> Result<Option<PathBuf>> {
        Ok(match &self.log_file {
            Some(Some(path)) => Some(path.clone()),
            Some(None) => Some(paths::log_path(&super::home()?)),
            None => None,
        })
    }

    pub fn run(self, config_path: Option<PathBuf>) -> Result<()> {
        let home = super::home()?;
        let cfg = super::load_config(config_path.as_deref())?;
        let env = self.changes.environment();
        tracing::info!(environment = %env, artifacts = cfg.artifacts.len(), "starting run");

        let done = pipeline::run(
            &home,
            &cfg,
            &env,
            &self.changes.change_results()?,
            &self.changes.forced(),
        )
        .with_context(|| format!("run failed for environment '{env}'"))?;
        let report = &done.report;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(report).context("failed to serialize run report")?
            );
        } else {
            print_report(report);
        }

        if let Some(err) = done.journal_error {
            return Err(anyhow::Error::new(err).context(format!(
                "run finished but its report was not saved; `pallet status --env {env}` will be stale"
            )));
        }
        let failures = report.failures();
        if failures > 0 {
            bail!("{failures} artifact(s) failed in '{env}'");
        }
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let elapsed = report.finished_at - report.started_at;
    println!(
        "Environment {} | {} rebuilt | {} failed | {} skipped | {:.1}s",
        report.environment,
        report.count("succeeded"),
        report.failures(),
        report.count("skipped"),
        elapsed.num_milliseconds() as f64 / 1000.0,
    );

    for artifact in &report.artifacts {
        if artifact.outcome == ArtifactOutcome::Skipped {
            continue;
        }
        println!(
            "  {} {} {}",
            outcome_indicator(&artifact.outcome),
            artifact.name.0.bold(),
            outcome_label(&artifact.outcome)
        );
        if let ArtifactOutcome::FailedAtRebuild { error } = &artifact.outcome {
            println!("       {error}");
        }
        for dest in artifact.distribution.iter().filter(|d| d.failed()) {
            println!("       {} copy to {} failed", "✗".red(), dest.path.display());
        }
        for toggle in artifact.offline.iter().chain(artifact.online.iter()) {
            match &toggle.status {
                ToggleStatus::Failed { error } => println!(
                    "       {} {} {} on '{}': {error}",
                    "✗".red(),
                    toggle.state,
                    toggle.service,
                    toggle.channel
                ),
                ToggleStatus::Skipped { reason } => println!(
                    "       {} {} {} on '{}' skipped: {reason}",
                    "!".yellow(),
                    toggle.state,
                    toggle.service,
                    toggle.channel
                ),
                ToggleStatus::Toggled => {}
            }
        }
        if let Some(err) = &artifact.cleanup_error {
            println!("       {} staging not removed: {err}", "!".yellow());
        }
    }

    for artifact in report.artifacts.iter().filter(|a| !a.upstream_errors.is_empty()) {
        let sources: Vec<&str> = artifact.upstream_errors.iter().map(|s| s.0.as_str()).collect();
        println!(
            "  {} {}: upstream error from {}",
            "!".yellow(),
            artifact.name,
            sources.join(", ")
        );
    }
}

//! `pallet plan`: show what `pallet run` would do, touching nothing.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use pallet_swap::pipeline;

/// Show the dirty set for an environment.
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub changes: super::ChangeArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct PlanJson {
    environment: String,
    artifacts: Vec<PlannedArtifactJson>,
}

#[derive(Serialize)]
struct PlannedArtifactJson {
    name: String,
    dirty: bool,
    forced: bool,
    triggered_by: Vec<String>,
    upstream_errors: Vec<String>,
    live: PathBuf,
    replicas: Vec<PathBuf>,
    services: Vec<String>,
}

impl PlanArgs {
    pub fn run(self, config_path: Option<PathBuf>) -> Result<()> {
        let cfg = super::load_config(config_path.as_deref())?;
        let env = self.changes.environment();
        let plan = pipeline::plan(
            &cfg,
            &env,
            &self.changes.change_results()?,
            &self.changes.forced(),
        )
        .with_context(|| format!("cannot plan environment '{env}'"))?;

        let artifacts: Vec<PlannedArtifactJson> = plan
            .targets
            .iter()
            .zip(plan.resolution.iter())
            .map(|(target, d)| PlannedArtifactJson {
                name: target.name.0.clone(),
                dirty: d.dirty,
                forced: d.forced,
                triggered_by: d.triggered_by.iter().map(|s| s.0.clone()).collect(),
                upstream_errors: d.upstream_errors.iter().map(|s| s.0.clone()).collect(),
                live: target.live.clone(),
                replicas: target.replicas.clone(),
                services: target.services.iter().map(|s| s.to_string()).collect(),
            })
            .collect();

        if self.json {
            let payload = PlanJson {
                environment: env.0,
                artifacts,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize plan JSON")?
            );
            return Ok(());
        }

        let dirty = artifacts.iter().filter(|a| a.dirty).count();
        println!("Environment {} | {} of {} artifacts dirty", env, dirty, artifacts.len());
        for a in &artifacts {
            if !a.dirty {
                println!("  {}  {}", "·".bright_black(), a.name.bright_black());
                for source in &a.upstream_errors {
                    println!("       {} upstream error from {source}", "!".yellow());
                }
                continue;
            }
            let reason = if a.forced {
                "forced".to_string()
            } else {
                format!("changed: {}", a.triggered_by.join(", "))
            };
            println!("  {}  {} ({reason})", "✎".green(), a.name.bold());
            println!("       live     {}", a.live.display());
            for replica in &a.replicas {
                println!("       replica  {}", replica.display());
            }
            for service in &a.services {
                println!("       service  {service}");
            }
        }
        Ok(())
    }
}

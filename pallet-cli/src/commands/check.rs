//! `pallet check`: validate the config against the filesystem.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use pallet_core::{config, EnvironmentName, PalletConfig};
use pallet_swap::fileset::FileSet;

/// Validate the config and check that each live locator is present.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Only check this environment.
    #[arg(long, short = 'e', value_name = "NAME")]
    pub env: Option<String>,
}

impl CheckArgs {
    pub fn run(self, config_path: Option<PathBuf>) -> Result<()> {
        let cfg = super::load_config(config_path.as_deref())?;
        println!("✓ Config valid ({} artifacts)", cfg.artifacts.len());

        let environments: Vec<EnvironmentName> = match &self.env {
            Some(name) => vec![EnvironmentName::from(name.as_str())],
            None => cfg.environments.keys().cloned().collect(),
        };

        let mut problems = 0;
        for env in &environments {
            problems += check_environment(&cfg, env)?;
        }
        if problems > 0 {
            bail!("{problems} problem(s) found");
        }
        Ok(())
    }
}

fn check_environment(cfg: &PalletConfig, env_name: &EnvironmentName) -> Result<usize> {
    let env = config::environment(cfg, env_name)?;
    println!("{}", env_name.0.to_uppercase().bold());

    let targets = match config::targets(cfg, env_name) {
        Ok(targets) => targets,
        Err(err) => {
            println!("  {} {err}", "✗".red());
            return Ok(1);
        }
    };

    let mut problems = 0;
    let primary_ext = &cfg.primary_extension;
    for target in &targets {
        let files = FileSet::list(&target.live, &target.name, &cfg.extension_prefix)?;
        let primary = format!("{}.{primary_ext}", target.name);
        if files.contains(&primary) {
            println!(
                "  {} {} ({} files in {})",
                "✓".green(),
                target.name,
                files.names.len(),
                target.live.display()
            );
        } else {
            problems += 1;
            println!(
                "  {} {} missing from {}",
                "✗".red(),
                primary,
                target.live.display()
            );
        }
    }

    for channel in &env.channels {
        if channel.credentials().is_some() {
            println!("  {} channel '{}' at {}", "✓".green(), channel.name, channel.admin_url());
        } else {
            println!(
                "  {} channel '{}' has no credentials; it will be skipped",
                "!".yellow(),
                channel.name
            );
        }
    }
    Ok(problems)
}

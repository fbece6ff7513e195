//! `pallet init`: scaffold the config file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use pallet_core::{config, paths};

/// Write a starter config.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self, config_path: Option<PathBuf>) -> Result<()> {
        let (path, created) = match config_path {
            Some(path) => {
                let created = !path.exists();
                if created {
                    config::save_to(&path, &config::scaffold())
                        .with_context(|| format!("failed to write '{}'", path.display()))?;
                } else {
                    config::load_from(&path)
                        .with_context(|| format!("existing config '{}' is invalid", path.display()))?;
                }
                (path, created)
            }
            None => {
                let home = super::home()?;
                let (_, created) = config::init_at(&home).context("failed to initialise config")?;
                (paths::config_path(&home), created)
            }
        };

        if created {
            println!("✓ Wrote starter config to {}", path.display());
            println!("  Edit locators_path, copy_destinations and channels per environment.");
        } else {
            println!("✓ Config already exists at {}", path.display());
        }
        Ok(())
    }
}

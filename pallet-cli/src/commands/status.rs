//! `pallet status`: last run per environment.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use pallet_core::EnvironmentName;
use pallet_swap::{journal, ArtifactOutcome, ArtifactReport, RunReport};

/// Arguments for `pallet status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this environment.
    #[arg(long, short = 'e', value_name = "NAME")]
    pub env: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = super::home()?;
        let reports = load_reports(&home, self.env.as_deref())?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&reports).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_tables(&reports);
        Ok(())
    }
}

fn load_reports(home: &Path, only: Option<&str>) -> Result<Vec<RunReport>> {
    let environments = match only {
        Some(name) => vec![EnvironmentName::from(name)],
        None => journal::list_at(home).context("failed to list run journals")?,
    };
    let mut reports = Vec::new();
    for env in environments {
        let report = journal::load_at(home, &env)
            .with_context(|| format!("failed to load run journal for '{env}'"))?;
        if let Some(report) = report {
            reports.push(report);
        }
    }
    Ok(reports)
}

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "artifact")]
    artifact: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "trigger")]
    trigger: String,
    #[tabled(rename = "copies")]
    copies: String,
    #[tabled(rename = "time")]
    time: String,
}

fn print_tables(reports: &[RunReport]) {
    if reports.is_empty() {
        println!("No runs recorded. Run `pallet run --env <name>` first.");
        return;
    }

    let separator = "■".repeat(67).bright_black().to_string();
    println!(
        "Indicators: {} SUCCEEDED  {} FAILED  {} SKIPPED",
        outcome_indicator(&ArtifactOutcome::Succeeded),
        outcome_indicator(&ArtifactOutcome::FailedAtDistribution),
        outcome_indicator(&ArtifactOutcome::Skipped),
    );
    println!("{separator}");
    for report in reports {
        println!(
            "{} | finished {} | {} failed",
            report.environment.0.to_uppercase().bold(),
            format_age(report.finished_at),
            report.failures()
        );
        let rows: Vec<ArtifactRow> = report.artifacts.iter().map(row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{separator}");
    }
}

fn row(artifact: &ArtifactReport) -> ArtifactRow {
    let trigger = if artifact.forced {
        "forced".to_string()
    } else {
        artifact
            .triggered_by
            .iter()
            .map(|s| s.0.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let copies = if artifact.distribution.is_empty() {
        "-".to_string()
    } else {
        let ok = artifact.distribution.iter().filter(|d| !d.failed()).count();
        format!("{ok}/{}", artifact.distribution.len())
    };
    let time = if artifact.outcome == ArtifactOutcome::Skipped {
        "-".to_string()
    } else {
        format!("{:.1}s", artifact.elapsed_ms as f64 / 1000.0)
    };
    ArtifactRow {
        artifact: artifact.name.0.clone(),
        outcome: outcome_label(&artifact.outcome).to_string(),
        trigger,
        copies,
        time,
    }
}

pub fn outcome_label(outcome: &ArtifactOutcome) -> &'static str {
    match outcome {
        ArtifactOutcome::Skipped => "SKIPPED",
        ArtifactOutcome::Succeeded => "SUCCEEDED",
        ArtifactOutcome::FailedAtRebuild { .. } => "FAILED (rebuild)",
        ArtifactOutcome::FailedAtToggle => "FAILED (toggle)",
        ArtifactOutcome::FailedAtDistribution => "FAILED (distribution)",
    }
}

pub fn outcome_indicator(outcome: &ArtifactOutcome) -> String {
    match outcome {
        ArtifactOutcome::Skipped => "■".bright_black().bold().to_string(),
        ArtifactOutcome::Succeeded => "■".green().bold().to_string(),
        ArtifactOutcome::FailedAtToggle => "■".yellow().bold().to_string(),
        ArtifactOutcome::FailedAtRebuild { .. } | ArtifactOutcome::FailedAtDistribution => {
            "■".red().bold().to_string()
        }
    }
}

/// "just now", "5m ago", "3h ago", "2d ago".
fn format_age(at: DateTime<Utc>) -> String {
    let secs = (Utc::now() - at).num_seconds().max(0);
    match secs {
        0..=59 => "just now".to_string(),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

//! Run reports: the last run persisted as JSON, and its terminal summary

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use stagekit::{DeploymentRun, RunOutcome};

use crate::ui;

const REPORT_FILE: &str = "last-run.json";

pub fn report_path(state_dir: &Path) -> PathBuf {
    state_dir.join(REPORT_FILE)
}

/// Persist `run` as the last run
pub fn save(state_dir: &Path, run: &DeploymentRun) -> Result<PathBuf> {
    fs::create_dir_all(state_dir)
        .with_context(|| format!("Could not create {}", state_dir.display()))?;
    let path = report_path(state_dir);
    let content = serde_json::to_string_pretty(run).context("Failed to serialize run report")?;
    fs::write(&path, content).with_context(|| format!("Could not write {}", path.display()))?;
    log::debug!("saved run report to {}", path.display());
    Ok(path)
}

/// Load the last run, if one was recorded
pub fn load(state_dir: &Path) -> Result<Option<DeploymentRun>> {
    let path = report_path(state_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let run = serde_json::from_str(&content)
        .with_context(|| format!("Invalid run report in {}", path.display()))?;
    Ok(Some(run))
}

/// One-line verdict for an outcome
pub fn headline(run: &DeploymentRun) -> String {
    match run.outcome {
        Some(RunOutcome::Succeeded) => format!("{} succeeded", run.mode),
        Some(RunOutcome::PartiallyApplied) => format!(
            "{} stopped at '{}'; earlier stages remain applied",
            run.mode,
            run.failed_stage().map_or("?", |s| s.name.as_str())
        ),
        Some(RunOutcome::Aborted) => format!(
            "{} aborted by operator; nothing was rolled back",
            run.mode
        ),
        Some(RunOutcome::Failed) => format!("{} failed before completing a stage", run.mode),
        None => format!("{} did not finish", run.mode),
    }
}

/// Print the per-stage table and outcome
pub fn print_summary(run: &DeploymentRun) {
    ui::section("Summary");
    for stage in &run.stages {
        let note = stage
            .failure
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| stage.detail.clone())
            .unwrap_or_default();
        println!(
            "  {} {:<16} {:<10} {}",
            ui::status_marker(stage.status),
            stage.name,
            stage.status.to_string(),
            note.dimmed()
        );
    }

    if let Some(finished) = run.finished_at {
        let secs = (finished - run.started_at).num_seconds().max(0) as u64;
        ui::kv("duration", &ui::format_duration(secs));
    }

    for warning in &run.warnings {
        ui::warn(warning);
    }

    println!();
    let line = headline(run);
    match run.outcome {
        Some(RunOutcome::Succeeded) => ui::success(&line),
        Some(RunOutcome::Aborted) => ui::info(&line),
        _ if !run.is_fatal() => ui::warn(&line),
        _ => ui::error(&line),
    }
}

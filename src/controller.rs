//! Mode controller - the one path every provisioning command takes
//!
//! settings → pre-flight → engines → stage list → sequencer → report.
//! Nothing touches an engine until pre-flight came back clean.

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::time::Duration;

use enginekit::{Ansible, SshProbe, TcpProbe, Terraform};
use stagekit::{
    DeploymentRun, InventoryMaterializer, Mode, Probe, ReadinessProber, Sequencer, Stage,
    StageKind, StagePlanner, StageStatus, SystemClock,
};

use crate::Context;
use crate::preflight::{self, Host, SettingsState};
use crate::settings::{LoadedSettings, ProbeMethod};
use crate::terminal::{TerminalObserver, TerminalPrompt};
use crate::{paths, report, ui};

/// What the operator asked for on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub mode: Mode,
    pub auto_approve: bool,
    pub skip_destroy: bool,
    pub skip_deploy: bool,
}

impl Request {
    /// `mode` with its default confirmation behaviour and no skip flags
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            auto_approve: StagePlanner::default_auto_approve(mode),
            skip_destroy: false,
            skip_deploy: false,
        }
    }

    /// `deploy`: everything, unattended
    pub fn deploy() -> Self {
        Self::new(Mode::FullApply)
    }

    /// `layered-deploy [--dry-run] [--skip-confirm]`
    pub fn layered(dry_run: bool, skip_confirm: bool) -> Self {
        let mode = if dry_run {
            Mode::DryRun
        } else {
            Mode::LayeredApply
        };
        let mut request = Self::new(mode);
        request.auto_approve |= skip_confirm;
        request
    }

    /// `destroy [--auto-approve]`
    pub fn destroy(auto_approve: bool) -> Self {
        let mut request = Self::new(Mode::Destroy);
        request.auto_approve |= auto_approve;
        request
    }

    /// `redeploy [--skip-destroy] [--skip-deploy] [--auto-approve]`
    pub fn redeploy(skip_destroy: bool, skip_deploy: bool, auto_approve: bool) -> Self {
        let mut request = Self::new(Mode::Redeploy);
        request.auto_approve |= auto_approve;
        request.skip_destroy = skip_destroy;
        request.skip_deploy = skip_deploy;
        request
    }
}

/// Build the run for `request`, with skip flags pre-marked as skipped stages
pub fn build_run(planner: &StagePlanner, request: &Request) -> Result<DeploymentRun> {
    let mut run = DeploymentRun::new(
        request.mode,
        request.auto_approve,
        planner.stages(request.mode),
    )?;

    if request.skip_destroy {
        run.skip_where(
            |s| s.kind == StageKind::InfrastructureDestroy,
            "--skip-destroy",
        )?;
    }
    if request.skip_deploy {
        run.skip_where(
            |s| s.kind != StageKind::InfrastructureDestroy,
            "--skip-deploy",
        )?;
    }
    Ok(run)
}

/// Turn a finished run into the process result
pub fn conclude(run: &DeploymentRun) -> Result<()> {
    if !run.is_fatal() {
        return Ok(());
    }
    match run.failed_stage().and_then(|s| s.failure.as_ref()) {
        Some(failure) => anyhow::bail!("{failure}\n{}", failure.suggestion()),
        None => anyhow::bail!("{}", report::headline(run)),
    }
}

/// Print the stage list a run will walk through
pub fn print_stages(stages: &[Stage], auto_approve: bool) {
    ui::section("Stages");
    for stage in stages {
        let gate = if !stage.requires_confirmation {
            String::new()
        } else if auto_approve {
            "[auto-approved]".dimmed().to_string()
        } else {
            "[confirm]".yellow().to_string()
        };
        let line = format!(
            "  {:>2}. {:<16} {:<24} {}",
            stage.order,
            stage.name,
            stage.kind.to_string(),
            gate
        );
        if stage.status == StageStatus::Skipped {
            let reason = stage.detail.as_deref().unwrap_or("skipped");
            println!("{} {}", line.dimmed(), format!("(skipped: {reason})").dimmed());
        } else {
            println!("{line}");
        }
    }
}

fn build_probe(loaded: &LoadedSettings) -> Box<dyn Probe> {
    let readiness = &loaded.settings.readiness;
    let connect_timeout = Duration::from_secs(readiness.connect_timeout_seconds);
    match readiness.method {
        ProbeMethod::Tcp => Box::new(TcpProbe::new(readiness.port, connect_timeout)),
        ProbeMethod::Ssh => Box::new(
            SshProbe::new(readiness.port, connect_timeout)
                .with_identity(paths::expand(&loaded.settings.access.ssh_private_key)),
        ),
    }
}

/// Run one provisioning command end to end
pub fn run(ctx: &Context, request: Request) -> Result<()> {
    let mode = request.mode;
    ui::header(&format!("stackup {mode}"));

    let settings_file = paths::settings_file(ctx.settings.as_deref());
    let state = SettingsState::load(&settings_file);

    let issues = preflight::check(&request, &state, Host::system());
    if !issues.is_empty() {
        preflight::print_issue_summary(&issues);
        anyhow::bail!(
            "Pre-flight checks failed with {} issue(s); no stage was run",
            issues.len()
        );
    }

    let loaded = match state {
        SettingsState::Loaded(loaded) => loaded,
        _ => {
            ui::warn(&format!(
                "{} not found, planning with built-in defaults",
                settings_file.display()
            ));
            LoadedSettings::defaults(paths::project_dir(&settings_file))
        }
    };
    let settings = &loaded.settings;
    let state_dir = paths::state_dir(&loaded.base_dir);
    let working_dir = loaded.working_dir();
    let live_output = ctx.verbose > 0;

    if let Some(source) = &loaded.source {
        ui::kv("settings", &source.display().to_string());
    }
    ui::kv("engine dir", &working_dir.display().to_string());

    let mut terraform = Terraform::new(
        loaded.binary(&settings.infrastructure.binary),
        &working_dir,
    )
    .streaming(live_output);
    if loaded.source.is_some() {
        let var_file = settings.write_engine_variables(&working_dir)?;
        terraform = terraform.with_var_file(var_file);
    }

    let ansible = Ansible::new(
        loaded.binary(&settings.configuration.binary),
        loaded.playbook(),
    )
    .with_extra_args(settings.configuration.extra_args.clone())
    .with_ssh_retries(settings.configuration.ssh_retries)
    .streaming(live_output);

    let materializer = InventoryMaterializer::new(
        settings.outputs.clone(),
        settings.configuration.group.clone(),
        loaded.inventory_path(&state_dir),
    );
    let probe = build_probe(&loaded);
    let clock = SystemClock::new();

    let planner = StagePlanner::new(settings.infrastructure.layers.clone());
    let mut run = build_run(&planner, &request)?;
    if !ctx.quiet {
        print_stages(&run.stages, run.auto_approve);
    }

    let sequencer = Sequencer::new(
        &terraform,
        &ansible,
        &materializer,
        ReadinessProber::new(probe.as_ref(), &clock),
        settings.readiness.policy(),
    );
    let mut prompt = TerminalPrompt::detect();
    let mut observer = TerminalObserver::new(live_output);
    let executed = sequencer.execute(&mut run, &mut prompt, &mut observer);

    match report::save(&state_dir, &run) {
        Ok(path) => log::info!("run report written to {}", path.display()),
        Err(e) => log::warn!("could not save run report: {e:#}"),
    }
    report::print_summary(&run);

    executed.context("Deployment run could not continue")?;
    conclude(&run)
}

//! Terminal collaborators for the sequencer: the operator prompt and the
//! progress observer.

use colored::Colorize;
use dialoguer::Input;
use indicatif::ProgressBar;
use std::io::{self, IsTerminal, Stderr, StdinLock};

use stagekit::{
    DeploymentRun, LinePrompt, OperatorPrompt, ReadinessCheck, Stage, StageKind, StageObserver,
    StageStatus,
};

use crate::{progress, ui};

/// Reads gate answers from the operator
pub enum TerminalPrompt {
    /// Line editor on a real terminal
    Interactive,
    /// Plain line reads when stdin is piped
    Lines(LinePrompt<StdinLock<'static>, Stderr>),
}

impl TerminalPrompt {
    pub fn detect() -> Self {
        if io::stdin().is_terminal() && console::user_attended_stderr() {
            Self::Interactive
        } else {
            log::debug!("stdin is not a terminal, reading gate answers line by line");
            Self::Lines(LinePrompt::new(io::stdin().lock(), io::stderr()))
        }
    }
}

impl OperatorPrompt for TerminalPrompt {
    fn read_answer(&mut self, prompt: &str) -> io::Result<String> {
        match self {
            Self::Interactive => {
                println!();
                Input::<String>::new()
                    .with_prompt(format!("{prompt} [y/N]"))
                    .allow_empty(true)
                    .interact_text()
                    .map_err(io::Error::other)
            }
            Self::Lines(lines) => lines.read_answer(prompt),
        }
    }
}

/// Renders stage progress with step headers and spinners
pub struct TerminalObserver {
    spinner: Option<ProgressBar>,
    /// A warning was raised while the current stage ran
    warned: bool,
    /// Engine output goes straight to the terminal, so no spinner over it
    live_output: bool,
}

impl TerminalObserver {
    pub fn new(live_output: bool) -> Self {
        Self {
            spinner: None,
            warned: false,
            live_output,
        }
    }

    fn wants_spinner(&self, stage: &Stage) -> bool {
        !self.live_output || stage.kind == StageKind::ReadinessWait
    }
}

fn activity(stage: &Stage) -> &'static str {
    match stage.kind {
        StageKind::InfrastructurePlan => "Planning infrastructure...",
        StageKind::InfrastructureApply => "Applying infrastructure...",
        StageKind::InfrastructureDestroy => "Destroying infrastructure...",
        StageKind::ReadinessWait => "Waiting for target...",
        StageKind::ConfigurationApply => "Applying configuration...",
    }
}

impl StageObserver for TerminalObserver {
    fn on_stage_start(&mut self, position: usize, total: usize, stage: &Stage) {
        println!();
        ui::step(
            position,
            total,
            &format!("{} {}", stage.name.bold(), format!("({})", stage.kind).dimmed()),
        );
        self.warned = false;
        if self.wants_spinner(stage) {
            self.spinner = Some(progress::spinner(activity(stage)));
        }
    }

    fn on_stage_complete(&mut self, stage: &Stage) {
        let spinner = self.spinner.take();
        let detail = stage.detail.clone().unwrap_or_else(|| stage.status.to_string());

        match (stage.status, spinner) {
            (StageStatus::Succeeded, Some(pb)) if self.warned => {
                progress::finish_warn(&pb, &detail);
            }
            (StageStatus::Succeeded, Some(pb)) => progress::finish_success(&pb, &detail),
            (StageStatus::Succeeded, None) => println!("  {} {}", "✓".green(), detail),
            (StageStatus::Failed, pb) => {
                let msg = stage
                    .failure
                    .as_ref()
                    .map_or_else(|| "failed".to_string(), ToString::to_string);
                match pb {
                    Some(pb) => progress::finish_error(&pb, &msg),
                    None => eprintln!("  {} {}", "✗".red(), msg),
                }
            }
            (_, pb) => {
                if let Some(pb) = pb {
                    progress::finish_clear(&pb);
                }
                ui::dim(&format!("{} skipped: {}", stage.name, detail));
            }
        }
    }

    fn on_probe_attempt(&mut self, check: &ReadinessCheck, ready: bool) {
        if let Some(pb) = &self.spinner {
            let state = if ready { "answered" } else { "not answering yet" };
            pb.set_message(format!(
                "Waiting for {} ({state}, attempt {}/{})",
                check.target, check.attempts_made, check.policy.max_attempts
            ));
        }
    }

    fn on_warning(&mut self, message: &str) {
        self.warned = true;
        match &self.spinner {
            Some(pb) => pb.suspend(|| ui::warn(message)),
            None => ui::warn(message),
        }
    }

    fn on_run_complete(&mut self, _run: &DeploymentRun) {
        if let Some(pb) = self.spinner.take() {
            progress::finish_clear(&pb);
        }
    }
}

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use stagekit::Mode;

use crate::paths::ENV_SETTINGS;

#[derive(Parser)]
#[command(name = "stackup")]
#[command(version)]
#[command(about = "Staged infrastructure provisioning and configuration", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v streams engine output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file [default: ./stackup.toml]
    #[arg(long, global = true, env = ENV_SETTINGS)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Plan and apply everything without confirmation
    Deploy,

    /// Apply infrastructure layer by layer, confirming each stage
    LayeredDeploy {
        /// Plan every stage without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Do not ask for confirmation between stages
        #[arg(long)]
        skip_confirm: bool,
    },

    /// Tear down all provisioned resources
    Destroy {
        /// Do not ask for confirmation
        #[arg(long)]
        auto_approve: bool,
    },

    /// Destroy, then run a layered deploy
    Redeploy {
        /// Keep existing resources and only deploy
        #[arg(long, conflicts_with = "skip_deploy")]
        skip_destroy: bool,

        /// Only destroy
        #[arg(long)]
        skip_deploy: bool,

        /// Do not ask for confirmation between stages
        #[arg(long)]
        auto_approve: bool,
    },

    /// Run pre-flight checks for every mode
    Doctor,

    /// Show the stages a mode would run
    Stages {
        #[arg(value_enum, default_value_t = ModeArg::Layered)]
        mode: ModeArg,
    },

    /// Show the last recorded run
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Full,
    Layered,
    DryRun,
    Destroy,
    Redeploy,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Full => Self::FullApply,
            ModeArg::Layered => Self::LayeredApply,
            ModeArg::DryRun => Self::DryRun,
            ModeArg::Destroy => Self::Destroy,
            ModeArg::Redeploy => Self::Redeploy,
        }
    }
}

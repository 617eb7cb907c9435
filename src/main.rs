mod cli;
mod commands;
mod controller;
mod paths;
mod preflight;
mod progress;
mod report;
mod settings;
mod terminal;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use controller::Request;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Settings file from `--settings` / `STACKUP_SETTINGS`
    pub settings: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        settings: cli.settings,
    };

    match cli.command {
        Command::Deploy => commands::deploy::run(&ctx, Request::deploy()),
        Command::LayeredDeploy {
            dry_run,
            skip_confirm,
        } => commands::deploy::run(&ctx, Request::layered(dry_run, skip_confirm)),
        Command::Destroy { auto_approve } => commands::destroy::run(&ctx, auto_approve),
        Command::Redeploy {
            skip_destroy,
            skip_deploy,
            auto_approve,
        } => commands::redeploy::run(&ctx, skip_destroy, skip_deploy, auto_approve),
        Command::Doctor => commands::doctor::run(&ctx),
        Command::Stages { mode } => commands::stages::run(&ctx, mode.into()),
        Command::Status => commands::status::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "stackup", &mut io::stdout());
            Ok(())
        }
    }
}

use anyhow::Result;
use colored::Colorize;

use stagekit::Mode;

use crate::Context;
use crate::controller::Request;
use crate::paths;
use crate::preflight::{self, Host, Issue, SettingsState};
use crate::ui;

/// Run the pre-flight checks of every mode without touching an engine
pub fn run(ctx: &Context) -> Result<()> {
    ui::header("Pre-flight Check");

    let settings_file = paths::settings_file(ctx.settings.as_deref());
    let state = SettingsState::load(&settings_file);
    ui::kv("settings", &settings_file.display().to_string());

    ui::section("Modes");
    let issues = collect(&state, Host::system(), |mode, found| {
        if found == 0 {
            println!("  {} {}", "✓".green(), mode);
        } else {
            println!(
                "  {} {} {}",
                "✗".red(),
                mode,
                format!("({found} issue(s))").red()
            );
        }
    });

    println!();
    if issues.is_empty() {
        ui::success("Ready to deploy");
    } else {
        preflight::print_issue_summary(&issues);
    }
    Ok(())
}

/// Issues across all modes, each reported once
fn collect<F>(state: &SettingsState, host: Host, mut per_mode: F) -> Vec<Issue>
where
    F: FnMut(Mode, usize),
{
    let mut issues: Vec<Issue> = Vec::new();
    for &mode in Mode::all() {
        let found = preflight::check(&Request::new(mode), state, host);
        per_mode(mode, found.len());
        for issue in found {
            let seen = issues
                .iter()
                .any(|i| i.category == issue.category && i.summary == issue.summary);
            if !seen {
                issues.push(issue);
            }
        }
    }
    issues
}

use anyhow::Result;

use crate::Context;
use crate::{paths, report, ui};

/// Show the last recorded run for the current project
pub fn run(ctx: &Context) -> Result<()> {
    let settings_file = paths::settings_file(ctx.settings.as_deref());
    let state_dir = paths::state_dir(&paths::project_dir(&settings_file));

    let Some(run) = report::load(&state_dir)? else {
        ui::info("No runs recorded yet");
        return Ok(());
    };

    ui::header(&format!("Last run: {}", run.mode));
    ui::kv(
        "started",
        &run.started_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    );
    ui::kv("auto-approve", if run.auto_approve { "yes" } else { "no" });
    if let Some(inventory) = &run.inventory {
        ui::kv("inventory", &inventory.path.display().to_string());
    }
    if !run.outputs.is_empty() {
        ui::section("Outputs");
        for (key, value) in &run.outputs {
            ui::kv(key, value);
        }
    }
    report::print_summary(&run);
    Ok(())
}

use anyhow::Result;

use stagekit::{Mode, StagePlanner};

use crate::Context;
use crate::controller::{self, Request};
use crate::paths;
use crate::settings::LoadedSettings;
use crate::ui;

/// Print the stage list `mode` would execute, without running anything
pub fn run(ctx: &Context, mode: Mode) -> Result<()> {
    let settings_file = paths::settings_file(ctx.settings.as_deref());
    let loaded = if settings_file.exists() {
        LoadedSettings::from_file(&settings_file)?
    } else {
        ui::dim(&format!(
            "{} not found, showing stages for built-in defaults",
            settings_file.display()
        ));
        LoadedSettings::defaults(paths::project_dir(&settings_file))
    };

    let request = Request::new(mode);
    let planner = StagePlanner::new(loaded.settings.infrastructure.layers.clone());
    let run = controller::build_run(&planner, &request)?;

    ui::header(&format!("stackup {mode}"));
    controller::print_stages(&run.stages, run.auto_approve);
    Ok(())
}

use anyhow::Result;

use crate::Context;
use crate::controller::{self, Request};
use crate::ui;

pub fn run(ctx: &Context, skip_destroy: bool, skip_deploy: bool, auto_approve: bool) -> Result<()> {
    if !ctx.quiet {
        if skip_destroy {
            ui::dim("--skip-destroy: existing resources are kept");
        }
        if skip_deploy {
            ui::dim("--skip-deploy: resources are destroyed and not re-created");
        }
    }
    controller::run(
        ctx,
        Request::redeploy(skip_destroy, skip_deploy, auto_approve),
    )
}

use anyhow::Result;

use crate::Context;
use crate::controller::{self, Request};
use crate::ui;

pub fn run(ctx: &Context, auto_approve: bool) -> Result<()> {
    if auto_approve && !ctx.quiet {
        ui::warn("--auto-approve: every provisioned resource will be destroyed without asking");
    }
    controller::run(ctx, Request::destroy(auto_approve))
}

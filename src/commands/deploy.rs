use anyhow::Result;

use crate::Context;
use crate::controller::{self, Request};

/// `deploy` and `layered-deploy`; the request already carries the mode
pub fn run(ctx: &Context, request: Request) -> Result<()> {
    controller::run(ctx, request)
}

use anyhow::{Context, bail};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{DropAllArgs, DropArgs};
use crate::context::AppContext;
use crate::output::output;

/// Handle `tempora drop`.
pub async fn handle(args: &DropArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let report = ctx
        .service
        .drop_history(&args.table)
        .await
        .with_context(|| format!("failed to drop history for '{}'", args.table))?;
    output(&report, flags.format)
}

/// Handle `tempora drop-all`.
pub async fn handle_all(args: &DropAllArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    if !args.yes {
        bail!("drop-all removes all recorded history; pass --yes to confirm");
    }
    let report = ctx.service.drop_all().await.context("drop-all failed")?;
    output(&report, flags.format)
}

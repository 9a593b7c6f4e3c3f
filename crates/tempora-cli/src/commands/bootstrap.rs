use anyhow::Context;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::BootstrapArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `tempora bootstrap`.
pub async fn handle(args: &BootstrapArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let reports = if args.tables.is_empty() {
        ctx.service
            .bootstrap_from_config()
            .await
            .context("bootstrap from history.versioned_tables failed")?
    } else {
        ctx.service
            .bootstrap(args.tables.as_slice())
            .await
            .context("bootstrap failed")?
    };
    output(&reports, flags.format)
}

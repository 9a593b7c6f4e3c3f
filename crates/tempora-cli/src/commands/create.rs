use anyhow::Context;
use tempora_db::synth::SynthesisOptions;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::CreateArgs;
use crate::context::AppContext;
use crate::output::output;

/// Handle `tempora create`.
pub async fn handle(args: &CreateArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let options = SynthesisOptions {
        install_capture: !args.no_capture,
        follow_inheritance: ctx.service.follows_inheritance() && !args.no_inheritance,
    };
    let report = ctx
        .service
        .create_history_with(&args.table, options)
        .await
        .with_context(|| format!("failed to create history for '{}'", args.table))?;
    output(&report, flags.format)
}

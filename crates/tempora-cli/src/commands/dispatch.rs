use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Bootstrap(args) => commands::bootstrap::handle(&args, ctx, flags).await,
        Commands::Create(args) => commands::create::handle(&args, ctx, flags).await,
        Commands::Drop(args) => commands::drop::handle(&args, ctx, flags).await,
        Commands::DropAll(args) => commands::drop::handle_all(&args, ctx, flags).await,
        Commands::List => commands::list::handle(ctx, flags).await,
        Commands::History(args) => commands::history::handle(&args, ctx, flags).await,
        Commands::Versions(args) => commands::history::handle_versions(&args, ctx, flags).await,
    }
}

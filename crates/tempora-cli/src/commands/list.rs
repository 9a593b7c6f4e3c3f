use serde::Serialize;

use crate::cli::GlobalFlags;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct ListedTable {
    live_table: String,
    history_table: String,
    created: String,
    configured: bool,
    capture: bool,
}

/// Handle `tempora list`.
pub async fn handle(ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let configured = &ctx.config.history.versioned_tables;
    let mut listed = Vec::new();
    for entry in ctx.service.registry_entries().await? {
        let capture = ctx
            .service
            .capture_hook(&entry.live_table_name)
            .await?
            .is_some_and(|hook| hook.history_table == entry.history_table_name);
        listed.push(ListedTable {
            configured: configured.contains(&entry.live_table_name),
            live_table: entry.live_table_name,
            history_table: entry.history_table_name,
            created: entry.creation_time.to_rfc3339(),
            capture,
        });
    }

    for missing in configured
        .iter()
        .filter(|name| !listed.iter().any(|t| &t.live_table == *name))
    {
        tracing::warn!("'{missing}' is configured but not versioned; run 'tempora bootstrap'");
    }

    output(&listed, flags.format)
}

use anyhow::Context;
use serde_json::{Map, Value as Json};
use tempora_core::clock::parse_timestamp;
use tempora_core::{Clock, HistoryRow, SystemClock, Value};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{HistoryArgs, VersionsArgs};
use crate::context::AppContext;
use crate::output::output;

/// Handle `tempora history`.
pub async fn handle(args: &HistoryArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let rows = if args.current {
        ctx.service.current_of(&args.table).await?
    } else {
        let at = match &args.at {
            Some(at) => parse_timestamp(at).context("--at must be an RFC 3339 timestamp")?,
            None => SystemClock.now(),
        };
        ctx.service.history_of(&args.table, at).await?
    };
    output(&flatten(&rows)?, flags.format)
}

/// Handle `tempora versions`.
pub async fn handle_versions(
    args: &VersionsArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let rows = ctx
        .service
        .versions_of(&args.table, parse_identity(&args.id))
        .await?;
    output(&flatten(&rows)?, flags.format)
}

fn parse_identity(raw: &str) -> Value {
    raw.parse::<i64>()
        .map_or_else(|_| Value::Text(raw.to_string()), Value::Integer)
}

/// One flat object per row: image columns plus the validity range.
fn flatten(rows: &[HistoryRow]) -> anyhow::Result<Vec<Map<String, Json>>> {
    rows.iter()
        .map(|row| -> anyhow::Result<Map<String, Json>> {
            let mut map = Map::new();
            for (column, value) in row.image.iter() {
                map.insert(column.to_string(), serde_json::to_value(value)?);
            }
            map.insert("valid_from".into(), Json::String(row.valid_from.to_rfc3339()));
            map.insert(
                "valid_to".into(),
                row.valid_to.map_or(Json::Null, |to| Json::String(to.to_rfc3339())),
            );
            map.insert("source".into(), Json::String(row.history_table.clone()));
            Ok(map)
        })
        .collect()
}

use clap::{Args, Subcommand};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Version a set of tables (defaults to `history.versioned_tables`).
    Bootstrap(BootstrapArgs),
    /// Create the history table for one live table.
    Create(CreateArgs),
    /// Drop the history of a table and every table inheriting it.
    Drop(DropArgs),
    /// Drop every history table, hook, and registry entry.
    DropAll(DropAllArgs),
    /// List versioned tables.
    List,
    /// Show rows of a table's history that were current at an instant.
    History(HistoryArgs),
    /// Show every recorded interval of one row.
    Versions(VersionsArgs),
}

#[derive(Clone, Debug, Args)]
pub struct BootstrapArgs {
    /// Tables to version, in order.
    pub tables: Vec<String>,
}

#[derive(Clone, Debug, Args)]
pub struct CreateArgs {
    /// Live table name.
    pub table: String,
    /// Create the structure only; no capture hook, no registry entry.
    #[arg(long)]
    pub no_capture: bool,
    /// Do not mirror the live inheritance chain.
    #[arg(long)]
    pub no_inheritance: bool,
}

#[derive(Clone, Debug, Args)]
pub struct DropArgs {
    /// Live table name.
    pub table: String,
}

#[derive(Clone, Debug, Args)]
pub struct DropAllArgs {
    /// Confirm removal of all recorded history.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Clone, Debug, Args)]
pub struct HistoryArgs {
    /// Live table name.
    pub table: String,
    /// RFC 3339 instant (defaults to now).
    #[arg(long)]
    pub at: Option<String>,
    /// Only rows whose interval is still open.
    #[arg(long, conflicts_with = "at")]
    pub current: bool,
}

#[derive(Clone, Debug, Args)]
pub struct VersionsArgs {
    /// Live table name.
    pub table: String,
    /// Identity value; integers are matched as integers.
    pub id: String,
}

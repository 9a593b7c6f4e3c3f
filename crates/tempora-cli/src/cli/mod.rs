use std::path::PathBuf;

use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `tempora` binary.
#[derive(Debug, Parser)]
#[command(name = "tempora", version, about = "tempora - table history engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, table, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Extra config file layered over the user and project files
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path (overrides `database.path`)
    #[arg(long, global = true)]
    pub db: Option<String>,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
            config: self.config.clone(),
            db: self.db.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, GlobalFlags, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_subcommand() {
        let cli = Cli::try_parse_from(["tempora", "--format", "table", "--verbose", "list"])
            .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Table);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["tempora", "list", "--format", "raw", "--quiet"])
            .expect("cli should parse");

        assert_eq!(cli.format, OutputFormat::Raw);
        assert!(cli.quiet);
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        let parsed = Cli::try_parse_from(["tempora", "--format", "xml", "list"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn create_flags_parse() {
        let cli = Cli::try_parse_from(["tempora", "create", "gadget", "--no-capture"])
            .expect("cli should parse");
        let Commands::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.table, "gadget");
        assert!(args.no_capture);
        assert!(!args.no_inheritance);
    }

    #[test]
    fn bootstrap_accepts_many_tables() {
        let cli = Cli::try_parse_from(["tempora", "bootstrap", "widget", "gadget"])
            .expect("cli should parse");
        let Commands::Bootstrap(args) = cli.command else {
            panic!("expected bootstrap");
        };
        assert_eq!(args.tables, vec!["widget", "gadget"]);
    }

    #[test]
    fn history_at_conflicts_with_current() {
        let parsed = Cli::try_parse_from([
            "tempora",
            "history",
            "widget",
            "--current",
            "--at",
            "2024-01-01T00:00:00Z",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn versions_requires_an_id() {
        assert!(Cli::try_parse_from(["tempora", "versions", "widget"]).is_err());
    }

    #[test]
    fn global_flags_extraction_copies_values() {
        let cli = Cli::try_parse_from(["tempora", "--db", "/tmp/demo.db", "drop-all", "--yes"])
            .expect("cli should parse");
        let flags: GlobalFlags = cli.global_flags();
        assert_eq!(flags.db.as_deref(), Some("/tmp/demo.db"));
        assert!(matches!(cli.command, Commands::DropAll(ref args) if args.yes));
    }
}

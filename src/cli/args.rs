//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Hoard - content-addressed build output cache
///
/// Fingerprints the sources of each configured build entry and reuses
/// previously captured outputs instead of re-running unchanged builds.
#[derive(Parser, Debug)]
#[command(name = "hoard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path (defaults to the nearest hoard.toml)
    #[arg(short, long, global = true, env = "HOARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log output format (overrides general.log_format)
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decide every entry, build the misses and cache their outputs
    Run(RunArgs),

    /// Show what would be built without building anything
    Plan(PlanArgs),

    /// List the pointer records stored for one entry
    Inspect(InspectArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Stop after decisions; exit successfully without building
    #[arg(long, env = "HOARD_DRY_RUN")]
    pub dry_run: bool,

    /// Treat every entry as a cache miss
    #[arg(long, env = "HOARD_FORCE_REBUILD")]
    pub force: bool,

    /// Only process this origin
    #[arg(long)]
    pub origin: Option<String>,
}

/// Arguments for the plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Treat every entry as a cache miss
    #[arg(long, env = "HOARD_FORCE_REBUILD")]
    pub force: bool,

    /// Only process this origin
    #[arg(long)]
    pub origin: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Component name
    pub component: String,

    /// Entry key
    pub key: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
    /// Plain text (one item per line)
    Plain,
}

/// Log format options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_run_flags() {
        let cli = Cli::try_parse_from(["hoard", "-vv", "run", "--dry-run", "--origin", "docs"])
            .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.dry_run);
                assert!(!args.force);
                assert_eq!(args.origin.as_deref(), Some("docs"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parses_inspect() {
        let cli = Cli::try_parse_from(["hoard", "inspect", "api", "build", "-f", "json"]).unwrap();
        match cli.command {
            Commands::Inspect(args) => {
                assert_eq!(args.component, "api");
                assert_eq!(args.key, "build");
                assert!(matches!(args.format, OutputFormat::Json));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

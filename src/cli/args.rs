//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ckpt - content-addressed checkpoints and experiment records
///
/// Reports, inspects and manages the experiments stored under a cache
/// root.
#[derive(Parser, Debug)]
#[command(name = "ckpt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Cache root directory (defaults to .ckpt)
    #[arg(long, global = true, env = "CKPT_ROOT")]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tabulate stored experiments
    Report(ReportArgs),

    /// Delete stored experiments
    Remove(RemoveArgs),

    /// Show one stored experiment
    Inspect(InspectArgs),

    /// Preview re-running a stored experiment
    Rerun(RerunArgs),

    /// Resolve a pipeline definition into a run plan
    Run(RunArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the report command
#[derive(Parser, Debug)]
pub struct ReportArgs {
    /// Experiment ids (short or full); all experiments if omitted
    pub ids: Vec<String>,

    /// Output format
    #[arg(short, long, default_value = "pretty")]
    pub output_format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub filename: Option<PathBuf>,

    /// Column to sort by
    #[arg(short, long)]
    pub sort_by: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort_by")]
    pub desc: bool,

    /// Only experiments with this pipeline name
    #[arg(long)]
    pub pipe: Option<String>,

    /// Only experiments whose flattened config has key:value
    #[arg(long = "config", value_name = "KEY:VALUE")]
    pub config_filters: Vec<String>,
}

/// Arguments for the remove command
#[derive(Parser, Debug)]
pub struct RemoveArgs {
    /// Experiment ids (short or full)
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the inspect command
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Experiment id (short or full)
    pub id: String,

    /// Print the stored record as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the rerun command
#[derive(Parser, Debug)]
pub struct RerunArgs {
    /// Experiment id (short or full)
    pub id: String,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Pipeline definition (.json, .toml) or stored experiment record
    #[arg(short, long)]
    pub config: PathBuf,

    /// Accumulate results without writing the experiment record
    #[arg(long)]
    pub dry_run: bool,

    /// Fit every stage without checkpoints
    #[arg(long)]
    pub no_checkpoints: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for the report command
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned table
    Pretty,
    /// Comma-separated values
    Csv,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_report() {
        let cli = Cli::parse_from([
            "ckpt", "report", "-o", "csv", "--sort-by", "acc", "--desc", "--config", "lr:0.1",
            "abc1234",
        ]);
        match cli.command {
            Commands::Report(args) => {
                assert_eq!(args.output_format, OutputFormat::Csv);
                assert_eq!(args.sort_by.as_deref(), Some("acc"));
                assert!(args.desc);
                assert_eq!(args.config_filters, vec!["lr:0.1"]);
                assert_eq!(args.ids, vec!["abc1234"]);
            }
            _ => panic!("expected Report command"),
        }
    }

    #[test]
    fn cli_report_defaults() {
        let cli = Cli::parse_from(["ckpt", "report"]);
        match cli.command {
            Commands::Report(args) => {
                assert_eq!(args.output_format, OutputFormat::Pretty);
                assert!(args.ids.is_empty());
                assert!(args.filename.is_none());
            }
            _ => panic!("expected Report command"),
        }
    }

    #[test]
    fn cli_remove_requires_ids() {
        assert!(Cli::try_parse_from(["ckpt", "remove"]).is_err());

        let cli = Cli::parse_from(["ckpt", "remove", "--yes", "a1", "b2"]);
        match cli.command {
            Commands::Remove(args) => {
                assert!(args.yes);
                assert_eq!(args.ids, vec!["a1", "b2"]);
            }
            _ => panic!("expected Remove command"),
        }
    }

    #[test]
    fn cli_parses_run() {
        let cli = Cli::parse_from(["ckpt", "run", "--config", "pipeline.toml", "--dry-run"]);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("pipeline.toml"));
                assert!(args.dry_run);
                assert!(!args.no_checkpoints);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_global_flags() {
        let cli = Cli::parse_from(["ckpt", "inspect", "abc", "-vv", "--root", "/tmp/cache"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/cache")));
        assert!(matches!(cli.command, Commands::Inspect(_)));
    }
}

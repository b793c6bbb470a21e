//! ckpt - checkpoint cache and experiment records
//!
//! CLI entry point that dispatches to subcommands.

use ckpt::cli::{commands, Cli, Commands};
use ckpt::config::Context;
use ckpt::error::CkptResult;
use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> CkptResult<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("ckpt=warn"),
        1 => EnvFilter::new("ckpt=info"),
        _ => EnvFilter::new("ckpt=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    let ctx = Context::discover(cli.root)?;
    debug!("Using cache root {}", ctx.root().display());

    match cli.command {
        Commands::Report(args) => commands::report(args, &ctx),
        Commands::Remove(args) => commands::remove(args, &ctx),
        Commands::Inspect(args) => commands::inspect(args, &ctx),
        Commands::Rerun(args) => commands::rerun(args, &ctx),
        Commands::Run(args) => commands::run(args, &ctx),
        Commands::Config(args) => commands::config(args, &ctx),
    }
}

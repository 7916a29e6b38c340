//! jobmono: record concrete generic job instantiations for AOT compilation
//!
//! Runs after compilation and before the ahead-of-time compiler scans the
//! output. Every job instantiation reachable from the input modules is written
//! into a registry type in the target module.
//!
//! ## Commands
//!
//! - **resolve**: run the pass (or list only, with `--dry-run`)
//! - **dump**: print a binary module as JSON
//! - **assemble**: write a JSON module description as a binary module
//! - **missing**: list references no input or host directory satisfies
//!
//! ## Example Usage
//!
//! ```bash
//! # Resolve and inject into the game module
//! jobmono resolve Game.jmod Jobs.jmod --target Game.jmod
//!
//! # List what would be injected, as JSON
//! jobmono resolve Game.jmod Jobs.jmod --dry-run --json
//!
//! # Inspect the result
//! jobmono dump Game.jmod
//! ```

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod jobmono_cli;

use jobmono_cli::{
    assemble::AssembleCmd, dump::DumpCmd, missing::MissingCmd, output, resolve::ResolveCmd,
};

#[derive(Parser)]
#[command(
    name = "jobmono",
    author,
    version,
    about = "Generic job instantiation resolver",
    long_about = "Scans compiled modules for generic job types, resolves every concrete \
                  instantiation reachable from the call graph, and records them in a target \
                  module for ahead-of-time compilation."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve job instantiations and inject them into a target module
    Resolve(ResolveCmd),

    /// Print a module as JSON
    Dump(DumpCmd),

    /// Write a JSON module description as a binary module
    Assemble(AssembleCmd),

    /// List module references that cannot be satisfied
    Missing(MissingCmd),
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands, json: bool, verbose: bool) -> Result<()> {
    match command {
        Commands::Resolve(cmd) => cmd.execute(json, verbose),
        Commands::Dump(cmd) => cmd.execute(),
        Commands::Assemble(cmd) => cmd.execute(json),
        Commands::Missing(cmd) => cmd.execute(json),
    }
}

fn main() -> ExitCode {
    let Cli {
        command,
        json,
        verbose,
    } = Cli::parse();
    init_logging(verbose);

    match run(command, json, verbose) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", output::format_error(&err, json));
            ExitCode::FAILURE
        }
    }
}

//! lumenimg CLI - Command-line interface
//!
//! Operator tool for the lumenimg pipeline: resolve a catalog the way a
//! storefront render pass would, warm the durable store, and inspect or
//! sweep it.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::NetworkArg;
use commands::config::ConfigCommands;
use commands::store::StoreAction;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "lumenimg", version, about = "Adaptive product-image delivery and caching")]
struct Cli {
    /// Configuration file (defaults to ~/.config/lumenimg/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Resolve every image in a catalog to its transform URL
    Resolve {
        /// Catalog JSON file (array of products), or - for stdin
        catalog: PathBuf,

        /// Simulate a network class instead of assuming a fast link
        #[arg(long, value_enum)]
        network: Option<NetworkArg>,

        /// Detect formats from this Accept header instead of the configured probe
        #[arg(long)]
        accept: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Fetch the first catalog images into the durable store
    Prefetch {
        /// Catalog JSON file (array of products), or - for stdin
        catalog: PathBuf,

        /// Number of leading images to prefetch
        #[arg(long)]
        limit: Option<usize>,

        /// Start immediately instead of waiting for the configured delay
        #[arg(long)]
        no_delay: bool,

        /// Simulate a network class instead of assuming a fast link
        #[arg(long, value_enum)]
        network: Option<NetworkArg>,

        /// Detect formats from this Accept header instead of the configured probe
        #[arg(long)]
        accept: Option<String>,
    },

    /// Durable store maintenance
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Config { command } => commands::config::run(command, config_path),
        Commands::Resolve {
            catalog,
            network,
            accept,
            json,
        } => {
            let runner = runner::CliRunner::new(config_path, cli.verbose)?;
            commands::resolve::run(
                &runner,
                commands::resolve::ResolveArgs {
                    catalog,
                    network,
                    accept,
                    json,
                },
            )
        }
        Commands::Prefetch {
            catalog,
            limit,
            no_delay,
            network,
            accept,
        } => {
            let runner = runner::CliRunner::new(config_path, cli.verbose)?;
            commands::prefetch::run(
                &runner,
                commands::prefetch::PrefetchArgs {
                    catalog,
                    limit,
                    no_delay,
                    network,
                    accept,
                },
            )
        }
        Commands::Store { action } => {
            let runner = runner::CliRunner::new(config_path, cli.verbose)?;
            commands::store::run(&runner, action)
        }
    }
}

//! Ferry CLI - import Redmine projects into a Ferry tracker.

use clap::{Parser, Subcommand};
use ferry_migrate::MigrationError;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

mod commands;
mod config;
mod logging;

use logging::LogFormat;

/// Ferry - Redmine importer
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the import options derived from Redmine as YAML
    Options {
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,
        /// Store snapshot to read the issue setting from
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Import the configured projects (dry run unless --commit)
    Import {
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,
        /// Save issues instead of only checking them
        #[arg(long)]
        commit: bool,
        /// Store snapshot to load and, with --commit, write back
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(logging::level_for(cli.verbose), cli.log_format);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping import");
            on_signal.cancel();
        }
    });

    let result = match cli.command {
        Commands::Options { config, snapshot } => commands::options(&config, snapshot).await,
        Commands::Import {
            config,
            commit,
            snapshot,
            json,
        } => commands::import(&config, commit, snapshot, json, cancel).await,
    };

    if let Err(e) = result {
        let interrupted = e
            .chain()
            .any(|cause| cause.downcast_ref::<MigrationError>().is_some_and(MigrationError::is_interrupted));
        if interrupted {
            eprintln!("Import cancelled");
            std::process::exit(130);
        }
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

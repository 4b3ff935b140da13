mod commands;
mod dry_run;
mod opsgenie;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rotamirror_core::window::{DEFAULT_HORIZON_DAYS, DEFAULT_LOOKBACK_DAYS};
use tracing_subscriber::EnvFilter;

use crate::commands::inspect::InspectArgs;

#[derive(Parser)]
#[command(name = "rotamirror")]
#[command(about = "Mirror on-call rotation feeds onto a shared Google Calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Purge the active window and mirror every configured rotation
    Sync {
        /// Configuration file (defaults to ./rotamirror.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Read the calendar but only log the writes
        #[arg(long)]
        dry_run: bool,
    },
    /// Parse a local ICS file and print the events that would be mirrored
    Inspect {
        file: PathBuf,

        /// Rotation name used as the summary prefix
        #[arg(short, long, default_value = "LOCAL")]
        rotation: String,

        /// Show every event, not only those inside the window
        #[arg(long)]
        all: bool,

        #[arg(long, default_value_t = DEFAULT_LOOKBACK_DAYS)]
        lookback_days: i64,

        #[arg(long, default_value_t = DEFAULT_HORIZON_DAYS)]
        horizon_days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { config, dry_run } => {
            commands::sync::run(config.as_deref(), dry_run).await
        }
        Commands::Inspect {
            file,
            rotation,
            all,
            lookback_days,
            horizon_days,
        } => {
            commands::inspect::run(InspectArgs {
                file: &file,
                rotation: &rotation,
                all,
                lookback_days,
                horizon_days,
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

//! Refract CLI
//!
//! Runs conversion workflows locally and inspects the workflow catalog.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "refract")]
#[command(about = "Refract media conversion CLI", long_about = None)]
struct Cli {
    /// Directory for intermediate frames
    #[arg(long, env = "REFRACT_TEMP_PATH")]
    temp_path: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, env = "REFRACT_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refract_cli=warn,refract_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.temp_path, cli.ffmpeg)?;

    handle_command(cli.command, &config).await
}

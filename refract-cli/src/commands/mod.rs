//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod run;
mod workflows;

pub use run::RunArgs;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run one workflow to completion
    Run(RunArgs),
    /// List the available workflows and their stages
    Workflows,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run(args) => run::handle_run_command(args, config).await,
        Commands::Workflows => workflows::handle_workflows_command(config),
    }
}

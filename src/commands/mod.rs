pub mod job;

use crate::Config;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Run or inspect background jobs
    Job {
        #[command(subcommand)]
        action: job::JobCommand,
    },
}

pub async fn handle_command(
    command: Commands,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Job { action } => job::handle_job_command(action, config).await,
    }
}

use crate::{
    Config,
    credentials::CredentialStore,
    jobs::{JobsConfig, TokenRefreshJob, refresh::RefreshSummary},
    spotify::{SpotifyApi, SpotifyClient},
};
use clap::Subcommand;
use std::sync::Arc;
use tracing::info;

#[derive(Subcommand)]
pub enum JobCommand {
    /// Run a specific job once
    Run {
        #[arg(help = "Job type to run (token_refresh)")]
        job_type: String,

        #[arg(
            long,
            help = "Dry run - show what would be done without actually doing it"
        )]
        dry_run: bool,
    },

    /// List available job types
    List,

    /// Show the stored credentials and job settings
    Status,
}

pub async fn handle_job_command(
    command: JobCommand,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        JobCommand::Run { job_type, dry_run } => {
            info!("Running job: {} (dry_run: {})", job_type, dry_run);

            match job_type.as_str() {
                "token_refresh" => {
                    let credentials =
                        Arc::new(CredentialStore::load(&config.storage.tokens_path).await);
                    if dry_run {
                        info!(
                            "DRY RUN: Would refresh tokens for {} users",
                            credentials.len().await
                        );
                        return Ok(());
                    }

                    let spotify: Arc<dyn SpotifyApi> =
                        Arc::new(SpotifyClient::new(&config.spotify)?);
                    let summary = run_token_refresh(credentials, spotify, &config.jobs).await;
                    info!(
                        "Token refresh finished: {} refreshed, {} revoked, {} failed",
                        summary.refreshed, summary.revoked, summary.failed
                    );
                }

                _ => {
                    return Err(format!(
                        "Unknown job type: {}. Available: token_refresh",
                        job_type
                    )
                    .into());
                }
            }
        }

        JobCommand::List => {
            println!("Available job types:");
            println!("  token_refresh  - Exchange every stored refresh token for a new access token");
            println!("  cache_sweep    - Drop expired track snapshots (scheduler only, cache is in-memory)");
            println!();
            println!("Examples:");
            println!("  nowplaying-relay job run token_refresh");
            println!("  nowplaying-relay job run token_refresh --dry-run");
        }

        JobCommand::Status => {
            let credentials = CredentialStore::load(&config.storage.tokens_path).await;
            println!("Job System Status:");
            println!(
                "  Token refresh: {}",
                if config.jobs.token_refresh_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            println!(
                "  Token refresh interval: {}s",
                config.jobs.token_refresh_interval_seconds
            );
            println!("  Cache sweep interval: {}s", config.cache.track_ttl_seconds);
            println!(
                "  Authorized users: {} ({})",
                credentials.len().await,
                credentials.path().display()
            );
        }
    }

    Ok(())
}

/// One refresh cycle outside the scheduler.
pub async fn run_token_refresh(
    credentials: Arc<CredentialStore>,
    spotify: Arc<dyn SpotifyApi>,
    jobs: &JobsConfig,
) -> RefreshSummary {
    TokenRefreshJob::new(credentials, spotify, jobs.token_refresh_interval())
        .refresh_all()
        .await
}

use super::{Job, JobResult};
use crate::{
    credentials::{CredentialRecord, CredentialStore},
    error::{AppError, RelayError},
    spotify::SpotifyApi,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Exchanges every stored refresh token for a fresh access token.
///
/// Users are processed one after another from a snapshot of the store. A
/// failure for one user never stops the batch. A rejected refresh token
/// removes the user's record so they have to authorize again.
pub struct TokenRefreshJob {
    credentials: Arc<CredentialStore>,
    spotify: Arc<dyn SpotifyApi>,
    interval: Duration,
}

/// Per-cycle counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: u64,
    pub revoked: u64,
    pub failed: u64,
    /// Records changed by another writer while their refresh was in flight
    pub skipped: u64,
}

impl TokenRefreshJob {
    pub fn new(
        credentials: Arc<CredentialStore>,
        spotify: Arc<dyn SpotifyApi>,
        interval: Duration,
    ) -> Self {
        Self {
            credentials,
            spotify,
            interval,
        }
    }

    /// Run one refresh cycle over every stored record.
    pub async fn refresh_all(&self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        for (user_id, record) in self.credentials.entries().await {
            match self.spotify.refresh_access_token(&record.refresh_token).await {
                Ok(token) => {
                    let updated = CredentialRecord {
                        access_token: token.access_token,
                        refresh_token: token
                            .refresh_token
                            .unwrap_or_else(|| record.refresh_token.clone()),
                    };
                    match self
                        .credentials
                        .replace_if_current(&user_id, &record.refresh_token, updated)
                        .await
                    {
                        Ok(true) => {
                            debug!("Refreshed access token for user {}", user_id);
                            summary.refreshed += 1;
                        }
                        Ok(false) => {
                            debug!(
                                "Credentials for user {} changed during refresh, keeping newer record",
                                user_id
                            );
                            summary.skipped += 1;
                        }
                        // In-memory record is already updated; the file catches up on the next write.
                        Err(e) => {
                            error!("Failed to persist refreshed token for user {}: {}", user_id, e);
                            summary.refreshed += 1;
                        }
                    }
                }
                Err(RelayError::UpstreamAuthExpired(reason)) => {
                    warn!(
                        "Refresh token for user {} was rejected ({}), removing credentials",
                        user_id, reason
                    );
                    match self
                        .credentials
                        .delete_if_current(&user_id, &record.refresh_token)
                        .await
                    {
                        Ok(true) => summary.revoked += 1,
                        Ok(false) => summary.skipped += 1,
                        Err(e) => {
                            error!("Failed to persist credential removal for user {}: {}", user_id, e);
                            summary.revoked += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to refresh token for user {}: {}", user_id, e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

#[async_trait]
impl Job for TokenRefreshJob {
    fn name(&self) -> &str {
        "token_refresh"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<JobResult, AppError> {
        let summary = self.refresh_all().await;
        info!(
            "Token refresh cycle finished: {} refreshed, {} revoked, {} failed, {} skipped",
            summary.refreshed, summary.revoked, summary.failed, summary.skipped
        );

        let message = format!(
            "Refreshed {} tokens ({} revoked, {} failed)",
            summary.refreshed, summary.revoked, summary.failed
        );

        // every attempt failed transiently: the token endpoint is likely down
        if summary.failed > 0 && summary.refreshed == 0 && summary.revoked == 0 {
            return Ok(JobResult::failure(message));
        }

        Ok(JobResult::success_with_message(
            message,
            summary.refreshed + summary.revoked + summary.failed + summary.skipped,
        ))
    }
}

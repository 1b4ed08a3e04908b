use super::{Job, JobResult};
use crate::{cache::TrackCache, error::AppError};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Drops expired track snapshots. Runs once per cache TTL.
pub struct TrackCacheSweepJob {
    cache: Arc<TrackCache>,
}

impl TrackCacheSweepJob {
    pub fn new(cache: Arc<TrackCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Job for TrackCacheSweepJob {
    fn name(&self) -> &str {
        "cache_sweep"
    }

    fn interval(&self) -> Duration {
        self.cache.ttl()
    }

    async fn execute(&self) -> Result<JobResult, AppError> {
        let removed = self.cache.sweep();
        if removed > 0 {
            debug!("Swept {} expired track snapshots", removed);
        }
        Ok(JobResult::success_with_count(removed as u64))
    }
}

pub mod refresh;
pub mod scheduler;
pub mod sweep;

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use refresh::TokenRefreshJob;
pub use scheduler::JobScheduler;
pub use sweep::TrackCacheSweepJob;

/// Configuration for the job system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Enable/disable the periodic credential refresh. The track cache
    /// sweep always runs.
    pub token_refresh_enabled: bool,

    /// Seconds between credential refresh cycles
    pub token_refresh_interval_seconds: u64,
}

impl JobsConfig {
    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.token_refresh_interval_seconds)
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            token_refresh_enabled: true,
            token_refresh_interval_seconds: 3600,
        }
    }
}

/// Result of job execution
#[derive(Debug, Clone)]
pub struct JobResult {
    pub success: bool,
    pub message: String,
    pub items_processed: u64,
}

impl JobResult {
    pub fn success_with_count(count: u64) -> Self {
        Self {
            success: true,
            message: format!("Successfully processed {count} items"),
            items_processed: count,
        }
    }

    pub fn success_with_message(message: String, count: u64) -> Self {
        Self {
            success: true,
            message,
            items_processed: count,
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            items_processed: 0,
        }
    }
}

/// Trait for executable jobs
#[async_trait]
pub trait Job: Send + Sync {
    /// Get the job name for logging and identification
    fn name(&self) -> &str;

    /// Time between two runs; the first run happens one interval after start.
    fn interval(&self) -> Duration;

    /// Execute the job and return the result
    async fn execute(&self) -> Result<JobResult, AppError>;
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::{cache::TrackCache, credentials::CredentialStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl HealthCheckResult {
    pub fn healthy_with_details(details: serde_json::Value) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: None,
            details: Some(details),
            duration_ms: None,
        }
    }

    pub fn degraded_with_details(message: String, details: serde_json::Value) -> Self {
        Self {
            status: HealthStatus::Degraded,
            message: Some(message),
            details: Some(details),
            duration_ms: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// The name of this health check component
    fn name(&self) -> &str;

    async fn check(&self) -> HealthCheckResult;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallHealthResponse {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub checks: BTreeMap<String, HealthCheckResult>,
}

pub struct HealthService {
    checkers: RwLock<Vec<Arc<dyn HealthChecker>>>,
}

impl HealthService {
    pub fn new() -> Self {
        Self {
            checkers: RwLock::new(Vec::new()),
        }
    }

    /// Register a health checker, replacing any checker with the same name
    pub async fn register(&self, checker: Arc<dyn HealthChecker>) {
        let mut checkers = self.checkers.write().await;
        checkers.retain(|existing| existing.name() != checker.name());
        checkers.push(checker);
    }

    /// Run every registered check. The worst individual status wins.
    pub async fn check_health(&self) -> OverallHealthResponse {
        let checkers = self.checkers.read().await;
        let mut checks = BTreeMap::new();

        for checker in checkers.iter() {
            let start = Instant::now();
            let result = checker.check().await;
            let duration = start.elapsed().as_millis() as u64;
            checks.insert(checker.name().to_string(), result.with_duration(duration));
        }

        let status = if checks
            .values()
            .any(|r| r.status == HealthStatus::Unhealthy)
        {
            HealthStatus::Unhealthy
        } else if checks.values().any(|r| r.status == HealthStatus::Degraded) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        OverallHealthResponse {
            status,
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            checks,
        }
    }
}

impl Default for HealthService {
    fn default() -> Self {
        Self::new()
    }
}

/// Reports the number of authorized users and whether the token file exists.
pub struct CredentialStoreHealthChecker {
    store: Arc<CredentialStore>,
}

impl CredentialStoreHealthChecker {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HealthChecker for CredentialStoreHealthChecker {
    fn name(&self) -> &str {
        "credentials"
    }

    async fn check(&self) -> HealthCheckResult {
        let records = self.store.len().await;
        let path = self.store.path();
        let file_exists = tokio::fs::try_exists(path).await.unwrap_or(false);
        let details = json!({
            "records": records,
            "path": path.display().to_string(),
            "file_exists": file_exists,
        });

        // records in memory but no file means the last write failed
        if records > 0 && !file_exists {
            HealthCheckResult::degraded_with_details(
                "Credential file is missing".to_string(),
                details,
            )
        } else {
            HealthCheckResult::healthy_with_details(details)
        }
    }
}

pub struct TrackCacheHealthChecker {
    cache: Arc<TrackCache>,
}

impl TrackCacheHealthChecker {
    pub fn new(cache: Arc<TrackCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl HealthChecker for TrackCacheHealthChecker {
    fn name(&self) -> &str {
        "track_cache"
    }

    async fn check(&self) -> HealthCheckResult {
        HealthCheckResult::healthy_with_details(json!({
            "entries": self.cache.len(),
            "ttl_seconds": self.cache.ttl().as_secs(),
        }))
    }
}

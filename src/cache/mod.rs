//! Short-lived cache of "now playing" snapshots
//!
//! Entries older than the TTL are never returned, whether or not the periodic
//! sweep has removed them yet. Nothing here is persisted.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

use crate::tracks::TrackSnapshot;

/// Default snapshot lifetime (30 seconds)
pub const DEFAULT_TRACK_TTL: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
struct TtlEntry<T> {
    data: T,
    stored_at: DateTime<Utc>,
}

impl<T> TtlEntry<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            stored_at: Utc::now(),
        }
    }

    fn is_fresh(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.stored_at < ttl
    }
}

/// Per-user cache of the last fetched track
pub struct TrackCache {
    entries: DashMap<String, TtlEntry<TrackSnapshot>>,
    ttl: Duration,
}

impl TrackCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn chrono_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX)
    }

    /// Return the snapshot only while it is younger than the TTL.
    pub fn get(&self, user_id: &str) -> Option<TrackSnapshot> {
        let ttl = self.chrono_ttl();
        self.entries
            .get(user_id)
            .filter(|entry| entry.is_fresh(ttl, Utc::now()))
            .map(|entry| entry.data.clone())
    }

    /// Store a snapshot, replacing any previous entry and restarting its TTL.
    pub fn put(&self, user_id: &str, snapshot: TrackSnapshot) {
        self.entries
            .insert(user_id.to_string(), TtlEntry::new(snapshot));
    }

    /// Drop every expired entry and return how many were removed.
    pub fn sweep(&self) -> usize {
        let ttl = self.chrono_ttl();
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_fresh(ttl, now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TrackCache {
    fn default() -> Self {
        Self::new(DEFAULT_TRACK_TTL)
    }
}

use std::sync::Arc;
use tracing::debug;

use super::TrackSnapshot;
use crate::{
    cache::TrackCache,
    error::{RelayError, RelayResult},
    spotify::SpotifyApi,
};

/// Fetches the current track, consulting the track cache first.
pub struct TrackProvider {
    api: Arc<dyn SpotifyApi>,
    cache: Arc<TrackCache>,
}

impl TrackProvider {
    pub fn new(api: Arc<dyn SpotifyApi>, cache: Arc<TrackCache>) -> Self {
        Self { api, cache }
    }

    pub async fn current_track(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> RelayResult<TrackSnapshot> {
        if let Some(snapshot) = self.cache.get(user_id) {
            debug!("Track cache hit for user {}", user_id);
            return Ok(snapshot);
        }

        let item = self
            .api
            .currently_playing(access_token)
            .await?
            .ok_or(RelayError::NotPlaying)?;

        let snapshot = TrackSnapshot::from_item(&item);
        self.cache.put(user_id, snapshot.clone());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spotify::mock::{MockSpotifyApi, track_item};
    use std::time::Duration;

    fn provider(api: Arc<MockSpotifyApi>, ttl: Duration) -> (TrackProvider, Arc<TrackCache>) {
        let cache = Arc::new(TrackCache::new(ttl));
        (TrackProvider::new(api, cache.clone()), cache)
    }

    #[tokio::test]
    async fn test_fetches_and_caches() {
        let api = Arc::new(MockSpotifyApi::new().with_playing(
            "token-42",
            Some(track_item("Song A", &["Artist B"], "abc")),
        ));
        let (provider, cache) = provider(api.clone(), Duration::from_secs(30));

        let first = provider.current_track("42", "token-42").await.unwrap();
        assert_eq!(first.name, "Song A");
        assert_eq!(first.artists, "Artist B");
        assert!(cache.get("42").is_some());

        let second = provider.current_track("42", "token-42").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(api.currently_playing_calls(), 1);
    }

    #[tokio::test]
    async fn test_refetches_after_ttl() {
        let api = Arc::new(MockSpotifyApi::new().with_playing(
            "token-42",
            Some(track_item("Song A", &["Artist B"], "abc")),
        ));
        let (provider, _cache) = provider(api.clone(), Duration::from_millis(30));

        provider.current_track("42", "token-42").await.unwrap();
        api.set_playing("token-42", Some(track_item("Song B", &["Artist B"], "def")));
        tokio::time::sleep(Duration::from_millis(60)).await;

        let track = provider.current_track("42", "token-42").await.unwrap();
        assert_eq!(track.name, "Song B");
        assert_eq!(api.currently_playing_calls(), 2);
    }

    #[tokio::test]
    async fn test_not_playing() {
        let api = Arc::new(MockSpotifyApi::new().with_playing("token-42", None));
        let (provider, cache) = provider(api, Duration::from_secs(30));

        let result = provider.current_track("42", "token-42").await;
        assert_eq!(result, Err(RelayError::NotPlaying));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_cached() {
        let api = Arc::new(MockSpotifyApi::new());
        let (provider, cache) = provider(api, Duration::from_secs(30));

        let result = provider.current_track("42", "expired-token").await;
        assert!(matches!(result, Err(RelayError::UpstreamUnavailable(_))));
        assert!(cache.is_empty());
    }
}

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use super::client::{RefreshedToken, SpotifyApi};
use super::models::{Album, Artist, Image, TrackItem};
use crate::credentials::CredentialRecord;
use crate::error::{RelayError, RelayResult};

/// How the mock answers a refresh for a given refresh token
#[derive(Clone, Debug)]
pub enum MockRefresh {
    Issue(String),
    Rotate { access_token: String, refresh_token: String },
    Reject,
    Unavailable,
}

/// In-process stand-in for the Spotify Web API used by tests
#[derive(Default)]
pub struct MockSpotifyApi {
    /// access token -> currently playing item (`None` = nothing playing)
    playing: Mutex<HashMap<String, Option<TrackItem>>>,
    /// authorization code -> issued token pair
    codes: Mutex<HashMap<String, CredentialRecord>>,
    /// refresh token -> refresh outcome
    refreshes: Mutex<HashMap<String, MockRefresh>>,
    currently_playing_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl MockSpotifyApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playing(self, access_token: &str, item: Option<TrackItem>) -> Self {
        self.set_playing(access_token, item);
        self
    }

    pub fn with_code(self, code: &str, record: CredentialRecord) -> Self {
        lock(&self.codes).insert(code.to_string(), record);
        self
    }

    pub fn with_refresh(self, refresh_token: &str, outcome: MockRefresh) -> Self {
        lock(&self.refreshes).insert(refresh_token.to_string(), outcome);
        self
    }

    pub fn set_playing(&self, access_token: &str, item: Option<TrackItem>) {
        lock(&self.playing).insert(access_token.to_string(), item);
    }

    pub fn currently_playing_calls(&self) -> usize {
        self.currently_playing_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Build a track item the way the currently-playing endpoint would return it.
pub fn track_item(name: &str, artists: &[&str], track_id: &str) -> TrackItem {
    TrackItem {
        name: name.to_string(),
        uri: format!("spotify:track:{track_id}"),
        artists: artists
            .iter()
            .map(|name| Artist {
                name: name.to_string(),
            })
            .collect(),
        album: Album {
            name: format!("{name} (Album)"),
            release_date: Some("2020-05-01".to_string()),
            images: vec![Image {
                url: format!("https://i.scdn.co/image/{track_id}"),
                width: Some(640),
                height: Some(640),
            }],
        },
    }
}

#[async_trait]
impl SpotifyApi for MockSpotifyApi {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://accounts.spotify.test/authorize?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> RelayResult<CredentialRecord> {
        lock(&self.codes).get(code).cloned().ok_or_else(|| {
            RelayError::UpstreamAuthExpired("invalid_grant: Invalid authorization code".to_string())
        })
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> RelayResult<RefreshedToken> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = lock(&self.refreshes).get(refresh_token).cloned();
        match outcome {
            Some(MockRefresh::Issue(access_token)) => Ok(RefreshedToken {
                access_token,
                refresh_token: None,
            }),
            Some(MockRefresh::Rotate {
                access_token,
                refresh_token,
            }) => Ok(RefreshedToken {
                access_token,
                refresh_token: Some(refresh_token),
            }),
            Some(MockRefresh::Reject) => Err(RelayError::UpstreamAuthExpired(
                "invalid_grant: Refresh token revoked".to_string(),
            )),
            Some(MockRefresh::Unavailable) | None => Err(RelayError::UpstreamUnavailable(
                "mock token endpoint unavailable".to_string(),
            )),
        }
    }

    async fn currently_playing(&self, access_token: &str) -> RelayResult<Option<TrackItem>> {
        self.currently_playing_calls.fetch_add(1, Ordering::SeqCst);
        match lock(&self.playing).get(access_token) {
            Some(item) => Ok(item.clone()),
            None => Err(RelayError::UpstreamUnavailable(
                "access token rejected by currently-playing".to_string(),
            )),
        }
    }
}

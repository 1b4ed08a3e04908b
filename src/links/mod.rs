//! Cross-platform links for a track via the song.link aggregation API.
//!
//! Resolution is best-effort: any failure degrades to a result holding only
//! the synthesized fallback link.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use crate::config::LinksConfig;

/// Links for one track. Only `song_link` is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformLinks {
    pub spotify: Option<String>,
    pub apple_music: Option<String>,
    pub yandex: Option<String>,
    pub youtube: Option<String>,
    pub youtube_music: Option<String>,
    pub song_link: String,
}

impl PlatformLinks {
    pub fn fallback(song_link: String) -> Self {
        Self {
            song_link,
            ..Default::default()
        }
    }

    /// Platform links in display order with their labels.
    pub fn labelled(&self) -> Vec<(&'static str, &str)> {
        [
            ("Spotify", &self.spotify),
            ("Apple Music", &self.apple_music),
            ("Yandex Music", &self.yandex),
            ("YouTube", &self.youtube),
            ("YouTube Music", &self.youtube_music),
        ]
        .into_iter()
        .filter_map(|(label, url)| url.as_deref().map(|url| (label, url)))
        .collect()
    }
}

#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// Never fails; see [`PlatformLinks::fallback`].
    async fn platform_links(&self, track_id: &str) -> PlatformLinks;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinksResponse {
    #[serde(default)]
    links_by_platform: HashMap<String, PlatformEntry>,
}

#[derive(Debug, Deserialize)]
struct PlatformEntry {
    url: Option<String>,
}

pub struct SongLinkResolver {
    client: Client,
    api_url: String,
    fallback_url: String,
}

impl SongLinkResolver {
    pub fn new(config: &LinksConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            fallback_url: config.fallback_url.trim_end_matches('/').to_string(),
        })
    }

    fn song_link(&self, track_id: &str) -> String {
        format!("{}/{}", self.fallback_url, track_id)
    }

    async fn lookup(&self, track_id: &str) -> Result<LinksResponse, reqwest::Error> {
        self.client
            .get(&self.api_url)
            .query(&[("url", format!("spotify:track:{track_id}"))])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl LinkResolver for SongLinkResolver {
    async fn platform_links(&self, track_id: &str) -> PlatformLinks {
        let song_link = self.song_link(track_id);

        match self.lookup(track_id).await {
            Ok(mut response) => {
                let mut take = |platform: &str| {
                    response
                        .links_by_platform
                        .remove(platform)
                        .and_then(|entry| entry.url)
                };
                PlatformLinks {
                    spotify: take("spotify"),
                    apple_music: take("appleMusic"),
                    yandex: take("yandex"),
                    youtube: take("youtube"),
                    youtube_music: take("youtubeMusic"),
                    song_link,
                }
            }
            Err(e) => {
                warn!("Failed to resolve platform links for {}: {}", track_id, e);
                PlatformLinks::fallback(song_link)
            }
        }
    }
}

/// Resolver that always answers with a fixed set of links (tests, offline runs).
pub struct StaticLinkResolver {
    links: PlatformLinks,
}

impl StaticLinkResolver {
    pub fn new(links: PlatformLinks) -> Self {
        Self { links }
    }

    /// Only the Spotify link and the fallback, derived from the track id.
    pub fn spotify_only() -> Self {
        Self::new(PlatformLinks::default())
    }
}

#[async_trait]
impl LinkResolver for StaticLinkResolver {
    async fn platform_links(&self, track_id: &str) -> PlatformLinks {
        let mut links = self.links.clone();
        if links.spotify.is_none() {
            links.spotify = Some(format!("https://open.spotify.com/track/{track_id}"));
        }
        if links.song_link.is_empty() {
            links.song_link = format!("https://song.link/s/{track_id}");
        }
        links
    }
}

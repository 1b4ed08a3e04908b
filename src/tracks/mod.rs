pub mod provider;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::spotify::TrackItem;

pub use provider::TrackProvider;

/// Normalized "now playing" data for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: String,
    pub name: String,
    /// Artist names joined for display.
    pub artists: String,
    pub album_name: String,
    pub release_date: Option<String>,
    pub album_image_url: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl TrackSnapshot {
    pub fn from_item(item: &TrackItem) -> Self {
        Self {
            id: item.track_id().to_string(),
            name: item.name.clone(),
            artists: item.artist_names(),
            album_name: item.album.name.clone(),
            release_date: item
                .album
                .release_date
                .clone()
                .filter(|date| !date.is_empty()),
            album_image_url: item.album.images.first().map(|image| image.url.clone()),
            captured_at: Utc::now(),
        }
    }

    /// Year part of the release date (`"1987-07-27"` -> `"1987"`).
    pub fn release_year(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .and_then(|date| date.split('-').next())
            .filter(|year| !year.is_empty())
    }
}

//! Spotify Web API client: OAuth code exchange, token refresh and the
//! currently-playing endpoint.

pub mod client;
pub mod mock;
pub mod models;

pub use client::{Oauth2Client, RefreshedToken, SpotifyApi, SpotifyClient};
pub use mock::{MockRefresh, MockSpotifyApi};
pub use models::{CurrentlyPlaying, TrackItem};

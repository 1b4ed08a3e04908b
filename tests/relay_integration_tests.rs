mod common;

use axum::http::{Method, StatusCode};
use common::{TestHarness, callback_update, inline_update, message_update};
use nowplaying_relay::{
    config::LinksConfig,
    credentials::CredentialRecord,
    jobs::Job,
    links::SongLinkResolver,
    spotify::{MockRefresh, MockSpotifyApi, mock::track_item},
    telegram::{UpdatePoller, handlers::REFRESH_CALLBACK_DATA},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

fn authorizing_spotify() -> MockSpotifyApi {
    MockSpotifyApi::new()
        .with_code("abc", CredentialRecord::new("at-42", "rt-42"))
        .with_playing("at-42", Some(track_item("Song A", &["Artist B"], "trk1")))
}

#[tokio::test]
async fn test_authorize_then_share_now_playing() {
    let harness = TestHarness::new(authorizing_spotify()).await;

    let (status, body) = harness.get("/callback?code=abc&state=42").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Authorization Successful!"));
    assert!(body.contains("@muznowbot"));
    assert_eq!(
        harness.server.credentials.get("42").await,
        Some(CredentialRecord::new("at-42", "rt-42"))
    );

    harness
        .dispatch(message_update(1, 42, "private", "/nowplaying"))
        .await;

    let photos = harness.bot.sent_photos();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].photo, "https://i.scdn.co/image/trk1");
    assert!(photos[0].caption.contains("Now Playing: Song A"));
    assert!(photos[0].caption.contains("Artist: Artist B"));
    assert!(
        photos[0]
            .caption
            .contains("[Spotify](https://open.spotify.com/track/trk1)")
    );
}

#[tokio::test]
async fn test_callback_persists_credentials_to_disk() {
    let harness = TestHarness::new(authorizing_spotify()).await;

    let (status, _) = harness
        .request(Method::POST, "/callback?code=abc&state=42")
        .await;
    assert_eq!(status, StatusCode::OK);

    let raw = tokio::fs::read_to_string(harness.server.credentials.path())
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["42"]["accessToken"], "at-42");
    assert_eq!(json["42"]["refreshToken"], "rt-42");
}

#[tokio::test]
async fn test_callback_failures_render_error_page() {
    let harness = TestHarness::new(authorizing_spotify()).await;

    let (status, body) = harness.get("/callback?state=42").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Missing required parameters"));

    let (status, body) = harness.get("/callback?error=access_denied&state=42").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("access_denied"));

    let (status, body) = harness.get("/callback?code=unknown&state=42").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Authorization Error"));

    assert!(!harness.server.credentials.has("42").await);
}

#[tokio::test]
async fn test_any_path_reaches_the_callback() {
    let harness = TestHarness::new(authorizing_spotify()).await;

    let (status, body) = harness.get("/?code=abc&state=7").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Authorization Successful!"));
    assert!(harness.server.credentials.has("7").await);
}

#[tokio::test]
async fn test_unauthorized_user_is_told_to_start() {
    let harness = TestHarness::new(MockSpotifyApi::new()).await;

    harness
        .dispatch(message_update(1, 9, "group", "/nowplaying@muznowbot"))
        .await;

    let messages = harness.bot.sent_messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].text,
        "Please authorize first. Open a private chat with the bot and use the /start command"
    );
    assert_eq!(harness.spotify.currently_playing_calls(), 0);
}

#[tokio::test]
async fn test_unauthorized_inline_query() {
    let harness = TestHarness::new(MockSpotifyApi::new()).await;

    harness.dispatch(inline_update(1, 9)).await;

    let answers = harness.bot.inline_answers();
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].inline_query_id, "iq-1");
    assert!(answers[0].results[0].title.contains("Authorization Required"));
}

#[tokio::test]
async fn test_inline_share_and_refresh() {
    let spotify = MockSpotifyApi::new()
        .with_playing("at-42", Some(track_item("Song A", &["Artist B"], "trk1")));
    let harness =
        TestHarness::with_users(spotify, vec![("42", CredentialRecord::new("at-42", "rt-42"))])
            .await;

    harness.dispatch(inline_update(1, 42)).await;
    let answers = harness.bot.inline_answers();
    assert_eq!(answers[0].results[0].title, "🎵 Song A");

    // a different song starts; the cached snapshot still answers until it expires
    harness
        .spotify
        .set_playing("at-42", Some(track_item("Song C", &["Artist D"], "trk2")));
    harness
        .dispatch(callback_update(2, 42, REFRESH_CALLBACK_DATA, "inline-1"))
        .await;

    let edits = harness.bot.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].inline_message_id, "inline-1");
    assert!(edits[0].text.contains("Song A"));
    assert_eq!(harness.spotify.currently_playing_calls(), 1);
}

#[tokio::test]
async fn test_link_lookup_failure_falls_back_to_song_link() {
    let links_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&links_server)
        .await;

    let resolver = SongLinkResolver::new(&LinksConfig {
        api_url: format!("{}/v1-alpha.1/links", links_server.uri()),
        fallback_url: "https://song.link/s".to_string(),
        timeout_seconds: 10,
    })
    .unwrap();
    let spotify = MockSpotifyApi::new()
        .with_playing("at-42", Some(track_item("Song A", &["Artist B"], "trk1")));
    let harness = TestHarness::with_links(spotify, Arc::new(resolver)).await;
    harness
        .server
        .credentials
        .set("42", CredentialRecord::new("at-42", "rt-42"))
        .await
        .unwrap();

    harness
        .dispatch(message_update(1, 42, "private", "/nowplaying"))
        .await;

    let photos = harness.bot.sent_photos();
    assert_eq!(photos.len(), 1);
    assert!(photos[0].caption.contains("Now Playing: Song A"));
    assert!(!photos[0].caption.contains("[Spotify]"));
    assert!(
        photos[0]
            .caption
            .contains("[Open all options](https://song.link/s/trk1)")
    );
}

#[tokio::test]
async fn test_refresh_revokes_expired_grants() {
    let spotify = MockSpotifyApi::new()
        .with_refresh("rt-1", MockRefresh::Issue("at-1-new".to_string()))
        .with_refresh("rt-2", MockRefresh::Reject);
    let harness = TestHarness::with_users(
        spotify,
        vec![
            ("1", CredentialRecord::new("at-1", "rt-1")),
            ("2", CredentialRecord::new("at-2", "rt-2")),
        ],
    )
    .await;

    let job = harness
        .server
        .jobs()
        .into_iter()
        .find(|job| job.name() == "token_refresh")
        .unwrap();
    let result = job.execute().await.unwrap();
    assert!(result.success);

    let credentials = &harness.server.credentials;
    assert_eq!(credentials.get("1").await.unwrap().access_token, "at-1-new");
    assert!(!credentials.has("2").await);
}

#[tokio::test]
async fn test_poller_delivers_updates_to_handler() {
    let harness = TestHarness::new(MockSpotifyApi::new()).await;
    harness
        .bot
        .push_updates(Ok(vec![message_update(10, 9, "private", "/help")]));

    let poller = UpdatePoller::new(
        harness.server.bot_api.clone(),
        harness.server.bot_handler.clone(),
        &harness.server.config.telegram,
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = poller.spawn(shutdown_rx);

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        while harness.bot.sent_messages().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(delivered.is_ok());

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    let messages = harness.bot.sent_messages();
    assert!(messages[0].text.contains("Quick Guide"));
    assert!(harness.bot.polls().iter().any(|poll| poll.offset == Some(11)));
}

#[tokio::test]
async fn test_health_endpoint() {
    let harness = TestHarness::new(MockSpotifyApi::new()).await;

    let (status, body) = harness.get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["credentials"]["details"]["records"], 0);
}

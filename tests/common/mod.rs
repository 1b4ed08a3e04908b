use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use nowplaying_relay::{
    Config, Server,
    credentials::{CredentialRecord, CredentialStore},
    links::{LinkResolver, StaticLinkResolver},
    server::ServerComponents,
    spotify::MockSpotifyApi,
    telegram::{MockBotApi, types::Update},
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Real server wired to in-process Spotify and Telegram doubles
pub struct TestHarness {
    pub server: Server,
    pub app: Router,
    pub bot: Arc<MockBotApi>,
    #[allow(dead_code)]
    pub spotify: Arc<MockSpotifyApi>,
    _dir: TempDir,
}

impl TestHarness {
    pub async fn new(spotify: MockSpotifyApi) -> Self {
        Self::build(spotify, Vec::new(), None).await
    }

    /// Harness with users already holding credentials.
    #[allow(dead_code)]
    pub async fn with_users(
        spotify: MockSpotifyApi,
        users: Vec<(&str, CredentialRecord)>,
    ) -> Self {
        Self::build(spotify, users, None).await
    }

    #[allow(dead_code)]
    pub async fn with_links(spotify: MockSpotifyApi, links: Arc<dyn LinkResolver>) -> Self {
        Self::build(spotify, Vec::new(), Some(links)).await
    }

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.telegram.bot_token = "test-token".to_string();
        config.telegram.bot_username = "muznowbot".to_string();
        config.telegram.poll_timeout_seconds = 0;
        config.telegram.retry_delay_seconds = 0;
        config.spotify.client_id = "test-client".to_string();
        config.spotify.client_secret = "test-secret".to_string();
        config.storage.tokens_path = dir.path().join("tokens.json").display().to_string();
        config
    }

    async fn build(
        spotify: MockSpotifyApi,
        users: Vec<(&str, CredentialRecord)>,
        links: Option<Arc<dyn LinkResolver>>,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let config = Self::test_config(&dir);

        let credentials = Arc::new(CredentialStore::load(&config.storage.tokens_path).await);
        for (user_id, record) in users {
            credentials.set(user_id, record).await.unwrap();
        }

        let spotify = Arc::new(spotify);
        let bot = Arc::new(MockBotApi::new());
        let links = links.unwrap_or_else(|| Arc::new(StaticLinkResolver::spotify_only()));

        let server = Server::with_components(
            config,
            ServerComponents {
                credentials,
                spotify: spotify.clone(),
                links,
                bot_api: bot.clone(),
            },
        )
        .await;
        let app = server.create_app();

        Self {
            server,
            app,
            bot,
            spotify,
            _dir: dir,
        }
    }

    /// Send a request to the HTTP app and return status plus body text.
    pub async fn request(&self, method: Method, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.request(Method::GET, uri).await
    }

    pub async fn dispatch(&self, update: Update) {
        self.server.bot_handler.handle_update(update).await;
    }
}

pub fn user_json(id: i64) -> serde_json::Value {
    json!({ "id": id, "is_bot": false, "first_name": "Tester", "username": "tester" })
}

/// A text message from `from` in a chat of the given type.
pub fn message_update(update_id: i64, from: i64, chat_type: &str, text: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "message": {
            "message_id": 77,
            "from": user_json(from),
            "chat": { "id": 500, "type": chat_type },
            "text": text
        }
    }))
    .unwrap()
}

#[allow(dead_code)]
pub fn inline_update(update_id: i64, from: i64) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "inline_query": {
            "id": format!("iq-{update_id}"),
            "from": user_json(from),
            "query": "",
            "offset": ""
        }
    }))
    .unwrap()
}

#[allow(dead_code)]
pub fn callback_update(update_id: i64, from: i64, data: &str, inline_message_id: &str) -> Update {
    serde_json::from_value(json!({
        "update_id": update_id,
        "callback_query": {
            "id": format!("cq-{update_id}"),
            "from": user_json(from),
            "data": data,
            "inline_message_id": inline_message_id,
            "chat_instance": "ci"
        }
    }))
    .unwrap()
}

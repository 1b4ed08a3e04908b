use crate::{
    config::Config,
    credentials::CredentialStore,
    links::{LinkResolver, StaticLinkResolver},
    server::{Server, ServerComponents},
    spotify::MockSpotifyApi,
    telegram::MockBotApi,
};
use std::ops::Deref;
use std::sync::Arc;
use tempfile::TempDir;

/// Test server builder wiring mock upstreams into a real [`Server`]
pub struct TestServerBuilder {
    dir: TempDir,
    config: Config,
    spotify: Arc<MockSpotifyApi>,
    bot: Arc<MockBotApi>,
    links: Arc<dyn LinkResolver>,
}

impl TestServerBuilder {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.telegram.bot_token = "test-token".to_string();
        config.telegram.bot_username = "muznowbot".to_string();
        config.telegram.poll_timeout_seconds = 0;
        config.telegram.retry_delay_seconds = 0;
        config.spotify.client_id = "test-client".to_string();
        config.spotify.client_secret = "test-secret".to_string();
        config.storage.tokens_path = dir.path().join("tokens.json").display().to_string();

        Self {
            dir,
            config,
            spotify: Arc::new(MockSpotifyApi::new()),
            bot: Arc::new(MockBotApi::new()),
            links: Arc::new(StaticLinkResolver::spotify_only()),
        }
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn with_spotify(mut self, spotify: MockSpotifyApi) -> Self {
        self.spotify = Arc::new(spotify);
        self
    }

    pub fn with_bot(mut self, bot: Arc<MockBotApi>) -> Self {
        self.bot = bot;
        self
    }

    pub async fn build(self) -> TestServer {
        let credentials = Arc::new(CredentialStore::load(&self.config.storage.tokens_path).await);

        let server = Server::with_components(
            self.config,
            ServerComponents {
                credentials,
                spotify: self.spotify,
                links: self.links,
                bot_api: self.bot,
            },
        )
        .await;

        TestServer {
            server,
            _dir: self.dir,
        }
    }
}

/// A [`Server`] whose credential file lives in a temp dir removed on drop
pub struct TestServer {
    server: Server,
    _dir: TempDir,
}

impl Deref for TestServer {
    type Target = Server;

    fn deref(&self) -> &Server {
        &self.server
    }
}

impl Default for TestServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialRecord;

    #[tokio::test]
    async fn test_credential_file_removed_with_server() {
        let server = TestServerBuilder::new().build().await;
        server
            .credentials
            .set("42", CredentialRecord::new("a", "r"))
            .await
            .unwrap();
        let path = server.credentials.path().to_path_buf();
        assert!(path.exists());

        drop(server);
        assert!(!path.exists());
    }
}

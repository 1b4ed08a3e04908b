use config::{Config as ConfigBuilder, ConfigBuilder as Builder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::jobs::JobsConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub telegram: TelegramConfig,
    pub spotify: SpotifyConfig,
    pub links: LinksConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Username without the leading `@`, shown in help texts.
    pub bot_username: String,
    pub api_url: String,
    pub poll_timeout_seconds: u64,
    pub retry_delay_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    pub api_url: String,
    pub fallback_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub tokens_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub track_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            telegram: TelegramConfig::default(),
            spotify: SpotifyConfig::default(),
            links: LinksConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            jobs: JobsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            bot_username: "nowplaying_bot".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            poll_timeout_seconds: 60,
            retry_delay_seconds: 5,
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:8888/callback".to_string(),
            scopes: vec!["user-read-currently-playing".to_string()],
            auth_url: "https://accounts.spotify.com/authorize".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            api_url: "https://api.spotify.com/v1".to_string(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.song.link/v1-alpha.1/links".to_string(),
            fallback_url: "https://song.link/s".to_string(),
            timeout_seconds: 10,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tokens_path: "tokens.json".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            track_ttl_seconds: 30,
        }
    }
}

impl CacheConfig {
    pub fn track_ttl(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.track_ttl_seconds)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Unprefixed variables used by earlier deployments of the bot.
const LEGACY_ENV_OVERRIDES: &[(&str, &str)] = &[
    ("TELEGRAM_BOT_TOKEN", "telegram.bot_token"),
    ("SPOTIFY_CLIENT_ID", "spotify.client_id"),
    ("SPOTIFY_CLIENT_SECRET", "spotify.client_secret"),
    ("SPOTIFY_REDIRECT_URI", "spotify.redirect_uri"),
    ("PORT", "server.port"),
];

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        Self::finish(builder)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        Self::finish(builder)
    }

    fn finish(builder: Builder<DefaultState>) -> Result<Self, ConfigError> {
        let mut builder = builder.add_source(
            Environment::with_prefix("NOWPLAYING")
                .prefix_separator("_")
                .separator("__"),
        );

        for (var, key) in LEGACY_ENV_OVERRIDES {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        builder.build()?.try_deserialize()
    }

    /// Reject configurations the bot cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "telegram.bot_token must be set".to_string(),
            ));
        }
        if self.spotify.client_id.trim().is_empty() {
            return Err(ConfigError::Message(
                "spotify.client_id must be set".to_string(),
            ));
        }
        if self.cache.track_ttl_seconds == 0 {
            return Err(ConfigError::Message(
                "cache.track_ttl_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

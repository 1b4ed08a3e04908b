use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned, de::IgnoredAny};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{
    AnswerCallbackQuery, AnswerInlineQuery, BotCommand, EditInlineMessageText, GetUpdates,
    SendMessage, SendPhoto, Update,
};
use crate::config::TelegramConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BotApiError {
    #[error("Telegram request failed: {0}")]
    Transport(String),
    #[error("Telegram API error {code:?}: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },
    #[error("Telegram response for {0} has no result")]
    MissingResult(String),
}

impl BotApiError {
    /// Editing a message with identical content is reported as an error by Telegram.
    pub fn is_message_not_modified(&self) -> bool {
        matches!(self, BotApiError::Api { description, .. } if description.contains("message is not modified"))
    }
}

impl From<reqwest::Error> for BotApiError {
    fn from(err: reqwest::Error) -> Self {
        // the request URL carries the bot token
        BotApiError::Transport(err.without_url().to_string())
    }
}

/// The Bot API methods the bot relies on
#[async_trait]
pub trait BotApi: Send + Sync {
    async fn get_updates(&self, request: &GetUpdates) -> Result<Vec<Update>, BotApiError>;
    async fn send_message(&self, request: &SendMessage) -> Result<(), BotApiError>;
    async fn send_photo(&self, request: &SendPhoto) -> Result<(), BotApiError>;
    async fn edit_inline_message_text(
        &self,
        request: &EditInlineMessageText,
    ) -> Result<(), BotApiError>;
    async fn answer_inline_query(&self, request: &AnswerInlineQuery) -> Result<(), BotApiError>;
    async fn answer_callback_query(
        &self,
        request: &AnswerCallbackQuery,
    ) -> Result<(), BotApiError>;
    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), BotApiError>;
    async fn set_my_description(&self, description: &str) -> Result<(), BotApiError>;
    async fn set_my_short_description(&self, short_description: &str)
    -> Result<(), BotApiError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Serialize)]
struct SetMyCommands<'a> {
    commands: &'a [BotCommand],
}

#[derive(Serialize)]
struct SetMyDescription<'a> {
    description: &'a str,
}

#[derive(Serialize)]
struct SetMyShortDescription<'a> {
    short_description: &'a str,
}

/// JSON-over-HTTPS Bot API client
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, BotApiError> {
        // must outlive the long-poll timeout
        let timeout = Duration::from_secs(config.poll_timeout_seconds + 10);
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    async fn call<P, R>(&self, method: &str, params: &P) -> Result<R, BotApiError>
    where
        P: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        debug!("Calling Telegram method {}", method);

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(params)
            .send()
            .await?;

        // error replies carry a JSON body with a non-2xx status
        let body: ApiResponse<R> = response.json().await?;
        if !body.ok {
            return Err(BotApiError::Api {
                code: body.error_code,
                description: body
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        body.result
            .ok_or_else(|| BotApiError::MissingResult(method.to_string()))
    }

    async fn call_unit<P>(&self, method: &str, params: &P) -> Result<(), BotApiError>
    where
        P: Serialize + ?Sized + Sync,
    {
        self.call::<P, IgnoredAny>(method, params).await.map(|_| ())
    }
}

/// An update the bot cannot read keeps only its id, so the poller still
/// acknowledges it instead of fetching the same batch forever.
fn parse_update(value: serde_json::Value) -> Option<Update> {
    let update_id = value.get("update_id").and_then(serde_json::Value::as_i64);
    match serde_json::from_value::<Update>(value) {
        Ok(update) => Some(update),
        Err(e) => {
            warn!("Skipping unreadable update {:?}: {}", update_id, e);
            update_id.map(|update_id| Update {
                update_id,
                message: None,
                inline_query: None,
                callback_query: None,
            })
        }
    }
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn get_updates(&self, request: &GetUpdates) -> Result<Vec<Update>, BotApiError> {
        let raw: Vec<serde_json::Value> = self.call("getUpdates", request).await?;
        Ok(raw.into_iter().filter_map(parse_update).collect())
    }

    async fn send_message(&self, request: &SendMessage) -> Result<(), BotApiError> {
        self.call_unit("sendMessage", request).await
    }

    async fn send_photo(&self, request: &SendPhoto) -> Result<(), BotApiError> {
        self.call_unit("sendPhoto", request).await
    }

    async fn edit_inline_message_text(
        &self,
        request: &EditInlineMessageText,
    ) -> Result<(), BotApiError> {
        self.call_unit("editMessageText", request).await
    }

    async fn answer_inline_query(&self, request: &AnswerInlineQuery) -> Result<(), BotApiError> {
        self.call_unit("answerInlineQuery", request).await
    }

    async fn answer_callback_query(
        &self,
        request: &AnswerCallbackQuery,
    ) -> Result<(), BotApiError> {
        self.call_unit("answerCallbackQuery", request).await
    }

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<(), BotApiError> {
        self.call_unit("setMyCommands", &SetMyCommands { commands })
            .await
    }

    async fn set_my_description(&self, description: &str) -> Result<(), BotApiError> {
        self.call_unit("setMyDescription", &SetMyDescription { description })
            .await
    }

    async fn set_my_short_description(
        &self,
        short_description: &str,
    ) -> Result<(), BotApiError> {
        self.call_unit(
            "setMyShortDescription",
            &SetMyShortDescription { short_description },
        )
        .await
    }
}

//! Turns incoming Telegram updates into track lookups and replies.
//!
//! Every user-facing failure is caught here and answered with a chat-safe
//! message from [`crate::presentation`]; upstream detail only reaches the logs.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::api::BotApi;
use super::types::{
    AnswerCallbackQuery, AnswerInlineQuery, BotCommand, CallbackQuery, EditInlineMessageText,
    InlineKeyboardMarkup, InlineQuery, InlineQueryResultArticle, InputTextMessageContent,
    KeyboardButton, Message, ParseMode, ReplyKeyboardMarkup, SendMessage, SendPhoto,
    Update,
};
use crate::{
    credentials::CredentialStore,
    error::{RelayError, RelayResult},
    links::LinkResolver,
    presentation::{
        INLINE_AUTH_REQUIRED_TEXT, SHARE_BUTTON_TEXT, error_message, format_track_message,
        help_message, start_message,
    },
    spotify::SpotifyApi,
    tracks::{TrackProvider, TrackSnapshot},
};

pub const REFRESH_CALLBACK_DATA: &str = "update_track";
const REFRESH_BUTTON_TEXT: &str = "🔄 Refresh Track";
const REFRESHED_TOAST: &str = "✅ Track information updated!";
const BOT_DESCRIPTION: &str = "Share your currently playing Spotify track in any chat";
const BOT_SHORT_DESCRIPTION: &str = "Share Spotify tracks instantly";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    NowPlaying,
}

impl Command {
    /// Interpret a message text.
    ///
    /// Only the first word is treated as a command; `/cmd@name` is ignored
    /// unless `name` is this bot. The share button text and a mention of
    /// `@nowplaying` or the bot also trigger [`Command::NowPlaying`].
    pub fn parse(text: &str, bot_username: &str) -> Option<Self> {
        let text = text.trim();
        if text == SHARE_BUTTON_TEXT {
            return Some(Command::NowPlaying);
        }

        if let Some(rest) = text.strip_prefix('/') {
            let word = rest.split_whitespace().next().unwrap_or_default();
            let (name, target) = match word.split_once('@') {
                Some((name, target)) => (name, Some(target)),
                None => (word, None),
            };
            if target.is_some_and(|target| !target.eq_ignore_ascii_case(bot_username)) {
                return None;
            }
            return match name.to_ascii_lowercase().as_str() {
                "start" => Some(Command::Start),
                "help" => Some(Command::Help),
                "nowplaying" => Some(Command::NowPlaying),
                _ => None,
            };
        }

        let lowered = text.to_lowercase();
        let mentioned = lowered.contains("@nowplaying")
            || (!bot_username.is_empty()
                && lowered.contains(&format!("@{}", bot_username.to_lowercase())));
        mentioned.then_some(Command::NowPlaying)
    }
}

pub fn bot_commands() -> Vec<BotCommand> {
    [
        ("start", "Start and authorize with Spotify"),
        ("help", "Show help message"),
        ("nowplaying", "Share currently playing track"),
    ]
    .into_iter()
    .map(|(command, description)| BotCommand {
        command: command.to_string(),
        description: description.to_string(),
    })
    .collect()
}

fn share_keyboard() -> ReplyKeyboardMarkup {
    ReplyKeyboardMarkup {
        keyboard: vec![vec![KeyboardButton {
            text: SHARE_BUTTON_TEXT.to_string(),
        }]],
        resize_keyboard: true,
        one_time_keyboard: false,
    }
}

fn refresh_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::single(REFRESH_BUTTON_TEXT, REFRESH_CALLBACK_DATA)
}

/// Upstream detail is logged here; only chat-safe text goes out.
fn log_failure(context: &str, user_id: &str, error: &RelayError) {
    match error {
        RelayError::NotAuthorized | RelayError::NotPlaying => {
            debug!("{} for user {}: {}", context, user_id, error)
        }
        _ => warn!("{} for user {} failed: {}", context, user_id, error),
    }
}

struct RenderedTrack {
    track: TrackSnapshot,
    text: String,
}

pub struct BotHandler {
    bot: Arc<dyn BotApi>,
    credentials: Arc<CredentialStore>,
    tracks: Arc<TrackProvider>,
    links: Arc<dyn LinkResolver>,
    spotify: Arc<dyn SpotifyApi>,
    bot_username: String,
}

impl BotHandler {
    pub fn new(
        bot: Arc<dyn BotApi>,
        credentials: Arc<CredentialStore>,
        tracks: Arc<TrackProvider>,
        links: Arc<dyn LinkResolver>,
        spotify: Arc<dyn SpotifyApi>,
        bot_username: String,
    ) -> Self {
        Self {
            bot,
            credentials,
            tracks,
            links,
            spotify,
            bot_username: bot_username.trim_start_matches('@').to_string(),
        }
    }

    /// Register commands and descriptions. Failures are logged and ignored.
    pub async fn setup_bot(&self) {
        if let Err(e) = self.bot.set_my_commands(&bot_commands()).await {
            warn!("Failed to register bot commands: {}", e);
        }
        if let Err(e) = self.bot.set_my_description(BOT_DESCRIPTION).await {
            warn!("Failed to set bot description: {}", e);
        }
        if let Err(e) = self.bot.set_my_short_description(BOT_SHORT_DESCRIPTION).await {
            warn!("Failed to set bot short description: {}", e);
        }
        info!("Bot commands and descriptions configured");
    }

    pub async fn handle_update(&self, update: Update) {
        if let Some(query) = update.inline_query {
            self.handle_inline_query(&query).await;
        } else if let Some(query) = update.callback_query {
            self.handle_callback_query(&query).await;
        } else if let Some(message) = update.message {
            self.handle_message(&message).await;
        } else {
            debug!("Ignoring update {} without a supported payload", update.update_id);
        }
    }

    pub async fn handle_message(&self, message: &Message) {
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let Some(command) = Command::parse(text, &self.bot_username) else {
            return;
        };

        match command {
            Command::Start => self.handle_start(message).await,
            Command::Help => self.handle_help(message).await,
            Command::NowPlaying => self.handle_now_playing(message).await,
        }
    }

    /// Fetch and format the user's current track.
    async fn render_current_track(&self, user_id: &str) -> RelayResult<RenderedTrack> {
        let record = self
            .credentials
            .get(user_id)
            .await
            .ok_or(RelayError::NotAuthorized)?;
        let track = self
            .tracks
            .current_track(user_id, &record.access_token)
            .await?;
        let links = self.links.platform_links(&track.id).await;
        let text = format_track_message(&track, &links);
        Ok(RenderedTrack { track, text })
    }

    async fn handle_start(&self, message: &Message) {
        let Some(user) = message.from.as_ref() else {
            return;
        };
        let is_private = message.chat.is_private();
        let auth_url = self.spotify.authorize_url(&user.key());

        let request = SendMessage {
            chat_id: message.chat.id,
            text: start_message(&auth_url, is_private, &self.bot_username),
            parse_mode: None,
            reply_to_message_id: None,
            reply_markup: is_private.then(share_keyboard),
        };
        if let Err(e) = self.bot.send_message(&request).await {
            warn!("Failed to send start message to chat {}: {}", message.chat.id, e);
        }
    }

    async fn handle_help(&self, message: &Message) {
        let is_private = message.chat.is_private();
        let request = SendMessage {
            chat_id: message.chat.id,
            text: help_message(is_private, &self.bot_username),
            parse_mode: Some(ParseMode::Markdown),
            reply_to_message_id: Some(message.message_id),
            reply_markup: is_private.then(share_keyboard),
        };
        if let Err(e) = self.bot.send_message(&request).await {
            warn!("Failed to send help message to chat {}: {}", message.chat.id, e);
        }
    }

    async fn handle_now_playing(&self, message: &Message) {
        let Some(user) = message.from.as_ref() else {
            return;
        };
        let user_id = user.key();
        let chat_id = message.chat.id;

        let sent = match self.render_current_track(&user_id).await {
            Ok(RenderedTrack { track, text }) => match track.album_image_url {
                Some(photo) => {
                    self.bot
                        .send_photo(&SendPhoto {
                            chat_id,
                            photo,
                            caption: text,
                            parse_mode: Some(ParseMode::Markdown),
                            reply_to_message_id: Some(message.message_id),
                        })
                        .await
                }
                None => {
                    self.bot
                        .send_message(&SendMessage {
                            chat_id,
                            text,
                            parse_mode: Some(ParseMode::Markdown),
                            reply_to_message_id: Some(message.message_id),
                            reply_markup: None,
                        })
                        .await
                }
            },
            Err(e) => {
                log_failure("Now playing", &user_id, &e);
                self.bot
                    .send_message(&SendMessage {
                        chat_id,
                        text: error_message(&e, message.chat.is_private()),
                        parse_mode: None,
                        reply_to_message_id: Some(message.message_id),
                        reply_markup: None,
                    })
                    .await
            }
        };

        if let Err(e) = sent {
            warn!("Failed to send now playing reply to chat {}: {}", chat_id, e);
        }
    }

    pub async fn handle_inline_query(&self, query: &InlineQuery) {
        let user_id = query.from.key();

        let article = match self.render_current_track(&user_id).await {
            Ok(RenderedTrack { track, text }) => {
                let mut article = InlineQueryResultArticle::new(
                    "current_track",
                    format!("🎵 {}", track.name),
                    InputTextMessageContent {
                        message_text: text,
                        parse_mode: Some(ParseMode::Markdown),
                        disable_web_page_preview: Some(false),
                    },
                );
                article.description = Some(track.artists);
                article.thumbnail_url = track.album_image_url;
                article.reply_markup = Some(refresh_keyboard());
                article
            }
            Err(RelayError::NotAuthorized) => {
                let mut article = InlineQueryResultArticle::new(
                    "auth_required",
                    "🔑 Authorization Required".to_string(),
                    InputTextMessageContent {
                        message_text: INLINE_AUTH_REQUIRED_TEXT.to_string(),
                        parse_mode: Some(ParseMode::Markdown),
                        disable_web_page_preview: None,
                    },
                );
                article.description = Some("Click here to connect Spotify".to_string());
                article
            }
            Err(e) => {
                log_failure("Inline query", &user_id, &e);
                let (title, description) = match e {
                    RelayError::NotPlaying => ("❌ No Active Track", "Play music on Spotify"),
                    _ => ("❌ Error", "Failed to get track information"),
                };
                let mut article = InlineQueryResultArticle::new(
                    "error",
                    title.to_string(),
                    InputTextMessageContent {
                        message_text: error_message(&e, false),
                        parse_mode: Some(ParseMode::Markdown),
                        disable_web_page_preview: None,
                    },
                );
                article.description = Some(description.to_string());
                article
            }
        };

        let answer = AnswerInlineQuery {
            inline_query_id: query.id.clone(),
            results: vec![article],
            cache_time: 1,
            is_personal: true,
        };
        if let Err(e) = self.bot.answer_inline_query(&answer).await {
            warn!("Failed to answer inline query {}: {}", query.id, e);
        }
    }

    pub async fn handle_callback_query(&self, query: &CallbackQuery) {
        if query.data.as_deref() != Some(REFRESH_CALLBACK_DATA) {
            self.answer_callback(query, None, false).await;
            return;
        }

        let user_id = query.from.key();
        match self.refresh_inline_message(query, &user_id).await {
            Ok(()) => {
                self.answer_callback(query, Some(REFRESHED_TOAST.to_string()), false)
                    .await
            }
            Err(e) => {
                log_failure("Track refresh", &user_id, &e);
                self.answer_callback(query, Some(error_message(&e, false)), true)
                    .await
            }
        }
    }

    async fn refresh_inline_message(&self, query: &CallbackQuery, user_id: &str) -> RelayResult<()> {
        let rendered = self.render_current_track(user_id).await?;

        let Some(inline_message_id) = query.inline_message_id.clone() else {
            return Ok(());
        };

        let edit = EditInlineMessageText {
            inline_message_id,
            text: rendered.text,
            parse_mode: Some(ParseMode::Markdown),
            disable_web_page_preview: Some(false),
            reply_markup: Some(refresh_keyboard()),
        };
        match self.bot.edit_inline_message_text(&edit).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_message_not_modified() => Ok(()),
            Err(e) => Err(RelayError::UpstreamUnavailable(e.to_string())),
        }
    }

    async fn answer_callback(&self, query: &CallbackQuery, text: Option<String>, show_alert: bool) {
        let answer = AnswerCallbackQuery {
            callback_query_id: query.id.clone(),
            text,
            show_alert,
        };
        if let Err(e) = self.bot.answer_callback_query(&answer).await {
            warn!("Failed to answer callback query {}: {}", query.id, e);
        }
    }
}

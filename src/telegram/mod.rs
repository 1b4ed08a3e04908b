//! Telegram Bot API gateway: wire types, HTTP client, update handling and
//! the long-poll loop.

pub mod api;
pub mod handlers;
pub mod mock;
pub mod polling;
pub mod types;

pub use api::{BotApi, BotApiError, TelegramClient};
pub use handlers::{BotHandler, Command};
pub use mock::MockBotApi;
pub use polling::UpdatePoller;

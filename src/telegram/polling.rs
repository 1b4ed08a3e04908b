use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info, warn};

use super::api::BotApi;
use super::handlers::BotHandler;
use super::types::GetUpdates;
use crate::config::TelegramConfig;

const ALLOWED_UPDATES: [&str; 3] = ["message", "callback_query", "inline_query"];

/// Long-polls `getUpdates` and hands each update to its own task.
pub struct UpdatePoller {
    bot: Arc<dyn BotApi>,
    handler: Arc<BotHandler>,
    poll_timeout_seconds: u64,
    retry_delay: Duration,
}

impl UpdatePoller {
    pub fn new(bot: Arc<dyn BotApi>, handler: Arc<BotHandler>, config: &TelegramConfig) -> Self {
        Self {
            bot,
            handler,
            poll_timeout_seconds: config.poll_timeout_seconds,
            retry_delay: Duration::from_secs(config.retry_delay_seconds),
        }
    }

    pub fn spawn(self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown_rx))
    }

    /// Poll until `shutdown_rx` turns true.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            "Polling Telegram for updates (timeout {}s)",
            self.poll_timeout_seconds
        );
        let mut offset: Option<i64> = None;

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            let request = GetUpdates {
                offset,
                timeout: self.poll_timeout_seconds,
                allowed_updates: ALLOWED_UPDATES.iter().map(|u| u.to_string()).collect(),
            };

            let result = tokio::select! {
                result = self.bot.get_updates(&request) => result,
                _ = shutdown_signalled(&mut shutdown_rx) => break,
            };

            match result {
                Ok(updates) => {
                    for update in updates {
                        // acknowledged on the next poll even if handling fails
                        offset = Some(update.update_id + 1);
                        debug!("Dispatching update {}", update.update_id);
                        let handler = self.handler.clone();
                        tokio::spawn(async move {
                            handler.handle_update(update).await;
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        "Polling for updates failed: {}, retrying in {:?}",
                        e, self.retry_delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(self.retry_delay) => {}
                        _ = shutdown_signalled(&mut shutdown_rx) => break,
                    }
                }
            }
        }

        info!("Update polling stopped");
    }
}

async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // sender gone: nobody can request shutdown any more
            std::future::pending::<()>().await;
        }
    }
}

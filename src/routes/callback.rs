use axum::{
    extract::{Query, State},
    response::Html,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{error::AppError, server::Server};

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    /// Telegram user id that started the authorization
    pub state: Option<String>,
    pub error: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Completes the OAuth handshake started by `/start`.
///
/// Answers on any HTTP method; only the query string matters.
pub async fn callback_handler(
    State(server): State<Server>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<String>, AppError> {
    if let Some(error) = non_empty(params.error) {
        warn!("Authorization was declined: {}", error);
        return Err(AppError::BadRequest(error));
    }

    let (Some(code), Some(user_id)) = (non_empty(params.code), non_empty(params.state)) else {
        return Err(AppError::BadRequest(
            "Missing required parameters".to_string(),
        ));
    };

    let record = server.spotify.exchange_code(&code).await.map_err(|e| {
        warn!("Failed to exchange authorization code for user {}: {}", user_id, e);
        AppError::from(e)
    })?;

    // the record is live in memory even if the file write failed
    if let Err(e) = server.credentials.set(&user_id, record).await {
        error!("Credentials for user {} were not persisted: {}", user_id, e);
    }

    info!("User {} authorized with Spotify", user_id);
    Ok(Html(success_page(&server.config.telegram.bot_username)))
}

pub fn success_page(bot_username: &str) -> String {
    let bot_username = escape_html(bot_username.trim_start_matches('@'));
    format!(
        r#"<html>
  <body style="display: flex; justify-content: center; align-items: center; height: 100vh; font-family: Arial;">
    <div style="text-align: center;">
      <h2>Authorization Successful!</h2>
      <p>You can now:</p>
      <ul style="list-style: none; padding: 0;">
        <li>Use the /nowplaying command in any chat with the bot</li>
        <li>Type @{bot_username} in any chat to share the current track</li>
        <li>Just start typing @ and select the bot to share music</li>
      </ul>
      <p>You can close this window and return to Telegram</p>
    </div>
  </body>
</html>"#
    )
}

pub fn error_page(reason: &str) -> String {
    let reason = escape_html(reason);
    format!(
        r#"<html>
  <body style="display: flex; justify-content: center; align-items: center; height: 100vh; font-family: Arial;">
    <div style="text-align: center;">
      <h2>Authorization Error</h2>
      <p>Error: {reason}</p>
      <p>Please try again using the /start command in Telegram</p>
    </div>
  </body>
</html>"#
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

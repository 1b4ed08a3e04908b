//! Chat-ready texts. Everything here is a pure function of its inputs.

use crate::{error::RelayError, links::PlatformLinks, tracks::TrackSnapshot};

/// Text of the private-chat reply keyboard button that shares the current track.
pub const SHARE_BUTTON_TEXT: &str = "🎵 Share Current Track";

/// Markdown message for a track and its links.
pub fn format_track_message(track: &TrackSnapshot, links: &PlatformLinks) -> String {
    let mut message = format!(
        "🎵 Now Playing: {}\n👤 Artist: {}\n💿 Album: {}",
        escape_markdown(&track.name),
        escape_markdown(&track.artists),
        escape_markdown(&track.album_name)
    );

    if let Some(year) = track.release_year() {
        message.push_str(&format!(" ({year})"));
    }

    message.push_str("\n\n🎧 Listen on:\n");
    for (label, url) in links.labelled() {
        message.push_str(&format!("• [{label}]({url})\n"));
    }

    message.push_str(&format!("\n🌐 [Open all options]({})", links.song_link));
    message
}

/// Escape the characters legacy Markdown treats as entity delimiters.
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Chat-safe text for a failed request. Never includes upstream detail.
pub fn error_message(error: &RelayError, is_private_chat: bool) -> String {
    match error {
        RelayError::NotAuthorized => {
            let hint = if is_private_chat {
                "Use the /start command"
            } else {
                "Open a private chat with the bot and use the /start command"
            };
            format!("Please authorize first. {hint}")
        }
        RelayError::NotPlaying => {
            "Nothing is playing right now. Start playing music on Spotify and try again!"
                .to_string()
        }
        _ => "An error occurred while getting track information. Please try again later."
            .to_string(),
    }
}

pub fn help_message(is_private_chat: bool, bot_username: &str) -> String {
    let share_hint = if is_private_chat {
        "• Use the \"Share Current Track\" button below\n"
    } else {
        ""
    };
    let bot_username = escape_markdown(bot_username);

    format!(
        "🎵 *Quick Guide to Using Music Bot*

*Fastest way to share:*
{share_hint}1️⃣ Type @ in any chat
2️⃣ Select this bot from the list
3️⃣ Click to share current track

*Other methods:*
• Use /nowplaying command
• Mention @{bot_username}
• Type @{bot_username} in any chat

*Tips:*
• Works in private chats, groups and channels
• Shows album art when available
• Includes links to multiple music platforms
• Automatically refreshes authorization

*Need help?*
• /start - Authorize with Spotify
• /help - Show this message
• /nowplaying - Share current track

The bot will remember your Spotify connection, so you only need to authorize once."
    )
}

pub fn start_message(auth_url: &str, is_private_chat: bool, bot_username: &str) -> String {
    let button_hint = if is_private_chat {
        "\n4. Use the quick button below"
    } else {
        ""
    };

    format!(
        "Hi! To get started, you need to authorize with Spotify.
Click the link below and grant access:
{auth_url}

After authorization, you can use the bot in any chat:
1. Quick share: Just type @ and select the bot
2. Command: /nowplaying
3. Mention: @{bot_username}
{button_hint}

Use /help to see all commands and tips"
    )
}

/// Inline-query article text for users without credentials.
pub const INLINE_AUTH_REQUIRED_TEXT: &str =
    "You need to authorize to share tracks. Send /start to the bot in a private message.";

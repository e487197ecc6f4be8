//! Telegram client using teloxide.

use async_trait::async_trait;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, ChatAction, ChatId, Recipient};
use tracing::{info, warn};

use crate::relay::api::ChatApi;

/// Telegram rejects longer messages. Measured in UTF-16 code units.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Update kinds the bot asks Telegram to deliver.
pub const ALLOWED_UPDATES: [AllowedUpdate; 4] = [
    AllowedUpdate::Message,
    AllowedUpdate::EditedMessage,
    AllowedUpdate::ChannelPost,
    AllowedUpdate::EditedChannelPost,
];

/// Telegram API client.
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatApi for TelegramClient {
    async fn send_message(&self, to: Recipient, text: &str) -> Result<i64, String> {
        let text = fit_message(text);
        self.bot
            .send_message(to, text)
            .await
            .map(|msg| msg.id.0 as i64)
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), String> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to send chat action: {e}"))
    }

    async fn register_webhook(&self, url: &Url) -> Result<(), String> {
        info!("🔗 Calling setWebhook");
        self.bot
            .set_webhook(url.clone())
            .allowed_updates(ALLOWED_UPDATES)
            .drop_pending_updates(true)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to set webhook: {e}");
                warn!("{}", msg);
                msg
            })
    }
}

/// Clip text to Telegram's message limit on a char boundary.
pub fn fit_message(text: &str) -> String {
    if text.encode_utf16().count() <= MAX_MESSAGE_LEN {
        return text.to_string();
    }
    // Leave one unit for the ellipsis
    let mut used = 0;
    let mut truncated = String::new();
    for c in text.chars() {
        used += c.len_utf16();
        if used > MAX_MESSAGE_LEN - 1 {
            break;
        }
        truncated.push(c);
    }
    truncated.push('…');
    truncated
}

/// Human-readable form of a destination for logs.
pub fn describe_recipient(to: &Recipient) -> String {
    match to {
        Recipient::Id(id) => id.0.to_string(),
        Recipient::ChannelUsername(name) => name.clone(),
    }
}

//! Webhook update envelope and the inbound event extracted from it.
//!
//! Only the handful of fields the relay routes on are modelled; everything
//! else in the provider payload is ignored.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Telegram update payload as POSTed to the webhook.
#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    pub message: Option<UpdateMessage>,
    pub edited_message: Option<UpdateMessage>,
    pub channel_post: Option<UpdateMessage>,
    pub edited_channel_post: Option<UpdateMessage>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMessage {
    pub chat: UpdateChat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderScope {
    Private,
    /// Groups and supergroups.
    Group,
    Channel,
}

impl SenderScope {
    fn from_chat_type(chat_type: &str) -> Option<Self> {
        match chat_type {
            "private" => Some(Self::Private),
            "group" | "supergroup" => Some(Self::Group),
            "channel" => Some(Self::Channel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }
}

/// One inbound message, created per webhook call.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub conversation_id: i64,
    pub scope: SenderScope,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Update {
    /// The first message-like field present, in delivery-kind order.
    fn first_message(self) -> Option<UpdateMessage> {
        self.message
            .or(self.edited_message)
            .or(self.channel_post)
            .or(self.edited_channel_post)
    }

    /// Extract the inbound event, or `None` when there is nothing to route.
    pub fn into_event(self, received_at: DateTime<Utc>) -> Option<InboundEvent> {
        let message = self.first_message()?;
        let scope = SenderScope::from_chat_type(&message.chat.chat_type)?;
        Some(InboundEvent {
            conversation_id: message.chat.id,
            scope,
            text: message.text.unwrap_or_default(),
            received_at,
        })
    }
}

/// Parse a raw webhook body. Malformed JSON is an error; a well-formed update
/// with nothing to route is `Ok(None)`.
pub fn parse_update(body: &[u8], received_at: DateTime<Utc>) -> Result<Option<InboundEvent>, serde_json::Error> {
    let update: Update = serde_json::from_slice(body)?;
    Ok(update.into_event(received_at))
}

//! Seams to the outside world, so the relay can run against fakes in tests.

use async_trait::async_trait;
use reqwest::Url;
use teloxide::types::Recipient;

use crate::relay::gemini::GenerateError;

/// Chat platform operations the relay needs.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send a plain-text message. Returns the sent message id.
    async fn send_message(&self, to: Recipient, text: &str) -> Result<i64, String>;

    /// Show the "typing…" indicator in a chat.
    async fn send_typing(&self, chat_id: i64) -> Result<(), String>;

    /// Point provider delivery at `url`, discarding updates queued before now.
    async fn register_webhook(&self, url: &Url) -> Result<(), String>;
}

/// A text generation backend addressed by model id.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerateError>;
}

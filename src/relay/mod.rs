//! Relay module - answers private Telegram messages through Gemini.

pub mod api;
pub mod commands;
pub mod engine;
pub mod gemini;
pub mod generator;
pub mod history;
pub mod knowledge;
pub mod language;
pub mod telegram;
pub mod update;

#[cfg(test)]
pub mod testing;

pub use api::{ChatApi, TextGenerator};
pub use engine::RelayEngine;
pub use gemini::GeminiClient;
pub use generator::ReplyGenerator;
pub use history::ConversationStore;
pub use knowledge::KnowledgeBase;
pub use telegram::TelegramClient;

//! Telegram relay bot: answers private messages through Gemini with layered
//! fallback, and broadcasts a periodic status message to several channels.

pub mod broadcast;
pub mod config;
pub mod registrar;
pub mod relay;
pub mod server;

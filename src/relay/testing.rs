//! Recording fakes for the `ChatApi` and `TextGenerator` seams.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use teloxide::types::Recipient;

use crate::relay::api::{ChatApi, TextGenerator};
use crate::relay::gemini::GenerateError;
use crate::relay::telegram::describe_recipient;

/// Replays queued results in order; an empty queue answers `Empty`.
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, GenerateError>>>,
    calls: Mutex<Vec<String>>,
    delays: HashMap<String, Duration>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<String, GenerateError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            delays: HashMap::new(),
        }
    }

    /// Make calls to `model` sleep before answering.
    pub fn with_delay(mut self, model: &str, delay: Duration) -> Self {
        self.delays.insert(model.to_string(), delay);
        self
    }

    /// Models called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, model: &str, _prompt: &str) -> Result<String, GenerateError> {
        self.calls.lock().unwrap().push(model.to_string());
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerateError::Empty));
        if let Some(delay) = self.delays.get(model) {
            tokio::time::sleep(*delay).await;
        }
        response
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub text: String,
}

/// Captures outbound chat traffic.
#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<SentMessage>>,
    typing: Mutex<Vec<i64>>,
    failing: HashSet<String>,
    register_results: Mutex<VecDeque<Result<(), String>>>,
    registered_urls: Mutex<Vec<String>>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends to `to` (as rendered by `describe_recipient`) fail.
    pub fn failing_for(mut self, to: &str) -> Self {
        self.failing.insert(to.to_string());
        self
    }

    /// Queue setWebhook outcomes; an empty queue succeeds.
    pub fn with_register_results(self, results: Vec<Result<(), String>>) -> Self {
        *self.register_results.lock().unwrap() = results.into();
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn typing(&self) -> Vec<i64> {
        self.typing.lock().unwrap().clone()
    }

    pub fn registered_urls(&self) -> Vec<String> {
        self.registered_urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatApi for RecordingChat {
    async fn send_message(&self, to: Recipient, text: &str) -> Result<i64, String> {
        let to = describe_recipient(&to);
        if self.failing.contains(&to) {
            return Err(format!("Failed to send: chat {to} not found"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMessage { to, text: text.to_string() });
        Ok(sent.len() as i64)
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), String> {
        self.typing.lock().unwrap().push(chat_id);
        Ok(())
    }

    async fn register_webhook(&self, url: &Url) -> Result<(), String> {
        self.registered_urls.lock().unwrap().push(url.to_string());
        self.register_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

//! Periodic status broadcast to every configured outbound channel.
//!
//! Targets are independent: each send runs on its own task and a failure (or
//! panic) in one is logged without touching the others or the schedule.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use teloxide::types::Recipient;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::relay::gemini::truncate_chars;
use crate::relay::telegram::describe_recipient;
use crate::relay::ChatApi;

/// Max chars of a webhook error body kept in logs.
const MAX_ERROR_BODY: usize = 200;

/// One outbound destination for the status message.
#[derive(Debug, Clone)]
pub enum BroadcastTarget {
    /// Telegram channel or chat.
    Channel(Recipient),
    /// Generic webhook receiving `{"content": ...}`.
    Webhook(Url),
}

impl BroadcastTarget {
    /// Short label for logs. Webhook URLs often embed tokens, so only the host is shown.
    pub fn describe(&self) -> String {
        match self {
            Self::Channel(to) => format!("channel {}", describe_recipient(to)),
            Self::Webhook(url) => format!("webhook {}", url.host_str().unwrap_or("?")),
        }
    }
}

#[derive(Debug)]
pub enum DeliveryError {
    Telegram(String),
    Http(String),
    Status { status: u16, body: String },
    /// The send task panicked or was cancelled.
    Aborted(String),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Telegram(e) => write!(f, "Telegram error: {e}"),
            DeliveryError::Http(e) => write!(f, "HTTP error: {e}"),
            DeliveryError::Status { status, body } => write!(f, "webhook returned {status}: {body}"),
            DeliveryError::Aborted(e) => write!(f, "send aborted: {e}"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Delivers one message to one target.
#[async_trait]
pub trait BroadcastTransport: Send + Sync {
    async fn deliver(&self, target: &BroadcastTarget, text: &str) -> Result<(), DeliveryError>;
}

/// Telegram for channels, plain HTTP POST for webhooks.
pub struct HttpTransport {
    chat: Arc<dyn ChatApi>,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(chat: Arc<dyn ChatApi>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { chat, http })
    }
}

#[async_trait]
impl BroadcastTransport for HttpTransport {
    async fn deliver(&self, target: &BroadcastTarget, text: &str) -> Result<(), DeliveryError> {
        match target {
            BroadcastTarget::Channel(to) => self
                .chat
                .send_message(to.clone(), text)
                .await
                .map(|_| ())
                .map_err(DeliveryError::Telegram),
            BroadcastTarget::Webhook(url) => {
                let response = self
                    .http
                    .post(url.clone())
                    .json(&serde_json::json!({ "content": text }))
                    .send()
                    .await
                    .map_err(|e| DeliveryError::Http(e.without_url().to_string()))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(DeliveryError::Status {
                        status: status.as_u16(),
                        body: truncate_chars(&body, MAX_ERROR_BODY),
                    });
                }
                Ok(())
            }
        }
    }
}

/// Result of sending to one target in one cycle.
#[derive(Debug)]
pub struct DeliveryReport {
    pub target: String,
    pub result: Result<(), DeliveryError>,
}

const STATUS_TEMPLATES: [&str; 4] = [
    "📌 Official Notice\n\n\
     • All participation happens via smart contracts\n\
     • No private transfers\n\
     • No admin DMs",
    "⚠️ Safety reminder\n\n\
     Admins will never DM you asking for money. All actions happen on the official page.",
    "🟡 Common beginner mistakes\n\n\
     ❌ Running out of gas\n\
     ❌ Picking the wrong network\n\
     ❌ Not checking the contract address",
    "🔐 How to verify the official contract\n\n\
     Only trust the officially published address, never screenshots.",
];

/// Status text for the given cycle; templates rotate.
pub fn compose_status(cycle: u64, now: DateTime<Utc>) -> String {
    let template = STATUS_TEMPLATES[(cycle % STATUS_TEMPLATES.len() as u64) as usize];
    format!("{}\n\n🕒 {}", template, now.format("%Y-%m-%d %H:%M UTC"))
}

pub struct BroadcastScheduler {
    transport: Arc<dyn BroadcastTransport>,
    targets: Vec<BroadcastTarget>,
    interval: Duration,
}

impl BroadcastScheduler {
    pub fn new(transport: Arc<dyn BroadcastTransport>, targets: Vec<BroadcastTarget>, interval: Duration) -> Self {
        Self {
            transport,
            targets,
            interval,
        }
    }

    /// Send `text` to every target concurrently; one report per target, in
    /// configured order.
    pub async fn run_cycle(&self, text: &str) -> Vec<DeliveryReport> {
        let text: Arc<str> = Arc::from(text);
        let handles: Vec<_> = self
            .targets
            .iter()
            .cloned()
            .map(|target| {
                let transport = self.transport.clone();
                let text = text.clone();
                tokio::spawn(async move { transport.deliver(&target, &text).await })
            })
            .collect();

        let mut reports = Vec::with_capacity(handles.len());
        for (target, handle) in self.targets.iter().zip(handles) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(DeliveryError::Aborted(e.to_string())),
            };
            let label = target.describe();
            match &result {
                Ok(()) => info!("📣 Broadcast delivered to {}", label),
                Err(e) => warn!("Broadcast to {} failed: {}", label, e),
            }
            reports.push(DeliveryReport { target: label, result });
        }
        reports
    }

    /// Run forever: one cycle immediately, then every `interval` from start.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycle: u64 = 0;
        info!(
            "📣 Broadcasting to {} target(s) every {} min",
            self.targets.len(),
            self.interval.as_secs() / 60
        );

        loop {
            interval.tick().await;
            let text = compose_status(cycle, Utc::now());
            let reports = self.run_cycle(&text).await;
            let delivered = reports.iter().filter(|r| r.result.is_ok()).count();
            info!("Broadcast cycle {}: {}/{} delivered", cycle, delivered, reports.len());
            cycle += 1;
        }
    }
}

//! Webhook registration with retry and backoff.
//!
//! Runs once at boot. Exhausting every attempt leaves the process running
//! without inbound delivery; broadcasts and health routes are unaffected.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::relay::ChatApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registering { attempt: u32 },
    Registered,
    /// Gave up after this many attempts.
    Failed { attempts: u32 },
}

impl RegistrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unregistered => "unregistered",
            Self::Registering { .. } => "registering",
            Self::Registered => "registered",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Exponential backoff between registration attempts.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub factor: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(2),
            factor: 2,
            max_delay: Duration::from_secs(60),
            max_attempts: 6,
        }
    }
}

impl Backoff {
    /// Wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        let multiplier = self.factor.saturating_pow(exp);
        self.initial
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

pub struct Registrar {
    chat: Arc<dyn ChatApi>,
    callback_url: Url,
    /// Callback URL with the secret masked, for logs.
    display_url: String,
    backoff: Backoff,
    state: watch::Sender<RegistrationState>,
}

impl Registrar {
    pub fn new(chat: Arc<dyn ChatApi>, callback_url: Url, display_url: String, backoff: Backoff) -> Self {
        let (state, _) = watch::channel(RegistrationState::Unregistered);
        Self {
            chat,
            callback_url,
            display_url,
            backoff,
            state,
        }
    }

    pub fn state(&self) -> RegistrationState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrationState> {
        self.state.subscribe()
    }

    /// Register the callback URL, retrying with backoff. Never fails; the
    /// final state is returned. A no-op once registered.
    pub async fn run(&self) -> RegistrationState {
        if self.state() == RegistrationState::Registered {
            return RegistrationState::Registered;
        }

        let max_attempts = self.backoff.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            self.state.send_replace(RegistrationState::Registering { attempt });
            info!("🔗 Registering webhook {} (attempt {}/{})", self.display_url, attempt, max_attempts);

            match self.chat.register_webhook(&self.callback_url).await {
                Ok(()) => {
                    self.state.send_replace(RegistrationState::Registered);
                    info!("✅ Webhook registered");
                    return RegistrationState::Registered;
                }
                Err(e) => {
                    warn!("Webhook registration attempt {} failed: {}", attempt, e);
                    if attempt < max_attempts {
                        let delay = self.backoff.delay_after(attempt);
                        info!("Retrying webhook registration in {}ms", delay.as_millis());
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let failed = RegistrationState::Failed { attempts: max_attempts };
        self.state.send_replace(failed);
        error!(
            "Webhook registration gave up after {} attempts; inbound messages will not arrive",
            max_attempts
        );
        failed
    }
}

use reqwest::Url;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use teloxide::types::{ChatId, Recipient};

use crate::broadcast::BroadcastTarget;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is unset or blank.
    Missing(&'static str),
    /// A variable is set but its value is unusable.
    Invalid { var: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(var) => write!(f, "missing required environment variable {}", var),
            Self::Invalid { var, reason } => write!(f, "invalid value for {}: {}", var, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_DIR: &str = "logs";
/// 8 user/agent exchanges.
const DEFAULT_HISTORY_LIMIT: usize = 16;

pub struct Config {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    /// Secret path segment of the callback route.
    pub webhook_secret: String,
    pub public_base_url: Url,
    /// `<public_base_url>/telegram/<webhook_secret>`
    pub callback_url: Url,
    /// Chat channels first, then generic webhooks, in configured order.
    pub broadcast_targets: Vec<BroadcastTarget>,
    /// Model ids in fallback order.
    pub gemini_models: Vec<String>,
    pub broadcast_interval: Duration,
    pub port: u16,
    pub log_dir: PathBuf,
    /// Max entries kept per conversation.
    pub history_limit: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| -> Option<String> {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Invalid {
                var: "TELEGRAM_BOT_TOKEN",
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let gemini_api_key = required("GEMINI_API_KEY")?;

        let webhook_secret = required("WEBHOOK_SECRET")?;
        if !webhook_secret
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid {
                var: "WEBHOOK_SECRET",
                reason: "only letters, digits, '_' and '-' are allowed".into(),
            });
        }

        let public_base_url = parse_http_url("PUBLIC_BASE_URL", &required("PUBLIC_BASE_URL")?)?;
        let callback_url = parse_http_url(
            "PUBLIC_BASE_URL",
            &format!(
                "{}/telegram/{}",
                public_base_url.as_str().trim_end_matches('/'),
                webhook_secret
            ),
        )?;

        let mut broadcast_targets = Vec::new();
        for item in split_list(&required("BROADCAST_CHANNELS")?) {
            broadcast_targets.push(BroadcastTarget::Channel(parse_recipient(item)?));
        }
        if broadcast_targets.is_empty() {
            return Err(ConfigError::Missing("BROADCAST_CHANNELS"));
        }
        let webhooks = split_list(&required("BROADCAST_WEBHOOK_URLS")?)
            .map(|item| parse_http_url("BROADCAST_WEBHOOK_URLS", item).map(BroadcastTarget::Webhook))
            .collect::<Result<Vec<_>, _>>()?;
        if webhooks.is_empty() {
            return Err(ConfigError::Missing("BROADCAST_WEBHOOK_URLS"));
        }
        broadcast_targets.extend(webhooks);

        let gemini_models: Vec<String> = split_list(&required("GEMINI_MODELS")?)
            .map(str::to_string)
            .collect();
        if gemini_models.is_empty() {
            return Err(ConfigError::Missing("GEMINI_MODELS"));
        }

        let interval_minutes: u64 = parse_number("BROADCAST_INTERVAL_MINUTES", &required("BROADCAST_INTERVAL_MINUTES")?)?;
        if interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                var: "BROADCAST_INTERVAL_MINUTES",
                reason: "must be greater than zero".into(),
            });
        }

        let broadcast_interval = interval_minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::Invalid {
                var: "BROADCAST_INTERVAL_MINUTES",
                reason: format!("'{}' minutes is out of range", interval_minutes),
            })?;

        let port = match get("PORT") {
            Some(v) => parse_number("PORT", &v)?,
            None => DEFAULT_PORT,
        };

        let history_limit = match get("HISTORY_LIMIT") {
            Some(v) => parse_number("HISTORY_LIMIT", &v)?,
            None => DEFAULT_HISTORY_LIMIT,
        };
        // Turns are committed in user/agent pairs, so the window holds whole exchanges.
        if history_limit < 2 || history_limit % 2 != 0 {
            return Err(ConfigError::Invalid {
                var: "HISTORY_LIMIT",
                reason: "must be an even number of at least 2".into(),
            });
        }

        let log_dir = get("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

        Ok(Self {
            telegram_bot_token,
            gemini_api_key,
            webhook_secret,
            public_base_url,
            callback_url,
            broadcast_targets,
            gemini_models,
            broadcast_interval,
            port,
            log_dir,
            history_limit,
        })
    }

    /// Route path the webhook endpoint listens on.
    pub fn callback_path(&self) -> String {
        format!("/telegram/{}", self.webhook_secret)
    }

    /// Callback URL safe for logs.
    pub fn masked_callback_url(&self) -> String {
        let mut url = self.callback_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop().push("***");
        }
        url.to_string()
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_http_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("'{}' is not a URL: {}", raw, e),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("'{}' must use http or https", raw),
        });
    }
    Ok(url)
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("'{}' is not a valid number", raw),
    })
}

/// `@username` for public channels, otherwise a numeric chat id.
fn parse_recipient(raw: &str) -> Result<Recipient, ConfigError> {
    if let Some(name) = raw.strip_prefix('@') {
        if name.is_empty() {
            return Err(ConfigError::Invalid {
                var: "BROADCAST_CHANNELS",
                reason: "empty channel username".into(),
            });
        }
        return Ok(Recipient::ChannelUsername(raw.to_string()));
    }
    raw.parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| ConfigError::Invalid {
            var: "BROADCAST_CHANNELS",
            reason: format!("'{}' is neither @username nor a numeric chat id", raw),
        })
}

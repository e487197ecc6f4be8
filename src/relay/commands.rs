/// Fixed control phrases answered without touching the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Ping,
}

impl Command {
    /// Canned reply for the command.
    pub fn reply(&self) -> &'static str {
        match self {
            Command::Start => "✅ Bot is alive. Send me a question and I will reply in English and/or 中文.",
            Command::Help => {
                "Ask me anything in English or 中文 and I'll answer in the same language.\n\
                 /start - check the bot is running\n\
                 ping - liveness check"
            }
            Command::Ping => "pong ✅",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Nothing worth answering.
    Ignore,
    Command(Command),
    /// Free text for the reply generator (already trimmed).
    Generate(String),
}

pub fn route(text: &str) -> Route {
    let text = text.trim();
    if text.is_empty() {
        return Route::Ignore;
    }

    let lowered = text.to_lowercase();
    // "/start@my_bot" is how Telegram suffixes commands aimed at one bot.
    let name = match lowered.strip_prefix('/') {
        Some(rest) => rest.split('@').next().unwrap_or(rest),
        None => "",
    };

    match (name, lowered.as_str()) {
        ("start", _) => Route::Command(Command::Start),
        ("help", _) => Route::Command(Command::Help),
        (_, "ping") => Route::Command(Command::Ping),
        _ => Route::Generate(text.to_string()),
    }
}

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

use relaycast::broadcast::{BroadcastScheduler, HttpTransport};
use relaycast::config::Config;
use relaycast::registrar::{Backoff, Registrar};
use relaycast::relay::{ChatApi, ConversationStore, GeminiClient, KnowledgeBase, RelayEngine, ReplyGenerator, TelegramClient};
use relaycast::server::{self, AppState};

/// Upper bound for one generation call, per candidate model.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(25);
/// Upper bound for one broadcast webhook POST.
const BROADCAST_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() {
    // Missing or invalid settings end the process before anything starts.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    std::fs::create_dir_all(&config.log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_dir.join("relaycast.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("❌ failed to open log file in {}: {e}", config.log_dir.display());
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting relaycast...");
    info!("Models: {:?}", config.gemini_models);
    info!("Callback: {}", config.masked_callback_url());

    let bot = Bot::new(&config.telegram_bot_token);
    let chat: Arc<dyn ChatApi> = Arc::new(TelegramClient::new(bot));

    let gemini = match GeminiClient::new(config.gemini_api_key.clone(), GENERATION_TIMEOUT) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build Gemini HTTP client: {e}");
            std::process::exit(1);
        }
    };
    let generator = ReplyGenerator::new(
        Arc::new(gemini),
        config.gemini_models.clone(),
        GENERATION_TIMEOUT,
        config.history_limit,
    );
    let engine = Arc::new(RelayEngine::new(
        chat.clone(),
        generator,
        ConversationStore::new(config.history_limit),
        KnowledgeBase::builtin(),
    ));

    // Registration runs in the background; the server starts regardless.
    let registrar = Arc::new(Registrar::new(
        chat.clone(),
        config.callback_url.clone(),
        config.masked_callback_url(),
        Backoff::default(),
    ));
    let registration = registrar.subscribe();
    {
        let registrar = registrar.clone();
        tokio::spawn(async move {
            registrar.run().await;
        });
    }

    let transport = match HttpTransport::new(chat.clone(), BROADCAST_TIMEOUT) {
        Ok(transport) => transport,
        Err(e) => {
            error!("Failed to build broadcast HTTP client: {e}");
            std::process::exit(1);
        }
    };
    let scheduler = BroadcastScheduler::new(
        Arc::new(transport),
        config.broadcast_targets.clone(),
        config.broadcast_interval,
    );
    tokio::spawn(scheduler.run());

    let app = server::router(AppState { engine, registration }, &config.callback_path());
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {bind_addr}: {e}");
            std::process::exit(1);
        }
    };
    info!("✅ Listening on {bind_addr}");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {e}");
    }
    info!("👋 Stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

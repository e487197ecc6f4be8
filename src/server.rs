//! HTTP surface: Telegram webhook plus health routes.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::debug;

use crate::registrar::RegistrationState;
use crate::relay::RelayEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RelayEngine>,
    pub registration: watch::Receiver<RegistrationState>,
}

pub fn router(state: AppState, callback_path: &str) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/debug/ping", get(ping))
        .route(callback_path, post(webhook))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let registration = state.registration.borrow().as_str();
    let conversations = state.engine.store().conversation_count().await;
    Json(json!({
        "service": "relaycast",
        "status": "ok",
        "webhook": registration,
        "conversations": conversations,
    }))
}

async fn ping() -> &'static str {
    "pong"
}

/// Always acknowledges; the update is handled on a detached task so the
/// response never waits on generation or outbound sends.
async fn webhook(State(state): State<AppState>, body: Bytes) -> StatusCode {
    match crate::relay::update::parse_update(&body, Utc::now()) {
        Ok(Some(event)) => {
            state.engine.dispatch(event);
        }
        Ok(None) => debug!("Update without a routable message, ignoring"),
        Err(e) => debug!("Malformed update ignored: {}", e),
    }
    StatusCode::OK
}

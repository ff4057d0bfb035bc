//! The HTTP surface: `GET /`, `GET /health` and `POST /v0/ask`.
//!
//! All shared state is immutable behind `Arc`s except the LLM client's
//! conversation history, which synchronises internally.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Local;
use echo::Echo;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::llm::LlmClient;
use crate::skills::HandlerRegistry;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Echo>,
    pub skills: Arc<HandlerRegistry>,
    pub llm: Arc<LlmClient>,
    pub config: Arc<AppConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/v0/ask", post(ask))
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "status": "ok", "message": "welcome" }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Local::now().to_rfc3339(),
    }))
}

fn default_user_id() -> String {
    "default".to_string()
}

fn default_device_id() -> String {
    "unknown".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_device_id")]
    pub device_id: String,
    #[serde(default = "default_lang")]
    pub lang: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub status: &'static str,
    pub intent: String,
    pub confidence: f64,
    pub response: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

async fn ask(State(state): State<AppState>, Json(request): Json<AskRequest>) -> Json<AskResponse> {
    log::info!(
        "Ask from user={} device={} lang={}: \"{}\"",
        request.user_id,
        request.device_id,
        request.lang,
        request.text
    );

    let outcome = state.engine.process(&request.text);

    let reply = state
        .skills
        .dispatch(
            &state.engine,
            &state.llm,
            &state.config,
            &outcome,
            &request.user_id,
            &request.device_id,
        )
        .await;

    log::info!(
        "Replying intent={} confidence={:.2}",
        reply.intent,
        reply.confidence
    );

    Json(AskResponse {
        status: "ok",
        intent: reply.intent,
        confidence: reply.confidence,
        response: reply.response,
        action: reply.action,
    })
}

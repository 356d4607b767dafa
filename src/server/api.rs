use crate::llm::chat::ChatClient;
use crate::models::chat::{ ChatTurn, Role };
use std::sync::Arc;
use axum::{
    body::Bytes,
    routing::{ get, post },
    Router,
    Json,
    extract::{ DefaultBodyLimit, State },
    response::IntoResponse,
    http::StatusCode,
};
use serde_json::{ json, Value as JsonValue };
use tower::ServiceBuilder;
use tower_http::cors::{ Any, CorsLayer };
use log::{ debug, error };

pub const DEFAULT_MAX_TURNS: usize = 30;
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub chat_client: Arc<dyn ChatClient>,
    pub max_turns: usize,
}

impl AppState {
    pub fn new(chat_client: Arc<dyn ChatClient>) -> Self {
        Self { chat_client, max_turns: DEFAULT_MAX_TURNS }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .layer(ServiceBuilder::new().layer(cors).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)))
        .with_state(state)
}

/// Keeps well-formed `user`/`assistant` turns from a `/chat` body, then the
/// last `max_turns` of those. A missing or non-array `messages` yields none.
pub fn select_turns(body: &JsonValue, max_turns: usize) -> Vec<ChatTurn> {
    let Some(items) = body.get("messages").and_then(JsonValue::as_array) else {
        return Vec::new();
    };

    let turns: Vec<ChatTurn> = items
        .iter()
        .filter_map(|item| {
            let role = item.get("role")?.as_str()?.parse::<Role>().ok()?;
            let content = item.get("content")?.as_str()?;
            Some(ChatTurn::new(role, content))
        })
        .collect();

    let skip = turns.len().saturating_sub(max_turns);
    turns.into_iter().skip(skip).collect()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

// The body is parsed by hand so a missing content type or an unparseable
// body ends in the same 400 as an empty `messages`.
async fn chat_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let body: JsonValue = serde_json::from_slice(&body).unwrap_or(JsonValue::Null);
    let turns = select_turns(&body, state.max_turns);
    if turns.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "messages is required" })));
    }

    debug!("Forwarding {} turns to {}", turns.len(), state.chat_client.get_model());
    match state.chat_client.complete(&turns).await {
        Ok(resp) => (StatusCode::OK, Json(json!({ "text": resp.response }))),
        Err(e) => {
            error!("Upstream completion failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "server_error" })))
        }
    }
}

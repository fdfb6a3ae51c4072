use crate::conversation::ConversationStore;
use crate::errors::ApiError;
use crate::metrics;
use crate::models::{ChatRequest, ChatResponse, ConversationTurn, LogTurnRequest};
use crate::neural::chat::ChatService;
use crate::validation::validate_input;
use axum::{
    extract::{Json, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ChatService>,
    pub conversations: Option<Arc<ConversationStore>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        // Assistant endpoints
        .route("/chat", post(chat))
        .route("/chat/log", post(log_turn))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    metrics::record_http_request(&method, &path, response.status().as_u16(), started);
    response
}

// Handler functions

async fn root_handler() -> &'static str {
    "Storefront Chat Server - Ready"
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront-chat",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn readiness_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "ready": true
    }))
}

async fn metrics_handler() -> Result<Response, ApiError> {
    let body = metrics::gather_metrics().map_err(|e| ApiError::InternalServerError {
        message: format!("Metrics encoding failed: {}", e),
    })?;
    Ok((StatusCode::OK, body).into_response())
}

/// One assistant turn: query plus client-held history in, reply plus product
/// cards out.
async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    validate_input(&payload)?;

    let response = state.chat_service.respond(payload).await?;
    Ok(Json(response))
}

/// Append a manual turn to a conversation log. Best-effort: storage trouble
/// is logged and the request is still accepted.
async fn log_turn(
    State(state): State<AppState>,
    Json(payload): Json<LogTurnRequest>,
) -> Result<StatusCode, ApiError> {
    validate_input(&payload)?;

    match &state.conversations {
        Some(store) => {
            let turn = ConversationTurn {
                role: payload.role,
                content: payload.content,
                timestamp: Some(Utc::now()),
            };
            if let Err(err) = store.append(&payload.session_id, turn).await {
                warn!("Manual log append failed for {}: {}", payload.session_id, err);
            }
        }
        None => {
            warn!("Conversation store not configured, dropping manual log turn");
        }
    }

    Ok(StatusCode::ACCEPTED)
}

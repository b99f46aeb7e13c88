//! HTTP routes.
//!
//! - `GET /` - service info
//! - `GET /health` - model load status
//! - `POST /chat` - generate a reply

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use gpt4all_local::{HealthStatus, ModelManager};

use crate::error::ApiError;
use crate::types::{round_ms, ChatRequest, ChatResponse, Endpoints, ServiceInfo, ValidatedJson};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ModelManager>,
}

impl AppState {
    pub fn new(manager: Arc<ModelManager>) -> Self {
        Self { manager }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "GPT4All Chat API",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: Endpoints {
            chat: "POST /chat",
            health: "GET /health",
        },
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(state.manager.health_check())
}

async fn chat(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let start = Instant::now();

    let response = state
        .manager
        .generate(
            &request.message,
            request.system_prompt(),
            request.max_tokens(),
            request.temperature(),
        )
        .await
        .map_err(|e| {
            error!("Error generating response: {}", e);
            ApiError::from(e)
        })?;

    let processing_time_ms = round_ms(start.elapsed().as_secs_f64() * 1000.0);
    info!(processing_time_ms, "chat completed");

    Ok(Json(ChatResponse {
        response,
        processing_time_ms,
        model_name: state.manager.model_name().to_string(),
    }))
}

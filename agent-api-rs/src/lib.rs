//! HTTP entry point for the data analyst agent.
//!
//! Thin glue over the orchestration core: validate the submitted question
//! file, admit it through a bounded worker pool, run the pipeline, and answer
//! 200 with the envelope JSON. The pipeline's own budget keeps requests well
//! inside the external 5-minute limit; an outer last-resort deadline answers
//! with the full-fallback envelope if it is ever breached.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

use analysis_pipeline::AnalysisPipeline;

pub mod config;
pub use config::RuntimeConfig;

pub mod validation;
use validation::{validate_question_payload, ErrorResponse};

/// Track process start for uptime reporting
static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Shared application state
pub struct AppState {
    pipeline: Arc<AnalysisPipeline>,
    limiter: Arc<Semaphore>,
    config: RuntimeConfig,
}

impl AppState {
    /// Wire state around a pipeline and its runtime config
    pub fn new(pipeline: Arc<AnalysisPipeline>, config: RuntimeConfig) -> Self {
        Self {
            limiter: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            pipeline,
            config,
        }
    }
}

/// GET /health response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Build the service router
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_payload_bytes;
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api", post(analyze_handler))
        .route("/api/", post(analyze_handler))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// GET / - service information
async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "Data Analyst Agent",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "api": "/api/ (POST with a questions file)"
        }
    }))
}

/// GET /health - liveness probe; no pipeline interaction
async fn health_handler() -> impl IntoResponse {
    let uptime = START_TIME.elapsed().as_secs();
    log::debug!("Health check, uptime {}s", uptime);
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// POST /api/ - run the analysis pipeline for one question file
async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> axum::response::Response {
    let started = Instant::now();

    let question = match validate_question_payload(&body, state.config.max_payload_bytes) {
        Ok(text) => text,
        Err(err) => {
            log::warn!("Rejected submission: {:?}", err);
            return err.to_response().into_response();
        }
    };

    // Bounded worker pool: wait for a slot rather than oversubscribing
    let permit = match state.limiter.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            // Semaphore is only closed during shutdown
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    error: "service is shutting down".to_string(),
                    code: 503,
                }),
            )
                .into_response();
        }
    };

    // The budget is anchored to arrival: time spent queued for a pool slot
    // is already gone from this request's deadline.
    let ctx = match state.pipeline.prepare_at(&question, started) {
        Ok(ctx) => ctx,
        Err(err) => {
            log::warn!("Classification rejected submission: {}", err);
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: err.to_string(),
                    code: 400,
                }),
            )
                .into_response();
        }
    };

    // The pipeline's own budget should always win this race; the outer
    // deadline only exists to make the 5-minute contract unconditional.
    // Measured from arrival, so queue wait counts against it too.
    let hard_cap_left = state.config.hard_cap.saturating_sub(started.elapsed());
    let envelope = tokio::select! {
        envelope = state.pipeline.run(&ctx) => envelope,
        _ = tokio::time::sleep(hard_cap_left) => {
            log::error!("[{}] hard cap reached, answering with full fallback", ctx.id);
            state.pipeline.fallback_envelope(&ctx)
        }
    };
    drop(permit);

    log::info!(
        "[{}] answered {} sub-question(s) in {:.2}s",
        ctx.id,
        envelope.len(),
        started.elapsed().as_secs_f64()
    );
    (StatusCode::OK, Json(envelope)).into_response()
}

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{ApiError, ApiResult, AppState, RequireApiKey};

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub name: String,
    #[serde(default)]
    pub ring_size: Option<i64>,
}

/// Create a topic.
pub async fn create_topic(
    _auth: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<CreateTopicRequest>,
) -> ApiResult<Response> {
    let max = state.settings.max_ring_buffer_size;
    let ring_size = match req.ring_size {
        None => None,
        Some(n) if n >= 1 && n <= max as i64 => Some(n as usize),
        Some(n) => {
            return Err(ApiError::BadRequest(format!(
                "ring_size {n} out of range 1..={max}"
            )))
        }
    };
    let resolved = state.broker.create_topic(&req.name, ring_size)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "name": req.name, "ring_size": resolved })),
    )
        .into_response())
}

/// Delete a topic, detaching and notifying its subscribers.
pub async fn delete_topic(
    _auth: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    state.broker.delete_topic(&name)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// List topics with their per-topic counters.
pub async fn list_topics(
    _auth: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Response> {
    let topics = state.broker.list_topics();
    Ok(Json(json!({ "topics": topics })).into_response())
}

/// Health probe: status, uptime, version, and coarse occupancy counts.
pub async fn health(
    _auth: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Response> {
    let status = if state.broker.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };
    let stats = state.broker.stats();
    Ok(Json(json!({
        "status": status,
        "uptime_seconds": state.broker.uptime_seconds(),
        "version": env!("CARGO_PKG_VERSION"),
        "topics": state.broker.topic_count(),
        "subscribers": stats.active_subscribers,
    }))
    .into_response())
}

/// Aggregate broker counters.
pub async fn stats(
    _auth: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Response> {
    Ok(Json(state.broker.stats()).into_response())
}

/// Trigger graceful shutdown; the drain runs on its own task.
pub async fn shutdown(
    _auth: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResult<Response> {
    if !state.lifecycle.begin() {
        return Err(ApiError::Conflict("shutdown already in progress".to_string()));
    }
    info!("graceful shutdown requested via rest");
    let lifecycle = state.lifecycle.clone();
    tokio::spawn(async move {
        lifecycle.drain_and_close().await;
    });
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "shutting_down" })),
    )
        .into_response())
}

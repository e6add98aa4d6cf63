//! The `api` module exposes the REST control surface.
//!
//! Thin axum handlers translating HTTP calls into broker operations:
//! topic create/delete/list, health, aggregate stats, and the graceful
//! shutdown trigger. Every endpoint requires the same API-key credential
//! as the WebSocket endpoint.

mod error;
mod routes;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::routing::{delete, get, post};
use axum::{Extension, Router};
use tokio::net::TcpListener;

use crate::auth;
use crate::broker::Broker;
use crate::config::BrokerSettings;
use crate::lifecycle::LifecycleController;

pub use error::{ApiError, ApiResult};

/// Shared state for all REST handlers.
pub struct AppState {
    pub broker: Arc<Broker>,
    pub lifecycle: LifecycleController,
    pub settings: BrokerSettings,
}

/// Extractor that enforces API-key admission before a handler runs.
pub struct RequireApiKey;

#[async_trait]
impl<S> FromRequestParts<S> for RequireApiKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = parts
            .extensions
            .get::<Arc<AppState>>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?;
        let key = parts
            .headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .or_else(|| {
                parts
                    .uri
                    .query()
                    .and_then(|q| auth::query_param(q, "api_key"))
            });
        if auth::key_allowed(&state.settings.api_keys, key.as_deref()) {
            Ok(RequireApiKey)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Builds the REST router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/topics/",
            get(routes::list_topics).post(routes::create_topic),
        )
        .route("/topics/:name/", delete(routes::delete_topic))
        .route("/health/", get(routes::health))
        .route("/stats/", get(routes::stats))
        .route("/shutdown/", post(routes::shutdown))
        .layer(Extension(state))
}

/// Binds and serves the REST surface until the process exits.
pub async fn serve(addr: String, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("http server listening on http://{addr}");
    axum::serve(listener, router(state)).await
}

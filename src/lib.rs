pub mod auth;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod github;
pub mod metrics;
pub mod querier;
pub mod timeline;
pub mod types;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use config::AppConfig;
use error::StatsError;
use metrics::StatsResult;
use querier::{StatsQuerier, StatsQuery};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    error: String,
}

/// Shared application state accessible to all request handlers.
pub struct AppState {
    /// Service for computing pull request statistics.
    pub querier: StatsQuerier,
    /// Application configuration loaded from environment variables.
    pub config: AppConfig,
}

impl AppState {
    /// Initializes the application state, rejecting an unusable GitHub API URL up front.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        config
            .github_api_url
            .parse::<Uri>()
            .with_context(|| format!("invalid GITHUB_API_URL '{}'", config.github_api_url))?;

        let querier = StatsQuerier::new(&config);
        Ok(Self { querier, config })
    }
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/pr-stats", get(get_pr_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "pr-stats",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn get_pr_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResult>, StatsError> {
    let request = query.validate()?;
    let credential = auth::resolve_credential(&headers, &state.config)?;

    match state.querier.get(&request, &credential).await {
        Ok(stats) => {
            tracing::debug!(repo = %request.repo, "Returning PR stats");
            Ok(Json(stats))
        }
        Err(e) => {
            tracing::error!("Failed to compute PR stats for {}: {}", request.repo, e);
            Err(e)
        }
    }
}

impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidWindow(_) | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::SourceUnavailable { .. } => StatusCode::BAD_GATEWAY,
        };
        let retry_after = self.retry_after(Utc::now());

        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response();

        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}

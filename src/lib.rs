//! SnapFeed - feed aggregation and pagination for snaps
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - Feed session endpoints                                   │
//! │  - Health and metrics                                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Session registry and pagination controller               │
//! │  - Fetch strategies, merge, termination                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Upstream Layer                            │
//! │  - Snaps feed API (HTTP)                                    │
//! │  - Hive chain node (JSON-RPC)                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers
//! - `service`: Feed sessions and pagination
//! - `upstream`: Remote data sources
//! - `data`: Feed models and the follow cache
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod upstream;

use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Live feed sessions
    pub sessions: Arc<service::SessionRegistry>,
}

impl AppState {
    /// Initialize application state against the configured upstreams
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.upstream.user_agent.clone())
            .timeout(config.upstream.timeout())
            .build()
            .map_err(|e| error::AppError::Internal(e.into()))?;

        let upstream = upstream::Upstream::http(Arc::new(http_client), &config.upstream);
        tracing::info!(
            snaps_api = %config.upstream.snaps_api_url,
            chain_api = %config.upstream.chain_api_url,
            "Upstream clients initialized"
        );

        Ok(Self::with_upstream(config, upstream))
    }

    /// Initialize application state with explicit upstreams
    pub fn with_upstream(config: config::AppConfig, upstream: upstream::Upstream) -> Self {
        let sessions =
            service::SessionRegistry::new(config.feed.clone(), &config.session, upstream);

        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::feeds_router())
        .merge(api::metrics_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

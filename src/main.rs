//! SnapFeed binary entry point

use std::time::Duration;

use snapfeed::{AppState, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application entry point
///
/// # Setup
/// 1. Initialize tracing/logging
/// 2. Initialize metrics
/// 3. Load configuration from file and environment
/// 4. Initialize AppState
/// 5. Build Axum router
/// 6. Start background tasks (idle session sweeper)
/// 7. Start HTTP server
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize tracing/logging
    let log_format =
        std::env::var("SNAPFEED__LOGGING__FORMAT").unwrap_or_else(|_| "pretty".to_string());

    if log_format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "snapfeed=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "snapfeed=info,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    tracing::info!("Starting SnapFeed...");

    // 2. Initialize metrics
    snapfeed::metrics::init_metrics();

    // 3. Load configuration
    let config = config::AppConfig::load()?;
    tracing::info!(
        container = %config.feed.container_account,
        community = %config.feed.community_tag,
        following_filter = ?config.feed.following_filter,
        "Configuration loaded"
    );

    // 4. Initialize application state
    let state = AppState::new(config.clone())?;

    // 5. Build Axum router
    let app = snapfeed::build_router(state.clone());

    // 6. Start background tasks
    spawn_session_sweeper(state.clone());

    // 7. Start HTTP server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawn background task that drops idle feed sessions
fn spawn_session_sweeper(state: AppState) {
    let configured_interval_secs = state.config.session.sweep_interval_seconds;
    if configured_interval_secs == 0 {
        tracing::warn!("session.sweep_interval_seconds=0 is invalid; clamped to 1 second");
    }

    state
        .sessions
        .clone()
        .spawn_sweeper(Duration::from_secs(configured_interval_secs.max(1)));

    tracing::info!("Session sweeper task spawned");
}

//! Feed session endpoints

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
};

use super::dto::{AdvanceResponse, FeedResponse, FilterRequest, SnapshotParams};
use crate::AppState;
use crate::data::SessionId;
use crate::error::AppError;
use crate::metrics::{HTTP_REQUEST_DURATION_SECONDS, HTTP_REQUESTS_TOTAL};
use crate::service::{AdvanceOutcome, FeedController};

/// Create feed router
pub fn feeds_router() -> Router<AppState> {
    Router::new()
        .route("/v1/feeds", post(create_feed))
        .route("/v1/feeds/:id", get(get_feed).delete(delete_feed))
        .route("/v1/feeds/:id/filter", put(set_filter))
        .route("/v1/feeds/:id/advance", post(advance_feed))
}

/// POST /api/v1/feeds
async fn create_feed(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> Result<(StatusCode, Json<AdvanceResponse>), AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/feeds"])
        .start_timer();

    let filter = req.to_filter()?;
    let (id, controller) = state.sessions.create(filter).await;
    tracing::info!(session = %id, filter = %req.filter, "Feed session opened");

    let outcome = match advance_detached(controller.clone()).await {
        Ok(outcome) => outcome,
        Err(error) => {
            state.sessions.remove(&id).await;
            return Err(error);
        }
    };
    let feed = FeedResponse::new(&id, controller.snapshot(0).await);

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/feeds", "201"])
        .inc();
    Ok((StatusCode::CREATED, Json(AdvanceResponse { outcome, feed })))
}

/// GET /api/v1/feeds/:id
async fn get_feed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SnapshotParams>,
) -> Result<Json<FeedResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["GET", "/api/v1/feeds/:id"])
        .start_timer();

    let id = SessionId::parse(&id)?;
    let controller = state.sessions.get(&id).await.ok_or(AppError::NotFound)?;
    let snapshot = controller.snapshot(params.offset.unwrap_or(0)).await;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["GET", "/api/v1/feeds/:id", "200"])
        .inc();
    Ok(Json(FeedResponse::new(&id, snapshot)))
}

/// PUT /api/v1/feeds/:id/filter
///
/// Resets the session if the filter changed, then loads the next page.
async fn set_filter(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<FilterRequest>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["PUT", "/api/v1/feeds/:id/filter"])
        .start_timer();

    let filter = req.to_filter()?;
    let id = SessionId::parse(&id)?;
    let controller = state.sessions.get(&id).await.ok_or(AppError::NotFound)?;

    if controller.configure(filter).await {
        tracing::info!(session = %id, filter = %req.filter, "Feed filter changed");
    }
    let outcome = advance_detached(controller.clone()).await?;
    let feed = FeedResponse::new(&id, controller.snapshot(0).await);

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["PUT", "/api/v1/feeds/:id/filter", "200"])
        .inc();
    Ok(Json(AdvanceResponse { outcome, feed }))
}

/// POST /api/v1/feeds/:id/advance
async fn advance_feed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SnapshotParams>,
) -> Result<Json<AdvanceResponse>, AppError> {
    let _timer = HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&["POST", "/api/v1/feeds/:id/advance"])
        .start_timer();

    let id = SessionId::parse(&id)?;
    let controller = state.sessions.get(&id).await.ok_or(AppError::NotFound)?;

    let outcome = advance_detached(controller.clone()).await?;
    let snapshot = controller.snapshot(params.offset.unwrap_or(0)).await;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["POST", "/api/v1/feeds/:id/advance", "200"])
        .inc();
    Ok(Json(AdvanceResponse {
        outcome,
        feed: FeedResponse::new(&id, snapshot),
    }))
}

/// DELETE /api/v1/feeds/:id
async fn delete_feed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let id = SessionId::parse(&id)?;
    if !state.sessions.remove(&id).await {
        return Err(AppError::NotFound);
    }

    tracing::info!(session = %id, "Feed session closed");
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["DELETE", "/api/v1/feeds/:id", "204"])
        .inc();
    Ok(StatusCode::NO_CONTENT)
}

/// Run an advance on its own task
///
/// The fetch completes and clears the in-flight flag even if the client
/// disconnects and this handler future is dropped.
async fn advance_detached(controller: Arc<FeedController>) -> Result<AdvanceOutcome, AppError> {
    tokio::spawn(async move { controller.request_advance().await })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("advance task failed: {e}")))?
}

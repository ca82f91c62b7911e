//! Feed API request and response DTOs

use serde::{Deserialize, Serialize};

use crate::data::{Cursor, FeedFilter, FeedItem, FilterMode, SessionId};
use crate::error::AppError;
use crate::service::{AdvanceOutcome, FeedSnapshot, Phase};

/// Body of `POST /api/v1/feeds` and `PUT /api/v1/feeds/:id/filter`
#[derive(Debug, Clone, Deserialize)]
pub struct FilterRequest {
    pub filter: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl FilterRequest {
    /// Parse into a normalized filter; unknown modes are rejected
    pub fn to_filter(&self) -> Result<FeedFilter, AppError> {
        let mode: FilterMode = self.filter.parse()?;
        Ok(FeedFilter::new(mode, self.username.as_deref()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotParams {
    /// Return only items from this index on
    pub offset: Option<usize>,
}

/// Feed view returned by every session endpoint
#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub id: String,
    pub filter: FilterMode,
    pub username: Option<String>,
    pub items: Vec<FeedItem>,
    pub total_items: usize,
    pub cursor: Cursor,
    pub has_more: bool,
    pub is_fetching: bool,
    pub page_counter: u64,
    pub phase: Phase,
}

impl FeedResponse {
    pub fn new(id: &SessionId, snapshot: FeedSnapshot) -> Self {
        Self {
            id: id.to_string(),
            filter: snapshot.filter,
            username: snapshot.subject,
            items: snapshot.items,
            total_items: snapshot.total_items,
            cursor: snapshot.cursor,
            has_more: snapshot.has_more,
            is_fetching: snapshot.is_fetching,
            page_counter: snapshot.page_counter,
            phase: snapshot.phase,
        }
    }
}

/// Advance outcome plus the feed view after it
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceResponse {
    #[serde(flatten)]
    pub outcome: AdvanceOutcome,
    pub feed: FeedResponse,
}

//! Snaps feed API client
//!
//! `GET {base}/feed?container=..&tag=..|following=..&start=..&limit=..`
//! returning a JSON array of snap records.

use std::sync::Arc;

use async_trait::async_trait;

use super::{PageFilter, PageQuery, SnapSource, record_call};
use crate::data::RawSnap;
use crate::error::AppError;
use crate::metrics::UPSTREAM_REQUEST_DURATION_SECONDS;

/// reqwest-backed [`SnapSource`]
#[derive(Clone)]
pub struct HttpSnapSource {
    http_client: Arc<reqwest::Client>,
    feed_url: String,
}

impl HttpSnapSource {
    pub fn new(http_client: Arc<reqwest::Client>, base_url: &str) -> Self {
        Self {
            http_client,
            feed_url: format!("{}/feed", base_url.trim_end_matches('/')),
        }
    }

    async fn get_page(&self, query: &PageQuery) -> Result<Vec<RawSnap>, AppError> {
        let mut request = self.http_client.get(&self.feed_url).query(&[
            ("container", query.container.as_str()),
            ("limit", query.limit.to_string().as_str()),
        ]);

        request = match &query.filter {
            PageFilter::Tag(tag) => request.query(&[("tag", tag)]),
            PageFilter::Following(username) => request.query(&[("following", username)]),
            PageFilter::Unfiltered => request,
        };

        if let Some(start) = query.start {
            request = request.query(&[("start", start)]);
        }

        let response = request.send().await.map_err(|e| {
            AppError::TransportFailure(format!("Failed to fetch {}: {}", self.feed_url, e))
        })?;

        if !response.status().is_success() {
            return Err(AppError::TransportFailure(format!(
                "Snaps API {} returned HTTP {}",
                self.feed_url,
                response.status()
            )));
        }

        response.json::<Vec<RawSnap>>().await.map_err(|e| {
            AppError::TransportFailure(format!("Invalid snaps API response body: {}", e))
        })
    }
}

#[async_trait]
impl SnapSource for HttpSnapSource {
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RawSnap>, AppError> {
        let timer = UPSTREAM_REQUEST_DURATION_SECONDS
            .with_label_values(&["fetch_page"])
            .start_timer();
        let result = self.get_page(query).await;
        record_call("fetch_page", timer, &result);

        if let Ok(page) = &result {
            tracing::debug!(
                container = %query.container,
                filter = ?query.filter,
                start = ?query.start,
                returned = page.len(),
                "Fetched snaps page"
            );
        }
        result
    }
}

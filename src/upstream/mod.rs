//! Upstream collaborators
//!
//! The feed core talks to two remote surfaces:
//! - The snaps API (paged following/community feeds)
//! - A Hive node (container posts, replies, follow lists)
//!
//! Both are traits so sessions can run against fakes in tests.

mod follow;
mod hive;
mod snaps_api;

use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{ContainerPost, RawSnap};
use crate::error::AppError;

pub use follow::load_follow_set;
pub use hive::HiveChainClient;
pub use snaps_api::HttpSnapSource;

/// Server-side filter for a feed page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageFilter {
    /// Only snaps carrying this tag
    Tag(String),
    /// Only snaps by accounts this user follows
    Following(String),
    /// Every snap in the container
    Unfiltered,
}

/// One request against the snaps API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub container: String,
    pub filter: PageFilter,
    /// Resume after this sequence id
    pub start: Option<u64>,
    pub limit: usize,
}

/// One request for container posts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerQuery {
    pub account: String,
    pub limit: usize,
    pub start_author: Option<String>,
    pub start_permlink: Option<String>,
}

/// Paged snap feed (following and community strategies)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapSource: Send + Sync {
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RawSnap>, AppError>;
}

/// Chain primitives used by the full-aggregate strategy and follow loading
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Container posts, newest first
    async fn list_container_posts(
        &self,
        query: &ContainerQuery,
    ) -> Result<Vec<ContainerPost>, AppError>;

    /// Direct replies to one post, in upstream order
    async fn list_replies(&self, author: &str, permlink: &str) -> Result<Vec<RawSnap>, AppError>;

    /// Accounts `username` follows, starting at `start` (inclusive)
    async fn list_following(
        &self,
        username: &str,
        start: &str,
        limit: usize,
    ) -> Result<Vec<String>, AppError>;
}

/// Handles to both upstreams, shared by every session
#[derive(Clone)]
pub struct Upstream {
    pub snaps: Arc<dyn SnapSource>,
    pub chain: Arc<dyn ChainClient>,
}

impl Upstream {
    pub fn new(snaps: Arc<dyn SnapSource>, chain: Arc<dyn ChainClient>) -> Self {
        Self { snaps, chain }
    }

    /// HTTP-backed upstreams sharing one client
    pub fn http(http_client: Arc<reqwest::Client>, config: &crate::config::UpstreamConfig) -> Self {
        Self {
            snaps: Arc::new(HttpSnapSource::new(
                http_client.clone(),
                &config.snaps_api_url,
            )),
            chain: Arc::new(HiveChainClient::new(http_client, &config.chain_api_url)),
        }
    }
}

/// Record the outcome and latency of one upstream call
pub(crate) fn record_call<T>(
    call: &str,
    timer: prometheus::HistogramTimer,
    result: &Result<T, AppError>,
) {
    use crate::metrics::UPSTREAM_REQUESTS_TOTAL;

    timer.observe_duration();
    let status = if result.is_ok() { "ok" } else { "error" };
    UPSTREAM_REQUESTS_TOTAL
        .with_label_values(&[call, status])
        .inc();
}

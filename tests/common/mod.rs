//! Common test utilities for E2E tests
//!
//! `TestServer` runs the real router on a random port against in-memory
//! upstreams, so tests drive the HTTP surface without network access.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use snapfeed::data::{ContainerPost, RawSnap};
use snapfeed::error::AppError;
use snapfeed::upstream::{ChainClient, ContainerQuery, PageFilter, PageQuery, SnapSource, Upstream};
use snapfeed::{AppState, config};
use tokio::net::TcpListener;

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub client: reqwest::Client,
    pub snaps: Arc<FakeSnaps>,
    pub chain: Arc<FakeChain>,
}

impl TestServer {
    /// Server over the default fixture with throttling disabled
    pub async fn new() -> Self {
        Self::with_fixture(test_config(), FakeSnaps::fixture(), FakeChain::fixture()).await
    }

    pub async fn with_config(config: config::AppConfig) -> Self {
        Self::with_fixture(config, FakeSnaps::fixture(), FakeChain::fixture()).await
    }

    pub async fn with_fixture(
        config: config::AppConfig,
        snaps: FakeSnaps,
        chain: FakeChain,
    ) -> Self {
        snapfeed::metrics::init_metrics();

        let snaps = Arc::new(snaps);
        let chain = Arc::new(chain);
        let upstream = Upstream::new(snaps.clone(), chain.clone());
        let state = AppState::with_upstream(config, upstream);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = snapfeed::build_router(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
            client,
            snaps,
            chain,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Open a session and return the response body
    pub async fn open_feed(&self, filter: &str, username: Option<&str>) -> serde_json::Value {
        let response = self
            .client
            .post(self.url("/api/v1/feeds"))
            .json(&serde_json::json!({ "filter": filter, "username": username }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        response.json().await.unwrap()
    }

    pub async fn advance(&self, id: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/v1/feeds/{id}/advance")))
            .send()
            .await
            .unwrap()
    }
}

/// Configuration used by every test server
pub fn test_config() -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        upstream: config::UpstreamConfig {
            snaps_api_url: "http://snaps.invalid/api".to_string(),
            chain_api_url: "http://rpc.invalid".to_string(),
            timeout_seconds: 5,
            user_agent: "SnapFeed/test".to_string(),
        },
        feed: config::FeedConfig {
            container_account: "peak.snaps".to_string(),
            community_tag: "hive-163772".to_string(),
            page_size: 10,
            container_page_size: 2,
            following_page_size: 100,
            following_filter: config::FollowingFilter::Server,
            advance_interval_ms: 0,
        },
        session: config::SessionConfig {
            idle_ttl_seconds: 1800,
            max_sessions: 100,
            sweep_interval_seconds: 60,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

pub fn snap(author: &str, permlink: &str, id: Option<u64>, tags: &[&str]) -> RawSnap {
    RawSnap {
        id,
        author: author.to_string(),
        permlink: permlink.to_string(),
        body: format!("{permlink} by {author}"),
        created: Some("2024-01-01T00:00:00".to_string()),
        json_metadata: serde_json::json!({ "tags": tags }),
    }
}

// =============================================================================
// Fake snaps API
// =============================================================================

/// In-memory snaps feed
///
/// Records are kept in feed order; `start` resumes after the record with
/// that sequence id.
pub struct FakeSnaps {
    records: Mutex<Vec<RawSnap>>,
    follows: HashMap<String, Vec<String>>,
    failures: AtomicUsize,
    pub calls: AtomicUsize,
}

impl FakeSnaps {
    pub fn new(records: Vec<RawSnap>, follows: HashMap<String, Vec<String>>) -> Self {
        Self {
            records: Mutex::new(records),
            follows,
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// 25 snaps: alice follows bob and carol; every third snap is
    /// tagged with the community.
    pub fn fixture() -> Self {
        let authors = ["bob", "carol", "dave"];
        let records = (1..=25u64)
            .map(|id| {
                let author = authors[(id as usize - 1) % authors.len()];
                let tags: &[&str] = if id % 3 == 0 {
                    &["hive-163772", "snaps"]
                } else {
                    &["snaps"]
                };
                snap(author, &format!("snap-{id}"), Some(id), tags)
            })
            .collect();
        let follows = HashMap::from([(
            "alice".to_string(),
            vec!["bob".to_string(), "carol".to_string()],
        )]);
        Self::new(records, follows)
    }

    /// Fail the next `count` calls with a transport error
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn push(&self, record: RawSnap) {
        self.records.lock().unwrap().push(record);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapSource for FakeSnaps {
    async fn fetch_page(&self, query: &PageQuery) -> Result<Vec<RawSnap>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(AppError::TransportFailure("HTTP 503".to_string()));
        }

        let records = self.records.lock().unwrap();
        let offset = match query.start {
            None => 0,
            Some(start) => records
                .iter()
                .position(|r| r.id == Some(start))
                .map_or(records.len(), |i| i + 1),
        };

        let matches = |record: &RawSnap| match &query.filter {
            PageFilter::Unfiltered => true,
            PageFilter::Tag(tag) => record.json_metadata["tags"]
                .as_array()
                .is_some_and(|tags| tags.iter().any(|t| t == tag.as_str())),
            PageFilter::Following(username) => self
                .follows
                .get(username)
                .is_some_and(|follows| follows.contains(&record.author)),
        };

        Ok(records[offset..]
            .iter()
            .filter(|record| matches(*record))
            .take(query.limit)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Fake chain node
// =============================================================================

/// In-memory chain node
///
/// Container paging and follow paging both treat `start` as inclusive.
pub struct FakeChain {
    containers: Vec<ContainerPost>,
    replies: HashMap<String, Vec<RawSnap>>,
    following: HashMap<String, Vec<String>>,
    pub reply_calls: AtomicUsize,
    pub following_calls: AtomicUsize,
}

impl FakeChain {
    pub fn new(
        containers: Vec<ContainerPost>,
        replies: HashMap<String, Vec<RawSnap>>,
        following: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            containers,
            replies,
            following,
            reply_calls: AtomicUsize::new(0),
            following_calls: AtomicUsize::new(0),
        }
    }

    /// Three containers (newest first) with two replies each; alice
    /// follows bob and carol.
    pub fn fixture() -> Self {
        let containers: Vec<_> = (1..=3)
            .rev()
            .map(|n| ContainerPost {
                author: "peak.snaps".to_string(),
                permlink: format!("container-{n}"),
                created: None,
            })
            .collect();
        let replies = containers
            .iter()
            .map(|post| {
                let replies = ["bob", "dave"]
                    .iter()
                    .map(|author| snap(author, &format!("re-{}", post.permlink), None, &["snaps"]))
                    .collect();
                (post.permlink.clone(), replies)
            })
            .collect();
        let following = HashMap::from([(
            "alice".to_string(),
            vec!["bob".to_string(), "carol".to_string()],
        )]);
        Self::new(containers, replies, following)
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn list_container_posts(
        &self,
        query: &ContainerQuery,
    ) -> Result<Vec<ContainerPost>, AppError> {
        let offset = match &query.start_permlink {
            None => 0,
            Some(permlink) => self
                .containers
                .iter()
                .position(|post| &post.permlink == permlink)
                .unwrap_or(self.containers.len()),
        };
        Ok(self.containers[offset..]
            .iter()
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn list_replies(&self, _author: &str, permlink: &str) -> Result<Vec<RawSnap>, AppError> {
        self.reply_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.replies.get(permlink).cloned().unwrap_or_default())
    }

    async fn list_following(
        &self,
        username: &str,
        start: &str,
        limit: usize,
    ) -> Result<Vec<String>, AppError> {
        self.following_calls.fetch_add(1, Ordering::SeqCst);
        let mut follows = self.following.get(username).cloned().unwrap_or_default();
        follows.sort();
        Ok(follows
            .into_iter()
            .filter(|name| name.as_str() >= start)
            .take(limit)
            .collect())
    }
}

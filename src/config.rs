//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub feed: FeedConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
}

/// Upstream endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the snaps feed API (following and community feeds)
    pub snaps_api_url: String,
    /// Hive JSON-RPC node used for container posts, replies and follows
    pub chain_api_url: String,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Where the following feed applies the follow relation
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FollowingFilter {
    /// The snaps API filters by username
    #[default]
    Server,
    /// Fetch unfiltered pages and intersect with the cached follow set
    Client,
}

/// Feed aggregation settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Account whose posts act as snap containers
    pub container_account: String,
    /// Community tag used by the community feed
    pub community_tag: String,
    /// Items per following/community page
    pub page_size: usize,
    /// Containers per full-aggregate page
    pub container_page_size: usize,
    /// Page size used while loading a follow set
    pub following_page_size: usize,
    #[serde(default)]
    pub following_filter: FollowingFilter,
    /// Minimum interval between accepted advance requests
    pub advance_interval_ms: u64,
}

impl FeedConfig {
    pub fn advance_interval(&self) -> Duration {
        Duration::from_millis(self.advance_interval_ms)
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Sessions untouched for this long are dropped
    pub idle_ttl_seconds: u64,
    /// Upper bound on live sessions
    pub max_sessions: usize,
    /// How often the idle sweeper runs
    pub sweep_interval_seconds: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SNAPFEED__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("upstream.snaps_api_url", "https://snaps.peakd.com/api")?
            .set_default("upstream.chain_api_url", "https://api.hive.blog")?
            .set_default("upstream.timeout_seconds", 30)?
            .set_default("upstream.user_agent", "SnapFeed/0.1.0")?
            .set_default("feed.container_account", "peak.snaps")?
            .set_default("feed.community_tag", "hive-163772")?
            .set_default("feed.page_size", 10)?
            .set_default("feed.container_page_size", 2)?
            .set_default("feed.following_page_size", 100)?
            .set_default("feed.following_filter", "server")?
            .set_default("feed.advance_interval_ms", 1000)?
            .set_default("session.idle_ttl_seconds", 1800)?
            .set_default("session.max_sessions", 1000)?
            .set_default("session.sweep_interval_seconds", 60)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("SNAPFEED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub(crate) fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        for (name, value) in [
            ("upstream.snaps_api_url", &self.upstream.snaps_api_url),
            ("upstream.chain_api_url", &self.upstream.chain_api_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{name} is not a valid URL: {e}")))?;
        }

        for (name, value) in [
            ("feed.page_size", self.feed.page_size),
            ("feed.container_page_size", self.feed.container_page_size),
            ("feed.following_page_size", self.feed.following_page_size),
            ("session.max_sessions", self.session.max_sessions),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{name} must be greater than 0")));
            }
        }

        // reqwest treats a zero timeout as already elapsed
        if self.upstream.timeout_seconds == 0 {
            return Err(AppError::Config(
                "upstream.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.feed.container_account.trim().is_empty() {
            return Err(AppError::Config(
                "feed.container_account must not be empty".to_string(),
            ));
        }

        if self.feed.community_tag.trim().is_empty() {
            return Err(AppError::Config(
                "feed.community_tag must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapfeed_http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).expect("metric can be created");
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "snapfeed_http_request_duration_seconds",
            "HTTP request duration in seconds"
        ).buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        &["method", "endpoint"]
    ).expect("metric can be created");

    // Upstream Metrics
    pub static ref UPSTREAM_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapfeed_upstream_requests_total", "Total number of upstream calls"),
        &["call", "status"]
    ).expect("metric can be created");
    pub static ref UPSTREAM_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "snapfeed_upstream_request_duration_seconds",
            "Upstream call duration in seconds"
        ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["call"]
    ).expect("metric can be created");

    // Feed Metrics
    pub static ref FEED_ADVANCES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapfeed_feed_advances_total", "Advance requests by outcome"),
        &["mode", "outcome"]
    ).expect("metric can be created");
    pub static ref FEED_ITEMS_MERGED_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapfeed_feed_items_merged_total", "Feed items appended after dedup"),
        &["mode"]
    ).expect("metric can be created");
    pub static ref MALFORMED_RECORDS_TOTAL: IntCounter = IntCounter::new(
        "snapfeed_malformed_records_total",
        "Feed records dropped because their metadata could not be decoded"
    ).expect("metric can be created");
    pub static ref ACTIVE_SESSIONS: IntGauge = IntGauge::new(
        "snapfeed_active_sessions",
        "Current number of live feed sessions"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("snapfeed_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: std::sync::Once = std::sync::Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(register_all);
}

fn register_all() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("HTTP_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("HTTP_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(UPSTREAM_REQUESTS_TOTAL.clone()))
        .expect("UPSTREAM_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(UPSTREAM_REQUEST_DURATION_SECONDS.clone()))
        .expect("UPSTREAM_REQUEST_DURATION_SECONDS can be registered");
    REGISTRY
        .register(Box::new(FEED_ADVANCES_TOTAL.clone()))
        .expect("FEED_ADVANCES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(FEED_ITEMS_MERGED_TOTAL.clone()))
        .expect("FEED_ITEMS_MERGED_TOTAL can be registered");
    REGISTRY
        .register(Box::new(MALFORMED_RECORDS_TOTAL.clone()))
        .expect("MALFORMED_RECORDS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ACTIVE_SESSIONS.clone()))
        .expect("ACTIVE_SESSIONS can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}

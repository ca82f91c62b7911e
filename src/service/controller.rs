//! Pagination controller
//!
//! Owns one session's state and drives it through
//! `Idle -> Fetching -> Idle | Exhausted`.
//!
//! # Guards on `request_advance`
//! 1. A fetch already in flight: the request is dropped (`Busy`)
//! 2. `has_more == false`: no-op (`Exhausted`)
//! 3. Previous accepted request less than `advance_interval` ago: `Throttled`
//!
//! The state lock is never held across a remote call. A reset while a
//! fetch is in flight bumps the session generation and the stale result
//! is thrown away when it lands.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::merge::{SeenSet, merge};
use super::strategy::{FetchInput, Strategy, StrategyOutcome, select};
use crate::config::{FeedConfig, FollowingFilter};
use crate::data::{Cursor, FeedFilter, FeedItem, FollowCache};
use crate::error::AppError;
use crate::metrics::{FEED_ADVANCES_TOTAL, FEED_ITEMS_MERGED_TOTAL};
use crate::upstream::{Upstream, load_follow_set};

/// Externally visible controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Fetching,
    Exhausted,
}

/// What happened to one advance request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum AdvanceOutcome {
    /// A page was fetched and merged
    Fetched { appended: usize, has_more: bool },
    /// Dropped: another fetch is in flight
    Busy,
    /// Rejected by the minimum-interval guard
    Throttled,
    /// No-op: the feed has no more pages
    Exhausted,
    /// The strategy could not fetch yet; nothing changed
    Skipped,
    /// The filter changed while fetching; the result was discarded
    Superseded,
}

impl AdvanceOutcome {
    fn label(&self) -> &'static str {
        match self {
            AdvanceOutcome::Fetched { .. } => "fetched",
            AdvanceOutcome::Busy => "busy",
            AdvanceOutcome::Throttled => "throttled",
            AdvanceOutcome::Exhausted => "exhausted",
            AdvanceOutcome::Skipped => "skipped",
            AdvanceOutcome::Superseded => "superseded",
        }
    }
}

/// Read-only copy of the session state
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub filter: crate::data::FilterMode,
    pub subject: Option<String>,
    pub items: Vec<FeedItem>,
    /// Total items accumulated, regardless of the snapshot offset
    pub total_items: usize,
    pub cursor: Cursor,
    pub has_more: bool,
    pub is_fetching: bool,
    pub page_counter: u64,
    pub phase: Phase,
}

/// Mutable per-session state
#[derive(Debug)]
struct SessionState {
    filter: FeedFilter,
    strategy: Strategy,
    cursor: Cursor,
    seen: SeenSet,
    feed: Vec<FeedItem>,
    follow_cache: FollowCache,
    has_more: bool,
    is_fetching: bool,
    last_advance_at: Option<Instant>,
    page_counter: u64,
    /// Bumped on every reset
    generation: u64,
}

impl SessionState {
    fn new(filter: FeedFilter) -> Self {
        Self {
            strategy: select(filter.mode),
            filter,
            cursor: Cursor::Start,
            seen: SeenSet::new(),
            feed: Vec::new(),
            follow_cache: FollowCache::new(),
            has_more: true,
            is_fetching: false,
            last_advance_at: None,
            page_counter: 0,
            generation: 0,
        }
    }

    /// Start over under `filter`
    ///
    /// `is_fetching` survives: an in-flight fetch still owns the flag
    /// until it drains.
    fn reset(&mut self, filter: FeedFilter) {
        self.follow_cache.retain_subject(filter.subject.as_deref());
        self.strategy = select(filter.mode);
        self.filter = filter;
        self.cursor = Cursor::Start;
        self.seen = SeenSet::new();
        self.feed.clear();
        self.has_more = true;
        self.last_advance_at = None;
        self.page_counter = 0;
        self.generation += 1;
    }

    fn phase(&self) -> Phase {
        if self.is_fetching {
            Phase::Fetching
        } else if !self.has_more {
            Phase::Exhausted
        } else {
            Phase::Idle
        }
    }
}

/// Work captured when an advance is accepted
struct FetchPlan {
    generation: u64,
    strategy: Strategy,
    input: FetchInput,
    needs_follow_set: bool,
}

/// Public state machine for one feed session
pub struct FeedController {
    settings: FeedConfig,
    upstream: Upstream,
    state: Mutex<SessionState>,
}

impl FeedController {
    pub fn new(settings: FeedConfig, upstream: Upstream, filter: FeedFilter) -> Self {
        Self {
            settings,
            upstream,
            state: Mutex::new(SessionState::new(filter)),
        }
    }

    /// Select a filter
    ///
    /// Resets the session when the mode or subject differs from the
    /// current one. Returns true if a reset happened.
    pub async fn configure(&self, filter: FeedFilter) -> bool {
        let mut state = self.state.lock().await;
        if state.filter == filter {
            return false;
        }

        tracing::info!(
            from = %state.filter.mode,
            to = %filter.mode,
            subject = ?filter.subject,
            in_flight = state.is_fetching,
            "Resetting feed session"
        );
        state.reset(filter);
        true
    }

    /// Fetch the next page if the guards allow it
    ///
    /// On error the session is left as it was before the attempt, apart
    /// from `is_fetching` returning to false, so the same page can be
    /// retried.
    pub async fn request_advance(&self) -> Result<AdvanceOutcome, AppError> {
        let plan = {
            let mut state = self.state.lock().await;
            let mode = state.filter.mode;

            let rejected = if state.is_fetching {
                Some(AdvanceOutcome::Busy)
            } else if !state.has_more {
                Some(AdvanceOutcome::Exhausted)
            } else if state
                .last_advance_at
                .is_some_and(|last| last.elapsed() < self.settings.advance_interval())
            {
                Some(AdvanceOutcome::Throttled)
            } else {
                None
            };

            if let Some(outcome) = rejected {
                tracing::trace!(mode = %mode, outcome = outcome.label(), "Advance not accepted");
                return Ok(record(mode.as_str(), outcome));
            }

            state.last_advance_at = Some(Instant::now());
            state.is_fetching = true;

            let subject = state.filter.subject.clone();
            let follow_set = subject
                .as_deref()
                .and_then(|subject| state.follow_cache.get(subject));
            let needs_follow_set = state.strategy == Strategy::Following
                && self.settings.following_filter == FollowingFilter::Client
                && subject.is_some()
                && follow_set.is_none();

            FetchPlan {
                generation: state.generation,
                strategy: state.strategy,
                input: FetchInput {
                    cursor: state.cursor.clone(),
                    subject,
                    follow_set,
                },
                needs_follow_set,
            }
        };

        let result = self
            .run(
                plan.strategy,
                plan.input,
                plan.needs_follow_set,
                plan.generation,
            )
            .await;

        let mut state = self.state.lock().await;
        state.is_fetching = false;
        let mode = state.filter.mode.as_str();

        if state.generation != plan.generation {
            tracing::debug!(mode = %mode, "Discarding fetch started before a reset");
            return Ok(record(mode, AdvanceOutcome::Superseded));
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::warn!(mode = %mode, %error, "Advance failed; session left unchanged");
                FEED_ADVANCES_TOTAL.with_label_values(&[mode, "failed"]).inc();
                return Err(error);
            }
        };

        let page = match outcome {
            StrategyOutcome::Page(page) => page,
            StrategyOutcome::Skipped { reason } => {
                tracing::debug!(mode = %mode, reason, "Strategy skipped the fetch");
                return Ok(record(mode, AdvanceOutcome::Skipped));
            }
        };

        if let Some(cursor) = page.next_cursor {
            state.cursor = cursor;
        }

        let state = &mut *state;
        let report = merge(&mut state.feed, page.items, &mut state.seen);
        if plan
            .strategy
            .termination_policy()
            .is_exhausted(page.raw_len, page.requested)
        {
            state.has_more = false;
        }
        state.page_counter += 1;

        FEED_ITEMS_MERGED_TOTAL
            .with_label_values(&[mode])
            .inc_by(report.appended as u64);
        tracing::debug!(
            mode = %mode,
            strategy = plan.strategy.name(),
            page = state.page_counter,
            raw = page.raw_len,
            appended = report.appended,
            duplicates = report.duplicates,
            total = state.feed.len(),
            has_more = state.has_more,
            "Page merged"
        );

        Ok(record(
            mode,
            AdvanceOutcome::Fetched {
                appended: report.appended,
                has_more: state.has_more,
            },
        ))
    }

    /// Load the follow set if needed, then run the strategy
    async fn run(
        &self,
        strategy: Strategy,
        mut input: FetchInput,
        needs_follow_set: bool,
        generation: u64,
    ) -> Result<StrategyOutcome, AppError> {
        if needs_follow_set {
            if let Some(subject) = input.subject.clone() {
                let follows = load_follow_set(
                    self.upstream.chain.as_ref(),
                    &subject,
                    self.settings.following_page_size,
                )
                .await?;

                let mut state = self.state.lock().await;
                if state.generation == generation {
                    state.follow_cache.insert(&subject, follows);
                    input.follow_set = state.follow_cache.get(&subject);
                } else {
                    input.follow_set = Some(Arc::new(follows));
                }
            }
        }

        strategy.fetch(&self.settings, &self.upstream, &input).await
    }

    /// Copy of the session state, with items starting at `offset`
    pub async fn snapshot(&self, offset: usize) -> FeedSnapshot {
        let state = self.state.lock().await;
        let start = offset.min(state.feed.len());

        FeedSnapshot {
            filter: state.filter.mode,
            subject: state.filter.subject.clone(),
            items: state.feed[start..].to_vec(),
            total_items: state.feed.len(),
            cursor: state.cursor.clone(),
            has_more: state.has_more,
            is_fetching: state.is_fetching,
            page_counter: state.page_counter,
            phase: state.phase(),
        }
    }

    /// Whether a follow set is cached for the current subject
    pub async fn has_follow_cache(&self) -> bool {
        self.state.lock().await.follow_cache.is_loaded()
    }
}

fn record(mode: &str, outcome: AdvanceOutcome) -> AdvanceOutcome {
    FEED_ADVANCES_TOTAL
        .with_label_values(&[mode, outcome.label()])
        .inc();
    outcome
}

//! Fetch strategies
//!
//! One strategy per filter mode. Strategies only fetch and decode: they
//! return a page and a proposed cursor, and the controller applies merge,
//! cursor and termination updates.

mod aggregate;
mod community;
mod following;

use std::collections::HashSet;
use std::sync::Arc;

use super::termination::TerminationPolicy;
use crate::config::FeedConfig;
use crate::data::{Cursor, FeedItem, FilterMode, RawSnap};
use crate::error::AppError;
use crate::upstream::Upstream;

/// The three mutually exclusive fetch strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Following,
    Community,
    FullAggregate,
}

/// Map a filter mode to its strategy
pub fn select(mode: FilterMode) -> Strategy {
    match mode {
        FilterMode::Following => Strategy::Following,
        FilterMode::Community => Strategy::Community,
        FilterMode::All => Strategy::FullAggregate,
    }
}

impl Strategy {
    /// Fixed per strategy for the lifetime of a session
    pub fn termination_policy(&self) -> TerminationPolicy {
        match self {
            Strategy::Following => TerminationPolicy::ShortPage,
            Strategy::Community => TerminationPolicy::EmptyPage,
            Strategy::FullAggregate => TerminationPolicy::EmptyPage,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Following => "following",
            Strategy::Community => "community",
            Strategy::FullAggregate => "full_aggregate",
        }
    }

    /// Run one fetch
    ///
    /// Any upstream failure fails the whole page; nothing is returned
    /// for partial results.
    pub async fn fetch(
        &self,
        settings: &FeedConfig,
        upstream: &Upstream,
        input: &FetchInput,
    ) -> Result<StrategyOutcome, AppError> {
        match self {
            Strategy::Following => following::fetch(settings, upstream.snaps.as_ref(), input).await,
            Strategy::Community => community::fetch(settings, upstream.snaps.as_ref(), input).await,
            Strategy::FullAggregate => {
                aggregate::fetch(settings, upstream.chain.as_ref(), input).await
            }
        }
    }
}

/// Session values a strategy reads
#[derive(Debug, Clone, Default)]
pub struct FetchInput {
    pub cursor: Cursor,
    pub subject: Option<String>,
    /// Loaded follow set for `subject`, if any
    pub follow_set: Option<Arc<HashSet<String>>>,
}

/// Result of one strategy run
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    /// A page was fetched (possibly empty)
    Page(FetchedPage),
    /// Nothing could be fetched yet; cursor and termination stay untouched
    Skipped { reason: &'static str },
}

/// One fetched page, decoded but not yet merged
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub items: Vec<FeedItem>,
    /// Size of the raw upstream page, before decoding, filtering and dedup
    pub raw_len: usize,
    /// Page size that was asked for
    pub requested: usize,
    /// Cursor to store; `None` keeps the current one
    pub next_cursor: Option<Cursor>,
}

impl FetchedPage {
    pub fn empty(requested: usize) -> Self {
        Self {
            items: Vec::new(),
            raw_len: 0,
            requested,
            next_cursor: None,
        }
    }
}

/// Decode raw records, dropping the ones with unreadable metadata
pub(crate) fn decode_batch(raws: impl IntoIterator<Item = RawSnap>) -> Vec<FeedItem> {
    use crate::metrics::MALFORMED_RECORDS_TOTAL;

    raws.into_iter()
        .filter_map(|raw| match FeedItem::try_from(raw) {
            Ok(item) => Some(item),
            Err(error) => {
                MALFORMED_RECORDS_TOTAL.inc();
                tracing::warn!(%error, "Dropping malformed feed record");
                None
            }
        })
        .collect()
}

/// Resume point for the numeric-cursor strategies
pub(crate) fn numeric_start(cursor: &Cursor) -> Result<Option<u64>, AppError> {
    match cursor {
        Cursor::Start => Ok(None),
        Cursor::Numeric { last_sequence_id } => Ok(Some(*last_sequence_id)),
        Cursor::Container { .. } => Err(AppError::InvalidConfiguration(
            "container cursor handed to a numeric-cursor strategy".to_string(),
        )),
    }
}

/// Cursor after a numeric page: the last raw record carrying a sequence id
pub(crate) fn numeric_cursor_after(raws: &[RawSnap]) -> Option<Cursor> {
    raws.iter()
        .rev()
        .find_map(|raw| raw.id)
        .map(|last_sequence_id| Cursor::Numeric { last_sequence_id })
}

//! Merge & dedup
//!
//! Folds a fetched batch into the accumulated feed, keyed on the item's
//! permanent link.

use std::collections::HashSet;

use crate::data::FeedItem;

/// Identifiers already delivered in the current session
///
/// Append-only until the session resets.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    identifiers: HashSet<String>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.identifiers.contains(identifier)
    }

    /// Returns false if the identifier was already present
    pub fn insert(&mut self, identifier: &str) -> bool {
        if self.identifiers.contains(identifier) {
            return false;
        }
        self.identifiers.insert(identifier.to_string())
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// What a merge did to the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    pub appended: usize,
    pub duplicates: usize,
}

/// Append every unseen item of `batch` to `accumulated`, in batch order
///
/// Items whose identifier is already in `seen` (from earlier pages or
/// earlier in the same batch) are dropped. Existing items never move.
pub fn merge(
    accumulated: &mut Vec<FeedItem>,
    batch: Vec<FeedItem>,
    seen: &mut SeenSet,
) -> MergeReport {
    let mut report = MergeReport::default();
    accumulated.reserve(batch.len());

    for item in batch {
        if seen.insert(&item.identifier) {
            accumulated.push(item);
            report.appended += 1;
        } else {
            report.duplicates += 1;
        }
    }

    report
}

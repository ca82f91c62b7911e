//! In-memory caches
//!
//! These caches are volatile and scoped to a single feed session.

use std::collections::HashSet;
use std::sync::Arc;

// =============================================================================
// Follow Cache
// =============================================================================

/// Accounts a subject follows
///
/// Keyed by subject username: a lookup for a different subject misses,
/// and rebinding to a new subject drops the loaded set.
#[derive(Debug, Clone, Default)]
pub struct FollowCache {
    subject: Option<String>,
    authors: Option<Arc<HashSet<String>>>,
}

impl FollowCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow set for `subject`, if it has been loaded
    pub fn get(&self, subject: &str) -> Option<Arc<HashSet<String>>> {
        match &self.subject {
            Some(cached) if cached == subject => self.authors.clone(),
            _ => None,
        }
    }

    /// Store a fully loaded follow set for `subject`
    pub fn insert(&mut self, subject: &str, authors: HashSet<String>) {
        self.subject = Some(subject.to_string());
        self.authors = Some(Arc::new(authors));
    }

    /// Keep the cache only if it belongs to `subject`
    ///
    /// Returns true if a loaded set was dropped.
    pub fn retain_subject(&mut self, subject: Option<&str>) -> bool {
        if self.subject.as_deref() == subject {
            return false;
        }
        let dropped = self.authors.is_some();
        self.clear();
        dropped
    }

    pub fn clear(&mut self) {
        self.subject = None;
        self.authors = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.authors.is_some()
    }
}

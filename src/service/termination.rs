//! Termination policy
//!
//! The upstreams disagree on how the last page looks, so each strategy
//! is bound to exactly one inference rule.

/// How a strategy infers that no further pages exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Exhausted once a raw page comes back empty
    EmptyPage,
    /// Exhausted once a raw page is shorter than requested
    ShortPage,
}

impl TerminationPolicy {
    /// `raw_len` counts the page before dedup and before any local filtering
    pub fn is_exhausted(&self, raw_len: usize, requested: usize) -> bool {
        match self {
            TerminationPolicy::EmptyPage => raw_len == 0,
            TerminationPolicy::ShortPage => raw_len < requested,
        }
    }
}

//! Data layer module
//!
//! Feed records and volatile per-session caches:
//! - Wire records from the upstreams
//! - Decoded feed items, cursors and filters
//! - Follow cache

mod cache;
mod models;

pub use cache::FollowCache;
pub use models::*;

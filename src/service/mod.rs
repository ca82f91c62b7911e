//! Service layer
//!
//! Feed pagination logic separated from HTTP handlers.
//! Controllers orchestrate strategies, merging, and termination.

mod controller;
mod merge;
mod registry;
pub mod strategy;
mod termination;

pub use controller::{AdvanceOutcome, FeedController, FeedSnapshot, Phase};
pub use merge::{MergeReport, SeenSet, merge};
pub use registry::SessionRegistry;
pub use termination::TerminationPolicy;

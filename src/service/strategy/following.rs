//! Following-feed strategy
//!
//! Two variants, picked by `feed.following_filter`:
//! the snaps API filters by username, or an unfiltered page is intersected
//! with the subject's cached follow set.

use super::{
    FetchInput, FetchedPage, StrategyOutcome, decode_batch, numeric_cursor_after, numeric_start,
};
use crate::config::{FeedConfig, FollowingFilter};
use crate::error::AppError;
use crate::upstream::{PageFilter, PageQuery, SnapSource};

pub(super) async fn fetch(
    settings: &FeedConfig,
    snaps: &dyn SnapSource,
    input: &FetchInput,
) -> Result<StrategyOutcome, AppError> {
    let Some(subject) = input.subject.as_deref() else {
        tracing::debug!("Following feed without a subject; returning an empty page");
        return Ok(StrategyOutcome::Page(FetchedPage::empty(settings.page_size)));
    };

    let follow_set = match settings.following_filter {
        FollowingFilter::Server => None,
        FollowingFilter::Client => match &input.follow_set {
            Some(set) => Some(set.clone()),
            None => {
                return Ok(StrategyOutcome::Skipped {
                    reason: "follow set not loaded",
                });
            }
        },
    };

    let query = PageQuery {
        container: settings.container_account.clone(),
        filter: match follow_set {
            Some(_) => PageFilter::Unfiltered,
            None => PageFilter::Following(subject.to_string()),
        },
        start: numeric_start(&input.cursor)?,
        limit: settings.page_size,
    };

    let raws = snaps.fetch_page(&query).await?;
    let raw_len = raws.len();
    let next_cursor = numeric_cursor_after(&raws);

    let mut items = decode_batch(raws);
    if let Some(follows) = follow_set {
        items.retain(|item| follows.contains(&item.author_id));
    }

    tracing::debug!(
        subject = %subject,
        raw = raw_len,
        kept = items.len(),
        "Following page fetched"
    );

    Ok(StrategyOutcome::Page(FetchedPage {
        items,
        raw_len,
        requested: settings.page_size,
        next_cursor,
    }))
}

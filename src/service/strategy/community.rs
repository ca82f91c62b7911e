//! Community-feed strategy

use super::{
    FetchInput, FetchedPage, StrategyOutcome, decode_batch, numeric_cursor_after, numeric_start,
};
use crate::config::FeedConfig;
use crate::error::AppError;
use crate::upstream::{PageFilter, PageQuery, SnapSource};

pub(super) async fn fetch(
    settings: &FeedConfig,
    snaps: &dyn SnapSource,
    input: &FetchInput,
) -> Result<StrategyOutcome, AppError> {
    let query = PageQuery {
        container: settings.container_account.clone(),
        filter: PageFilter::Tag(settings.community_tag.clone()),
        start: numeric_start(&input.cursor)?,
        limit: settings.page_size,
    };

    let raws = snaps.fetch_page(&query).await?;
    let raw_len = raws.len();
    let next_cursor = numeric_cursor_after(&raws);
    let items = decode_batch(raws);

    tracing::debug!(
        tag = %settings.community_tag,
        raw = raw_len,
        kept = items.len(),
        "Community page fetched"
    );

    Ok(StrategyOutcome::Page(FetchedPage {
        items,
        raw_len,
        requested: settings.page_size,
        next_cursor,
    }))
}

//! Full-aggregate strategy
//!
//! Walks the container account's posts newest-first and fans out to
//! each container's direct replies. Pagination follows containers, not
//! replies, so the cursor always names the last container processed.

use futures::future::try_join_all;

use super::{FetchInput, FetchedPage, StrategyOutcome, decode_batch};
use crate::config::FeedConfig;
use crate::data::{ContainerPost, Cursor};
use crate::error::AppError;
use crate::upstream::{ChainClient, ContainerQuery};

pub(super) async fn fetch(
    settings: &FeedConfig,
    chain: &dyn ChainClient,
    input: &FetchInput,
) -> Result<StrategyOutcome, AppError> {
    let (start_author, start_permlink) = match &input.cursor {
        Cursor::Start => (None, None),
        Cursor::Container {
            last_author,
            last_permlink,
            ..
        } => (Some(last_author.clone()), Some(last_permlink.clone())),
        Cursor::Numeric { .. } => {
            return Err(AppError::InvalidConfiguration(
                "numeric cursor handed to the full-aggregate strategy".to_string(),
            ));
        }
    };

    // One extra slot when resuming: the anchor may come back and is dropped.
    let page_size = settings.container_page_size;
    let limit = if start_author.is_some() {
        page_size + 1
    } else {
        page_size
    };
    let query = ContainerQuery {
        account: settings.container_account.clone(),
        limit,
        start_author,
        start_permlink,
    };

    let containers: Vec<ContainerPost> = chain
        .list_container_posts(&query)
        .await?
        .into_iter()
        .filter(|post| !is_resume_anchor(post, &query))
        .take(page_size)
        .collect();

    let Some(last) = containers.last() else {
        tracing::debug!(account = %query.account, "No more container posts");
        return Ok(StrategyOutcome::Page(FetchedPage::empty(
            settings.container_page_size,
        )));
    };

    // All replies calls run together; the first failure fails the page.
    let replies = try_join_all(
        containers
            .iter()
            .map(|post| chain.list_replies(&post.author, &post.permlink)),
    )
    .await?;

    let reply_count: usize = replies.iter().map(Vec::len).sum();
    let items = decode_batch(replies.into_iter().flatten());

    tracing::debug!(
        containers = containers.len(),
        replies = reply_count,
        kept = items.len(),
        last_container = %last.permlink,
        "Aggregate page fetched"
    );

    Ok(StrategyOutcome::Page(FetchedPage {
        items,
        raw_len: containers.len(),
        requested: settings.container_page_size,
        next_cursor: Some(Cursor::Container {
            last_author: last.author.clone(),
            last_permlink: last.permlink.clone(),
            observed_at: chrono::Utc::now(),
        }),
    }))
}

/// Some nodes include the start post in the next page; never reprocess it
fn is_resume_anchor(post: &ContainerPost, query: &ContainerQuery) -> bool {
    query.start_author.as_deref() == Some(post.author.as_str())
        && query.start_permlink.as_deref() == Some(post.permlink.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::valid_config;
    use crate::service::strategy::test_support::snap;
    use crate::upstream::MockChainClient;

    fn container(permlink: &str) -> ContainerPost {
        ContainerPost {
            author: "peak.snaps".to_string(),
            permlink: permlink.to_string(),
            created: None,
        }
    }

    fn container_cursor(permlink: &str) -> Cursor {
        Cursor::Container {
            last_author: "peak.snaps".to_string(),
            last_permlink: permlink.to_string(),
            observed_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn flattens_replies_in_container_order() {
        let settings = valid_config().feed;
        let mut chain = MockChainClient::new();
        chain
            .expect_list_container_posts()
            .withf(|query| query.limit == 2 && query.start_author.is_none())
            .times(1)
            .returning(|_| Ok(vec![container("c2"), container("c1")]));
        chain
            .expect_list_replies()
            .withf(|_, permlink| permlink == "c2")
            .times(1)
            .returning(|_, _| Ok(vec![snap("bob", "r2b", None), snap("alice", "r2a", None)]));
        chain
            .expect_list_replies()
            .withf(|_, permlink| permlink == "c1")
            .times(1)
            .returning(|_, _| Ok(vec![snap("carol", "r1", None)]));

        let outcome = fetch(&settings, &chain, &FetchInput::default())
            .await
            .unwrap();

        let StrategyOutcome::Page(page) = outcome else {
            panic!("expected a page");
        };
        let ids: Vec<_> = page.items.iter().map(|i| i.identifier.as_str()).collect();
        assert_eq!(ids, vec!["@bob/r2b", "@alice/r2a", "@carol/r1"]);
        assert_eq!(page.raw_len, 2);
        assert!(matches!(
            page.next_cursor,
            Some(Cursor::Container { ref last_permlink, .. }) if last_permlink == "c1"
        ));
    }

    #[tokio::test]
    async fn no_containers_is_an_empty_page() {
        let settings = valid_config().feed;
        let mut chain = MockChainClient::new();
        chain
            .expect_list_container_posts()
            .returning(|_| Ok(Vec::new()));
        chain.expect_list_replies().never();

        let outcome = fetch(&settings, &chain, &FetchInput::default())
            .await
            .unwrap();

        assert_eq!(outcome, StrategyOutcome::Page(FetchedPage::empty(2)));
    }

    #[tokio::test]
    async fn resumes_from_cursor_and_skips_the_anchor() {
        let settings = valid_config().feed;
        let mut chain = MockChainClient::new();
        chain
            .expect_list_container_posts()
            .withf(|query| {
                query.start_author.as_deref() == Some("peak.snaps")
                    && query.start_permlink.as_deref() == Some("c3")
                    && query.limit == 3
            })
            .times(1)
            .returning(|_| Ok(vec![container("c3"), container("c2"), container("c1")]));
        chain
            .expect_list_replies()
            .withf(|_, permlink| permlink == "c2")
            .times(1)
            .returning(|_, _| Ok(vec![snap("bob", "r2", None)]));
        chain
            .expect_list_replies()
            .withf(|_, permlink| permlink == "c1")
            .times(1)
            .returning(|_, _| Ok(vec![snap("carol", "r1", None)]));

        let input = FetchInput {
            cursor: container_cursor("c3"),
            ..FetchInput::default()
        };
        let outcome = fetch(&settings, &chain, &input).await.unwrap();

        let StrategyOutcome::Page(page) = outcome else {
            panic!("expected a page");
        };
        assert_eq!(page.raw_len, 2);
        assert_eq!(page.items.len(), 2);
        assert!(matches!(
            page.next_cursor,
            Some(Cursor::Container { ref last_permlink, .. }) if last_permlink == "c1"
        ));
    }

    #[tokio::test]
    async fn exclusive_start_bound_still_caps_page_at_container_page_size() {
        let settings = valid_config().feed;
        let mut chain = MockChainClient::new();
        chain
            .expect_list_container_posts()
            .withf(|query| query.limit == 3)
            .times(1)
            .returning(|_| Ok(vec![container("c2"), container("c1"), container("c0")]));
        chain
            .expect_list_replies()
            .withf(|_, permlink| permlink != "c0")
            .times(2)
            .returning(|_, _| Ok(Vec::new()));

        let input = FetchInput {
            cursor: container_cursor("c3"),
            ..FetchInput::default()
        };
        let outcome = fetch(&settings, &chain, &input).await.unwrap();

        let StrategyOutcome::Page(page) = outcome else {
            panic!("expected a page");
        };
        assert_eq!(page.raw_len, 2);
        assert!(matches!(
            page.next_cursor,
            Some(Cursor::Container { ref last_permlink, .. }) if last_permlink == "c1"
        ));
    }

    #[tokio::test]
    async fn only_the_anchor_left_means_exhausted() {
        let settings = valid_config().feed;
        let mut chain = MockChainClient::new();
        chain
            .expect_list_container_posts()
            .returning(|_| Ok(vec![container("c1")]));
        chain.expect_list_replies().never();

        let input = FetchInput {
            cursor: container_cursor("c1"),
            ..FetchInput::default()
        };
        let outcome = fetch(&settings, &chain, &input).await.unwrap();

        assert_eq!(outcome, StrategyOutcome::Page(FetchedPage::empty(2)));
    }

    #[tokio::test]
    async fn one_failing_replies_call_fails_the_page() {
        let settings = valid_config().feed;
        let mut chain = MockChainClient::new();
        chain
            .expect_list_container_posts()
            .returning(|_| Ok(vec![container("c2"), container("c1")]));
        chain
            .expect_list_replies()
            .withf(|_, permlink| permlink == "c2")
            .returning(|_, _| Ok(vec![snap("bob", "r2", None)]));
        chain
            .expect_list_replies()
            .withf(|_, permlink| permlink == "c1")
            .returning(|_, _| Err(AppError::TransportFailure("HTTP 503".to_string())));

        let result = fetch(&settings, &chain, &FetchInput::default()).await;
        assert!(matches!(result, Err(AppError::TransportFailure(_))));
    }

    #[tokio::test]
    async fn rejects_numeric_cursor() {
        let settings = valid_config().feed;
        let chain = MockChainClient::new();

        let input = FetchInput {
            cursor: Cursor::Numeric { last_sequence_id: 1 },
            ..FetchInput::default()
        };
        let result = fetch(&settings, &chain, &input).await;
        assert!(matches!(result, Err(AppError::InvalidConfiguration(_))));
    }
}

//! Follow set loading

use std::collections::HashSet;

use super::ChainClient;
use crate::error::Result;

/// Load every account `username` follows
///
/// Pages through `list_following`, whose start bound is inclusive, so each
/// page after the first repeats the previous page's last entry. Stops at
/// the first short page.
pub async fn load_follow_set(
    chain: &dyn ChainClient,
    username: &str,
    page_size: usize,
) -> Result<HashSet<String>> {
    let page_size = page_size.max(2);
    let mut follows = HashSet::new();
    let mut start = String::new();

    loop {
        let page = chain.list_following(username, &start, page_size).await?;
        let page_len = page.len();
        let last = page.last().cloned();

        follows.extend(page.into_iter().filter(|name| *name != start));

        match last {
            Some(last) if page_len >= page_size && last != start => start = last,
            _ => break,
        }
    }

    tracing::debug!(
        username = %username,
        follows = follows.len(),
        "Loaded follow set"
    );
    Ok(follows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::upstream::MockChainClient;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[tokio::test]
    async fn pages_until_short_page_and_skips_repeated_start() {
        let mut chain = MockChainClient::new();
        chain
            .expect_list_following()
            .withf(|username, start, limit| username == "alice" && start.is_empty() && *limit == 3)
            .times(1)
            .returning(|_, _, _| Ok(names(&["bob", "carol", "dave"])));
        chain
            .expect_list_following()
            .withf(|_, start, _| start == "dave")
            .times(1)
            .returning(|_, _, _| Ok(names(&["dave", "erin"])));

        let follows = load_follow_set(&chain, "alice", 3).await.unwrap();

        assert_eq!(follows.len(), 4);
        for name in ["bob", "carol", "dave", "erin"] {
            assert!(follows.contains(name));
        }
    }

    #[tokio::test]
    async fn propagates_transport_failure() {
        let mut chain = MockChainClient::new();
        chain
            .expect_list_following()
            .returning(|_, _, _| Err(AppError::TransportFailure("node down".to_string())));

        let result = load_follow_set(&chain, "alice", 100).await;
        assert!(matches!(result, Err(AppError::TransportFailure(_))));
    }

    #[tokio::test]
    async fn empty_follow_list_loads_empty_set() {
        let mut chain = MockChainClient::new();
        chain
            .expect_list_following()
            .times(1)
            .returning(|_, _, _| Ok(Vec::new()));

        let follows = load_follow_set(&chain, "alice", 100).await.unwrap();
        assert!(follows.is_empty());
    }
}

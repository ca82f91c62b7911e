//! Hive JSON-RPC client
//!
//! Thin wrapper over three node calls:
//! - `bridge.get_account_posts` for container posts
//! - `condenser_api.get_content_replies` for a container's snaps
//! - `condenser_api.get_following` for follow lists

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ChainClient, ContainerQuery, record_call};
use crate::data::{ContainerPost, RawSnap};
use crate::error::AppError;
use crate::metrics::UPSTREAM_REQUEST_DURATION_SECONDS;

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    method: &'a str,
    params: P,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct AccountPostsParams<'a> {
    sort: &'static str,
    account: &'a str,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_author: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_permlink: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FollowEntry {
    following: String,
}

/// reqwest-backed [`ChainClient`] speaking Hive JSON-RPC 2.0
#[derive(Clone)]
pub struct HiveChainClient {
    http_client: Arc<reqwest::Client>,
    node_url: String,
}

impl HiveChainClient {
    pub fn new(http_client: Arc<reqwest::Client>, node_url: &str) -> Self {
        Self {
            http_client,
            node_url: node_url.to_string(),
        }
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<T, AppError>
    where
        P: Serialize + Send,
        T: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response = self
            .http_client
            .post(&self.node_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::TransportFailure(format!("{} failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(AppError::TransportFailure(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let body: RpcResponse<T> = response.json().await.map_err(|e| {
            AppError::TransportFailure(format!("{} returned an invalid body: {}", method, e))
        })?;

        unwrap_rpc(method, body)
    }
}

fn unwrap_rpc<T>(method: &str, body: RpcResponse<T>) -> Result<T, AppError> {
    if let Some(error) = body.error {
        return Err(AppError::TransportFailure(format!(
            "{} failed with RPC error {}: {}",
            method, error.code, error.message
        )));
    }
    body.result
        .ok_or_else(|| AppError::TransportFailure(format!("{} returned no result", method)))
}

#[async_trait]
impl ChainClient for HiveChainClient {
    async fn list_container_posts(
        &self,
        query: &ContainerQuery,
    ) -> Result<Vec<ContainerPost>, AppError> {
        let params = AccountPostsParams {
            sort: "posts",
            account: &query.account,
            limit: query.limit,
            start_author: query.start_author.as_deref(),
            start_permlink: query.start_permlink.as_deref(),
        };

        let timer = UPSTREAM_REQUEST_DURATION_SECONDS
            .with_label_values(&["list_container_posts"])
            .start_timer();
        let result = self.call("bridge.get_account_posts", params).await;
        record_call("list_container_posts", timer, &result);
        result
    }

    async fn list_replies(&self, author: &str, permlink: &str) -> Result<Vec<RawSnap>, AppError> {
        let timer = UPSTREAM_REQUEST_DURATION_SECONDS
            .with_label_values(&["list_replies"])
            .start_timer();
        let result = self
            .call("condenser_api.get_content_replies", (author, permlink))
            .await;
        record_call("list_replies", timer, &result);
        result
    }

    async fn list_following(
        &self,
        username: &str,
        start: &str,
        limit: usize,
    ) -> Result<Vec<String>, AppError> {
        let timer = UPSTREAM_REQUEST_DURATION_SECONDS
            .with_label_values(&["list_following"])
            .start_timer();
        let result: Result<Vec<FollowEntry>, AppError> = self
            .call(
                "condenser_api.get_following",
                (username, start, "blog", limit),
            )
            .await;
        record_call("list_following", timer, &result);

        Ok(result?.into_iter().map(|entry| entry.following).collect())
    }
}

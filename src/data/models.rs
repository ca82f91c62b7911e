//! Data models
//!
//! Wire records returned by the upstreams and the decoded feed types
//! the aggregation core works on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

// =============================================================================
// ID Types
// =============================================================================

/// Session ID wrapper (ULID format, 26 characters)
///
/// Example: "01ARZ3NDEKTSV4RRFFQ69G5FAV"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new ULID
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Parse a session id received from a client
    pub fn parse(s: &str) -> Result<Self, AppError> {
        ulid::Ulid::from_string(s)
            .map(|ulid| Self(ulid.to_string()))
            .map_err(|e| AppError::Validation(format!("invalid session id {s:?}: {e}")))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Filter selection
// =============================================================================

/// Which feed the caller is looking at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Snaps by accounts the subject follows
    Following,
    /// Snaps tagged with the configured community
    Community,
    /// Every reply under the container account's posts
    All,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Following => "following",
            FilterMode::Community => "community",
            FilterMode::All => "all",
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "following" => Ok(FilterMode::Following),
            "community" => Ok(FilterMode::Community),
            "all" => Ok(FilterMode::All),
            other => Err(AppError::InvalidConfiguration(format!(
                "unknown filter mode: {other:?}"
            ))),
        }
    }
}

/// Filter mode plus the optional subject it applies to
///
/// Two filters are equal when both the mode and the normalized
/// subject match; any difference resets the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedFilter {
    pub mode: FilterMode,
    pub subject: Option<String>,
}

impl FeedFilter {
    pub fn new(mode: FilterMode, subject: Option<&str>) -> Self {
        Self {
            mode,
            subject: subject.and_then(normalize_username),
        }
    }
}

/// Lowercase, trim and drop a leading `@`; blank names become `None`
pub fn normalize_username(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('@').trim().to_ascii_lowercase();
    if name.is_empty() { None } else { Some(name) }
}

// =============================================================================
// Cursor
// =============================================================================

/// Resume token for the active strategy
///
/// Exactly one shape is live per session. Switching strategy replaces
/// the whole value with `Cursor::Start`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cursor {
    /// Nothing fetched yet; start from the newest item
    #[default]
    Start,
    /// Following and community feeds
    Numeric { last_sequence_id: u64 },
    /// Full aggregate feed
    Container {
        last_author: String,
        last_permlink: String,
        /// Diagnostic only, never read back for resumption
        observed_at: DateTime<Utc>,
    },
}

// =============================================================================
// Wire records
// =============================================================================

/// Snap record as returned by the snaps API or by a replies call
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RawSnap {
    /// Numeric feed position; only cursor-style sources send it
    #[serde(default)]
    pub id: Option<u64>,
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created: Option<String>,
    /// Either a JSON object or a JSON-encoded string, depending on the API
    #[serde(default)]
    pub json_metadata: serde_json::Value,
}

/// Container post as listed by the chain client
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ContainerPost {
    pub author: String,
    pub permlink: String,
    #[serde(default)]
    pub created: Option<String>,
}

// =============================================================================
// Feed item
// =============================================================================

/// One decoded timeline entry
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedItem {
    /// Permanent link, `@author/permlink`; the dedup identity
    pub identifier: String,
    pub author_id: String,
    pub permlink: String,
    pub sequence_id: Option<u64>,
    pub body: String,
    pub created: Option<String>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
}

/// Permanent link for an author/permlink pair
pub fn permanent_link(author: &str, permlink: &str) -> String {
    format!("@{author}/{permlink}")
}

impl TryFrom<RawSnap> for FeedItem {
    type Error = AppError;

    fn try_from(raw: RawSnap) -> Result<Self, Self::Error> {
        let identifier = permanent_link(&raw.author, &raw.permlink);
        let malformed = |reason: String| AppError::MalformedRecord {
            identifier: identifier.clone(),
            reason,
        };

        let metadata = decode_metadata(&raw.json_metadata).map_err(malformed)?;
        let tags = extract_tags(&metadata).map_err(malformed)?;

        Ok(FeedItem {
            identifier,
            author_id: raw.author,
            permlink: raw.permlink,
            sequence_id: raw.id,
            body: raw.body,
            created: raw.created,
            tags,
            metadata,
        })
    }
}

fn decode_metadata(value: &serde_json::Value) -> Result<serde_json::Value, String> {
    use serde_json::Value;

    match value {
        Value::Null => Ok(Value::Object(Default::default())),
        Value::Object(_) => Ok(value.clone()),
        Value::String(text) if text.trim().is_empty() => Ok(Value::Object(Default::default())),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(decoded @ Value::Object(_)) => Ok(decoded),
            Ok(other) => Err(format!("metadata is not an object: {other}")),
            Err(e) => Err(format!("metadata is not valid JSON: {e}")),
        },
        other => Err(format!("unexpected metadata type: {other}")),
    }
}

fn extract_tags(metadata: &serde_json::Value) -> Result<Vec<String>, String> {
    use serde_json::Value;

    match metadata.get("tags") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(tag)) => Ok(vec![tag.clone()]),
        Some(Value::Array(tags)) => tags
            .iter()
            .map(|tag| match tag {
                Value::String(tag) => Ok(tag.clone()),
                other => Err(format!("tag is not a string: {other}")),
            })
            .collect(),
        Some(other) => Err(format!("tags must be a list: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn session_id_parse_round_trips_and_rejects_garbage() {
        let id = SessionId::new();
        assert_eq!(SessionId::parse(&id.0).unwrap(), id);
        assert!(matches!(
            SessionId::parse("not-a-session"),
            Err(AppError::Validation(_))
        ));
    }

    fn raw(metadata: serde_json::Value) -> RawSnap {
        RawSnap {
            id: Some(42),
            author: "alice".to_string(),
            permlink: "snap-1".to_string(),
            body: "hello".to_string(),
            created: None,
            json_metadata: metadata,
        }
    }

    #[test]
    fn decodes_string_encoded_metadata() {
        let metadata = json!("{\"tags\":[\"hive-163772\",\"snaps\"]}");
        let item = FeedItem::try_from(raw(metadata)).unwrap();
        assert_eq!(item.identifier, "@alice/snap-1");
        assert_eq!(item.sequence_id, Some(42));
        assert_eq!(item.tags, vec!["hive-163772", "snaps"]);
    }

    #[test]
    fn accepts_object_and_missing_metadata() {
        let item = FeedItem::try_from(raw(json!({"app": "peakd"}))).unwrap();
        assert!(item.tags.is_empty());

        let item = FeedItem::try_from(raw(serde_json::Value::Null)).unwrap();
        assert!(item.tags.is_empty());

        let item = FeedItem::try_from(raw(json!(""))).unwrap();
        assert_eq!(item.metadata, json!({}));
    }

    #[test]
    fn rejects_unparsable_metadata() {
        let error = FeedItem::try_from(raw(json!("{tags: oops"))).unwrap_err();
        assert!(matches!(
            error,
            AppError::MalformedRecord { identifier, .. } if identifier == "@alice/snap-1"
        ));
    }

    #[test]
    fn rejects_non_string_tags() {
        assert!(FeedItem::try_from(raw(json!({"tags": [1, 2]}))).is_err());
        assert!(FeedItem::try_from(raw(json!({"tags": {"a": 1}}))).is_err());
    }

    #[test]
    fn single_string_tag_is_kept() {
        let item = FeedItem::try_from(raw(json!({"tags": "snaps"}))).unwrap();
        assert_eq!(item.tags, vec!["snaps"]);
    }

    #[test]
    fn filter_mode_parsing_fails_loudly_on_unknown_mode() {
        assert_eq!("All".parse::<FilterMode>().unwrap(), FilterMode::All);
        assert_eq!(" following ".parse::<FilterMode>().unwrap(), FilterMode::Following);
        assert!(matches!(
            "trending".parse::<FilterMode>(),
            Err(AppError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn feed_filter_normalizes_subject() {
        let filter = FeedFilter::new(FilterMode::Following, Some(" @Alice "));
        assert_eq!(filter.subject.as_deref(), Some("alice"));
        assert_eq!(FeedFilter::new(FilterMode::Following, Some("  ")).subject, None);
        assert_eq!(
            FeedFilter::new(FilterMode::All, Some("alice")),
            FeedFilter::new(FilterMode::All, Some("@ALICE"))
        );
    }
}

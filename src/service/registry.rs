//! Feed session registry
//!
//! Maps session ids to live controllers. Sessions untouched for longer
//! than the idle TTL are pruned by a background sweeper, and the oldest
//! session is evicted when the registry is full.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::controller::FeedController;
use crate::config::{FeedConfig, SessionConfig};
use crate::data::{FeedFilter, SessionId};
use crate::metrics::ACTIVE_SESSIONS;
use crate::upstream::Upstream;

struct SessionEntry {
    controller: Arc<FeedController>,
    last_seen: Instant,
}

impl SessionEntry {
    fn is_idle(&self, ttl: Duration) -> bool {
        self.last_seen.elapsed() >= ttl
    }
}

pub struct SessionRegistry {
    entries: RwLock<HashMap<SessionId, SessionEntry>>,
    settings: FeedConfig,
    upstream: Upstream,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(settings: FeedConfig, sessions: &SessionConfig, upstream: Upstream) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            settings,
            upstream,
            idle_ttl: Duration::from_secs(sessions.idle_ttl_seconds),
            max_sessions: sessions.max_sessions.max(1),
        }
    }

    /// Open a new session under `filter`
    pub async fn create(&self, filter: FeedFilter) -> (SessionId, Arc<FeedController>) {
        let controller = Arc::new(FeedController::new(
            self.settings.clone(),
            self.upstream.clone(),
            filter,
        ));
        let id = SessionId::new();

        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_sessions {
            Self::prune_idle_locked(&mut entries, self.idle_ttl);
            if entries.len() >= self.max_sessions {
                Self::evict_oldest_locked(&mut entries);
            }
        }
        entries.insert(
            id.clone(),
            SessionEntry {
                controller: controller.clone(),
                last_seen: Instant::now(),
            },
        );
        ACTIVE_SESSIONS.set(entries.len() as i64);

        tracing::debug!(session = %id, sessions = entries.len(), "Session created");
        (id, controller)
    }

    /// Look up a session and mark it as seen
    pub async fn get(&self, id: &SessionId) -> Option<Arc<FeedController>> {
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(id)?;
        entry.last_seen = Instant::now();
        Some(entry.controller.clone())
    }

    /// Returns true if the session existed
    pub async fn remove(&self, id: &SessionId) -> bool {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(id).is_some();
        ACTIVE_SESSIONS.set(entries.len() as i64);
        removed
    }

    /// Drop idle sessions, returning how many were removed
    pub async fn prune_idle(&self) -> usize {
        let mut entries = self.entries.write().await;
        let pruned = Self::prune_idle_locked(&mut entries, self.idle_ttl);
        ACTIVE_SESSIONS.set(entries.len() as i64);
        pruned
    }

    /// Prune idle sessions every `every` until the task is aborted
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            // Consume the immediate first tick; nothing can be idle yet.
            interval.tick().await;

            loop {
                interval.tick().await;

                let pruned = self.prune_idle().await;
                if pruned > 0 {
                    let remaining = self.len().await;
                    tracing::info!(pruned, remaining, "Pruned idle feed sessions");
                }
            }
        })
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn prune_idle_locked(entries: &mut HashMap<SessionId, SessionEntry>, ttl: Duration) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_idle(ttl));
        before - entries.len()
    }

    fn evict_oldest_locked(entries: &mut HashMap<SessionId, SessionEntry>) -> bool {
        let Some(oldest) = entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_seen)
            .map(|(id, _)| id.clone())
        else {
            return false;
        };
        tracing::debug!(session = %oldest, "Evicting oldest session");
        entries.remove(&oldest);
        true
    }
}

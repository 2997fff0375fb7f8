//! In-memory session store for single-process deployments and tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;

use crate::{SessionResult, SessionStore};

#[derive(Clone)]
struct SessionEntry {
    user_id: u64,
    ttl: Duration,
}

/// Each entry expires after its own TTL, counted from insertion.
struct PerEntryTtl;

impl Expiry<String, SessionEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &SessionEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-memory implementation of [`SessionStore`].
pub struct MemorySessionStore {
    cache: Cache<String, SessionEntry>,
}

impl MemorySessionStore {
    pub fn new(max_sessions: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_sessions)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(100_000)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, session_id: &str, user_id: u64, ttl: Duration) -> SessionResult<()> {
        self.cache
            .insert(session_id.to_string(), SessionEntry { user_id, ttl })
            .await;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> SessionResult<Option<u64>> {
        Ok(self.cache.get(session_id).await.map(|entry| entry.user_id))
    }

    async fn remove(&self, session_id: &str) -> SessionResult<Option<u64>> {
        Ok(self.cache.remove(session_id).await.map(|entry| entry.user_id))
    }
}

//! Redis-backed session store for multi-process deployments.
//!
//! Keys carry a prefix so a shared Redis can host other tenants; TTL is set
//! with the key (`SET ... EX`) so revocation state cannot outlive the token
//! it guards.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use crate::{SessionError, SessionResult, SessionStore};

const KEY_PREFIX: &str = "greeter:session:";

/// Redis implementation of [`SessionStore`].
pub struct RedisSessionStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisSessionStore {
    /// Connect to Redis, e.g. `redis://localhost:6379`.
    pub async fn connect(redis_url: &str) -> SessionResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| SessionError::Backend(format!("failed to create client: {}", e)))?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| SessionError::Backend(format!("failed to connect: {}", e)))?;

        debug!("redis session store connected");
        Ok(Self { conn })
    }

    fn key(session_id: &str) -> String {
        format!("{}{}", KEY_PREFIX, session_id)
    }

    fn parse_user_id(raw: String) -> SessionResult<u64> {
        raw.parse::<u64>()
            .map_err(|_| SessionError::CorruptValue(raw))
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(&self, session_id: &str, user_id: u64, ttl: Duration) -> SessionResult<()> {
        let mut conn = self.conn.clone();
        // TTL below one second would round to zero and never expire; clamp up
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(Self::key(session_id), user_id.to_string(), seconds)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))
    }

    async fn get(&self, session_id: &str) -> SessionResult<Option<u64>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::key(session_id))
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        raw.map(Self::parse_user_id).transpose()
    }

    async fn remove(&self, session_id: &str) -> SessionResult<Option<u64>> {
        let mut conn = self.conn.clone();
        let key = Self::key(session_id);

        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        let Some(raw) = raw else { return Ok(None) };

        let _: () = conn
            .del(&key)
            .await
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Self::parse_user_id(raw).map(Some)
    }
}

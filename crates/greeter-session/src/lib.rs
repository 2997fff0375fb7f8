//! # Greeter Session - Session Key/Value Store
//!
//! Holds the authoritative revocation state for issued tokens: each live
//! session identifier maps to its owning user id, with a TTL equal to the
//! token's validity window. A token whose session key is absent, whether
//! explicitly deleted or passively expired, is dead no matter what the
//! token itself claims.
//!
//! Two implementations are provided, mirroring the deployment split:
//!
//! - **In-memory** (default): per-entry TTL cache, single-process.
//! - **Redis** (`redis-store` feature): for deployments where the login and
//!   greeter processes share revocation state.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis_store;

pub use memory::MemorySessionStore;
#[cfg(feature = "redis-store")]
pub use redis_store::RedisSessionStore;

/// Errors from the session store backend.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store backend error: {0}")]
    Backend(String),

    #[error("corrupt session value: {0}")]
    CorruptValue(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Key/value store with per-key expiry.
///
/// Keys are opaque session identifiers; the only stored value is the
/// string-encoded owning user id. Everything else a token claims lives in
/// the token itself.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record `session_id -> user_id` with the given time-to-live.
    async fn put(&self, session_id: &str, user_id: u64, ttl: Duration) -> SessionResult<()>;

    /// Look a session up. `None` means revoked or expired; callers cannot
    /// tell which.
    async fn get(&self, session_id: &str) -> SessionResult<Option<u64>>;

    /// Delete a session, returning the previous owner if the key was live.
    async fn remove(&self, session_id: &str) -> SessionResult<Option<u64>>;
}

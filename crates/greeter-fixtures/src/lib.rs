//! # Greeter Fixtures - Shared Test Helpers
//!
//! Canned configurations and test doubles used across crate test suites.
//! Dev-dependency only; nothing here ships.

use std::time::Duration;

use async_trait::async_trait;
use greeter_auth::TokenConfig;
use greeter_repl::{BusError, BusResult, EventBus};
use greeter_store::{MemoryDatabase, UserDatabase};
use greeter_types::{StoreResult, UserEvent, DEFAULT_LANGUAGE};

/// Token configuration with generous validity windows.
pub fn token_config() -> TokenConfig {
    TokenConfig {
        access_secret: "test-access-secret".to_string(),
        access_ttl: Duration::from_secs(900),
        refresh_secret: "test-refresh-secret".to_string(),
        refresh_ttl: Duration::from_secs(604_800),
    }
}

/// Token configuration whose access tokens are already expired when minted.
pub fn expired_token_config() -> TokenConfig {
    TokenConfig {
        access_ttl: Duration::ZERO,
        ..token_config()
    }
}

/// An event bus that rejects every publish, for exercising the
/// committed-but-unpublished path.
#[derive(Debug, Default)]
pub struct FailingBus;

#[async_trait]
impl EventBus for FailingBus {
    async fn publish(&self, _event: &UserEvent) -> BusResult<usize> {
        Err(BusError::Publish("bus is down".to_string()))
    }
}

/// In-memory database pre-populated with `(name, secret)` users, all in the
/// default language. Each insert is its own committed transaction, so ids
/// start at 1 and follow insertion order.
pub async fn seeded_database(users: &[(&str, &str)]) -> StoreResult<MemoryDatabase> {
    let db = MemoryDatabase::new();
    for (name, secret) in users {
        let mut tx = db.begin().await?;
        tx.insert_user(name, secret, DEFAULT_LANGUAGE).await?;
        tx.commit().await?;
    }
    Ok(db)
}

//! # Greeter Store - Authoritative User Storage
//!
//! Owns the user table on the login side. Every committed create/delete is
//! followed by a broadcast event so greeter replicas can track the table
//! without database access of their own.

use async_trait::async_trait;
use greeter_types::{StoreResult, UserRecord};

pub mod memory;
#[cfg(feature = "mysql")]
pub mod mysql;
pub mod primary;

pub use memory::MemoryDatabase;
pub use primary::PrimaryUserStore;

#[cfg(feature = "mysql")]
pub use mysql::MySqlDatabase;

/// The transactional collaborator contract over the relational store.
///
/// One transaction per logical operation; the service layer is responsible
/// only for boundary placement and rollback-on-error. Isolation between
/// concurrent transactions is the backend's concern.
#[async_trait]
pub trait UserDatabase: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> StoreResult<Box<dyn UserTx>>;
}

/// A single open transaction against the user table.
///
/// `commit` and `rollback` consume the transaction; a dropped transaction
/// must behave as rolled back.
#[async_trait]
pub trait UserTx: Send {
    /// Insert a new user row and return the generated identity.
    ///
    /// The identity is retrieved within this same transaction. Generators
    /// must never reuse an id after deletion (memory backend: monotonic
    /// counter; MySQL: `AUTO_INCREMENT`), otherwise a lagging replica could
    /// associate stale data with a recycled id.
    ///
    /// Returns [`greeter_types::StoreError::Conflict`] when the name is
    /// already taken.
    async fn insert_user(&mut self, name: &str, secret: &str, language: &str) -> StoreResult<u64>;

    /// Point lookup by id.
    async fn get_by_id(&mut self, id: u64) -> StoreResult<Option<UserRecord>>;

    /// Point lookup by unique name.
    async fn get_by_name(&mut self, name: &str) -> StoreResult<Option<UserRecord>>;

    /// Overwrite a row. Returns false when the id does not exist.
    async fn update_user(&mut self, record: &UserRecord) -> StoreResult<bool>;

    /// Delete a row. Returns false when the id does not exist.
    async fn delete_user(&mut self, id: u64) -> StoreResult<bool>;

    /// All user ids currently in the table.
    async fn list_ids(&mut self) -> StoreResult<Vec<u64>>;

    /// Make the staged changes durable.
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard the staged changes.
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

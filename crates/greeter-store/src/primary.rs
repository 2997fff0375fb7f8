//! Authoritative user store for the login service.
//!
//! Every multi-step mutation runs in one transaction; the event for a
//! mutation is published only after that transaction commits. A subscriber
//! must never observe an event for a row that a failing transaction did not
//! persist.

use std::sync::Arc;

use greeter_repl::EventBus;
use greeter_types::{StoreError, StoreResult, UserEvent, UserRecord, DEFAULT_LANGUAGE};
use tracing::{error, info};

use crate::{UserDatabase, UserTx};

/// CRUD over the authoritative user table plus event publication.
pub struct PrimaryUserStore {
    db: Arc<dyn UserDatabase>,
    bus: Arc<dyn EventBus>,
}

impl PrimaryUserStore {
    pub fn new(db: Arc<dyn UserDatabase>, bus: Arc<dyn EventBus>) -> Self {
        Self { db, bus }
    }

    /// Create a user and announce it.
    ///
    /// The insert and identity retrieval happen in one transaction. Once the
    /// commit succeeds the operation has succeeded; a publish failure after
    /// that is logged as a degraded success (replicas lag, there is no retry
    /// queue) and is not surfaced to the caller.
    pub async fn create_user(&self, name: &str, secret: &str) -> StoreResult<u64> {
        let mut tx = self.db.begin().await?;
        let id = match tx.insert_user(name, secret, DEFAULT_LANGUAGE).await {
            Ok(id) => id,
            Err(source) => return Err(rolled_back(tx, source).await),
        };
        tx.commit().await?;

        info!(id, name = %name, "user created");
        self.publish_after_commit(UserEvent::Created { id, name: name.to_string() }).await;
        Ok(id)
    }

    /// Point lookup by id.
    pub async fn get_user_by_id(&self, id: u64) -> StoreResult<UserRecord> {
        let mut tx = self.db.begin().await?;
        let found = match tx.get_by_id(id).await {
            Ok(found) => found,
            Err(source) => return Err(rolled_back(tx, source).await),
        };
        tx.commit().await?;
        found.ok_or(StoreError::NotFound)
    }

    /// Point lookup by unique name.
    pub async fn get_user_by_name(&self, name: &str) -> StoreResult<UserRecord> {
        let mut tx = self.db.begin().await?;
        let found = match tx.get_by_name(name).await {
            Ok(found) => found,
            Err(source) => return Err(rolled_back(tx, source).await),
        };
        tx.commit().await?;
        found.ok_or(StoreError::NotFound)
    }

    /// All user ids.
    pub async fn list_user_ids(&self) -> StoreResult<Vec<u64>> {
        let mut tx = self.db.begin().await?;
        let ids = match tx.list_ids().await {
            Ok(ids) => ids,
            Err(source) => return Err(rolled_back(tx, source).await),
        };
        tx.commit().await?;
        Ok(ids)
    }

    /// Overwrite a user's mutable attributes. No event: replicas track only
    /// membership, not authority-side attributes.
    pub async fn update_user(&self, record: &UserRecord) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        let updated = match tx.update_user(record).await {
            Ok(updated) => updated,
            Err(source) => return Err(rolled_back(tx, source).await),
        };
        if !updated {
            return Err(rolled_back(tx, StoreError::NotFound).await);
        }
        tx.commit().await?;
        Ok(())
    }

    /// Delete a user and announce it.
    ///
    /// The existence lookup and the delete share one transaction; the event
    /// carries the pre-delete name.
    pub async fn delete_user(&self, id: u64) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;
        let record = match tx.get_by_id(id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(rolled_back(tx, StoreError::NotFound).await),
            Err(source) => return Err(rolled_back(tx, source).await),
        };
        match tx.delete_user(id).await {
            Ok(true) => {}
            Ok(false) => return Err(rolled_back(tx, StoreError::NotFound).await),
            Err(source) => return Err(rolled_back(tx, source).await),
        }
        tx.commit().await?;

        info!(id, name = %record.name, "user deleted");
        self.publish_after_commit(UserEvent::Deleted { id, name: record.name }).await;
        Ok(())
    }

    /// Look a user up by name and check the presented credential.
    ///
    /// Unknown user and wrong secret produce the same error so callers cannot
    /// learn which check failed.
    pub async fn authenticate(&self, name: &str, secret: &str) -> StoreResult<UserRecord> {
        let record = match self.get_user_by_name(name).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => return Err(StoreError::BadCredentials),
            Err(other) => return Err(other),
        };
        if !record.verify_secret(secret) {
            return Err(StoreError::BadCredentials);
        }
        Ok(record)
    }

    async fn publish_after_commit(&self, event: UserEvent) {
        if let Err(err) = self.bus.publish(&event).await {
            error!(
                error = %err,
                user_id = event.user_id(),
                "mutation committed but event publish failed; replicas will lag"
            );
        }
    }
}

/// Roll the transaction back and keep both causes if the rollback fails too.
async fn rolled_back(tx: Box<dyn UserTx>, source: StoreError) -> StoreError {
    match tx.rollback().await {
        Ok(()) => source,
        Err(rollback) => StoreError::RollbackFailed {
            source: source.to_string(),
            rollback: rollback.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDatabase;
    use greeter_repl::BroadcastBus;

    fn store_with(db: Arc<MemoryDatabase>, bus: Arc<BroadcastBus>) -> PrimaryUserStore {
        PrimaryUserStore::new(db, bus)
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let store = store_with(Arc::new(MemoryDatabase::new()), Arc::new(BroadcastBus::new()));

        let id = store.create_user("alice", "hunter2").await.unwrap();
        let record = store.get_user_by_id(id).await.unwrap();
        assert_eq!(record.name, "alice");
        assert_eq!(record.language, DEFAULT_LANGUAGE);

        assert!(matches!(
            store.get_user_by_id(id + 1).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_create_duplicate_is_conflict() {
        let store = store_with(Arc::new(MemoryDatabase::new()), Arc::new(BroadcastBus::new()));

        store.create_user("alice", "one").await.unwrap();
        assert!(matches!(
            store.create_user("alice", "two").await,
            Err(StoreError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = store_with(Arc::new(MemoryDatabase::new()), Arc::new(BroadcastBus::new()));
        assert!(matches!(store.delete_user(9).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let store = store_with(Arc::new(MemoryDatabase::new()), Arc::new(BroadcastBus::new()));
        store.create_user("alice", "hunter2").await.unwrap();

        let record = store.authenticate("alice", "hunter2").await.unwrap();
        assert_eq!(record.name, "alice");

        // Wrong password and unknown user are indistinguishable
        assert!(matches!(
            store.authenticate("alice", "wrong").await,
            Err(StoreError::BadCredentials)
        ));
        assert!(matches!(
            store.authenticate("nobody", "hunter2").await,
            Err(StoreError::BadCredentials)
        ));
    }

    #[tokio::test]
    async fn test_update_user_attributes() {
        let store = store_with(Arc::new(MemoryDatabase::new()), Arc::new(BroadcastBus::new()));
        let id = store.create_user("alice", "hunter2").await.unwrap();

        let mut record = store.get_user_by_id(id).await.unwrap();
        record.language = "fr".to_string();
        store.update_user(&record).await.unwrap();

        assert_eq!(store.get_user_by_id(id).await.unwrap().language, "fr");
    }

    #[tokio::test]
    async fn test_rollback_failure_keeps_both_errors() {
        let db = Arc::new(MemoryDatabase::new());
        let store = store_with(Arc::clone(&db), Arc::new(BroadcastBus::new()));

        db.fail_next_rollbacks(1);
        match store.delete_user(1).await {
            Err(StoreError::RollbackFailed { source, rollback }) => {
                assert!(source.contains("not found"));
                assert!(rollback.contains("injected rollback failure"));
            }
            other => panic!("expected RollbackFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_list_user_ids() {
        let store = store_with(Arc::new(MemoryDatabase::new()), Arc::new(BroadcastBus::new()));
        let a = store.create_user("alice", "s").await.unwrap();
        let b = store.create_user("bob", "s").await.unwrap();

        assert_eq!(store.list_user_ids().await.unwrap(), vec![a, b]);
    }
}

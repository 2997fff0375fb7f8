//! Greeter-side read replica of the user table.
//!
//! Built entirely by consuming user events; never written to directly by
//! request handlers and never the origin of an event. The replica is an
//! explicit handle (construct once, clone the `Arc`) rather than
//! process-global state, so tests can run independent instances.

use std::collections::HashMap;
use std::sync::Arc;

use greeter_types::{EventDecodeError, StoreError, StoreResult, User, UserEvent, DEFAULT_LANGUAGE};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bus::EventStream;

#[derive(Default)]
struct ReplicaState {
    by_id: HashMap<u64, User>,
    name_index: HashMap<String, u64>,
}

/// In-memory, eventually-consistent projection of user records.
///
/// One consumer task is the only writer; readers share the lock. Both maps
/// change only inside `apply`, which keeps the critical section to map
/// operations.
pub struct ReplicaUserStore {
    state: RwLock<ReplicaState>,
}

impl ReplicaUserStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { state: RwLock::new(ReplicaState::default()) })
    }

    /// Apply one event to the projection.
    ///
    /// Idempotent and order-tolerant: a repeated `Created` is an overwrite
    /// with identical data, `Deleted` for an absent id is a no-op, and a
    /// `Deleted` arriving before its `Created` materializes nothing.
    pub async fn apply(&self, event: UserEvent) {
        let mut state = self.state.write().await;
        match event {
            UserEvent::Created { id, name } => {
                debug!(id, name = %name, "replica: user created");
                if let Some(previous) = state.by_id.insert(
                    id,
                    User { id, name: name.clone(), language: DEFAULT_LANGUAGE.to_string() },
                ) {
                    state.name_index.remove(&previous.name);
                }
                state.name_index.insert(name, id);
            }
            UserEvent::Deleted { id, name } => {
                debug!(id, name = %name, "replica: user deleted");
                if let Some(user) = state.by_id.remove(&id) {
                    state.name_index.remove(&user.name);
                }
            }
        }
    }

    /// Point lookup by id.
    pub async fn get_user_by_id(&self, id: u64) -> StoreResult<User> {
        let state = self.state.read().await;
        state.by_id.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    /// Point lookup through the secondary name index.
    pub async fn get_user_by_name(&self, name: &str) -> StoreResult<User> {
        let state = self.state.read().await;
        let id = state.name_index.get(name).ok_or(StoreError::NotFound)?;
        state.by_id.get(id).cloned().ok_or(StoreError::NotFound)
    }

    /// Update the greeter-local language preference for a replicated user.
    pub async fn update_language(&self, id: u64, language: &str) -> StoreResult<()> {
        let mut state = self.state.write().await;
        match state.by_id.get_mut(&id) {
            Some(user) => {
                user.language = language.to_string();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    /// Number of users currently materialized.
    pub async fn len(&self) -> usize {
        self.state.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Start the single consumer task for this replica.
    ///
    /// Events are applied strictly in arrival order, one at a time. Malformed
    /// payloads and unknown event types are logged and skipped; one bad
    /// message never terminates the loop. The task ends when the stream
    /// closes (publisher dropped).
    pub fn spawn_consumer(self: &Arc<Self>, mut stream: EventStream) -> JoinHandle<()> {
        let replica = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(payload) = stream.recv().await {
                match UserEvent::decode(&payload) {
                    Ok(event) => replica.apply(event).await,
                    Err(EventDecodeError::UnknownType(kind)) => {
                        warn!(kind, "skipping user event of unknown type");
                    }
                    Err(EventDecodeError::Malformed(reason)) => {
                        warn!(%reason, payload = %payload, "dropping malformed user event");
                    }
                }
            }
            debug!("user event stream closed; replica consumer exiting");
        })
    }
}

//! In-memory database backend for testing and development.
//!
//! Transactions stage their writes and apply them atomically at commit under
//! one write lock. Commit and rollback failures can be injected so callers
//! can exercise their error paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use greeter_types::{StoreError, StoreResult, UserRecord};
use tokio::sync::RwLock;

use crate::{UserDatabase, UserTx};

#[derive(Default)]
struct MemoryState {
    users: HashMap<u64, UserRecord>,
    by_name: HashMap<String, u64>,
}

struct Inner {
    state: RwLock<MemoryState>,
    // Monotonic, bumped at insert time even if the transaction later rolls
    // back. Ids are never reused.
    next_id: AtomicU64,
    fail_commits: AtomicUsize,
    fail_rollbacks: AtomicUsize,
}

/// In-memory implementation of [`UserDatabase`].
pub struct MemoryDatabase {
    inner: Arc<Inner>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(MemoryState::default()),
                next_id: AtomicU64::new(1),
                fail_commits: AtomicUsize::new(0),
                fail_rollbacks: AtomicUsize::new(0),
            }),
        }
    }

    /// Make the next `n` commits fail with a storage error.
    pub fn fail_next_commits(&self, n: usize) {
        self.inner.fail_commits.fetch_add(n, Ordering::SeqCst);
    }

    /// Make the next `n` rollbacks fail with a storage error.
    pub fn fail_next_rollbacks(&self, n: usize) {
        self.inner.fail_rollbacks.fetch_add(n, Ordering::SeqCst);
    }

    /// Number of committed rows, for test assertions.
    pub async fn committed_len(&self) -> usize {
        self.inner.state.read().await.users.len()
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDatabase for MemoryDatabase {
    async fn begin(&self) -> StoreResult<Box<dyn UserTx>> {
        Ok(Box::new(MemoryTx { inner: Arc::clone(&self.inner), staged: Vec::new() }))
    }
}

enum StagedOp {
    Insert(UserRecord),
    Update(UserRecord),
    Delete(u64),
}

struct MemoryTx {
    inner: Arc<Inner>,
    staged: Vec<StagedOp>,
}

impl MemoryTx {
    /// Committed row overlaid with this transaction's staged operations, so
    /// the transaction reads its own writes.
    fn overlay(&self, committed: Option<UserRecord>, id: u64) -> Option<UserRecord> {
        let mut current = committed;
        for op in &self.staged {
            match op {
                StagedOp::Insert(record) | StagedOp::Update(record) if record.id == id => {
                    current = Some(record.clone());
                }
                StagedOp::Delete(deleted) if *deleted == id => current = None,
                _ => {}
            }
        }
        current
    }

    fn name_taken(&self, state: &MemoryState, name: &str) -> bool {
        if let Some(id) = state.by_name.get(name) {
            if self.overlay(state.users.get(id).cloned(), *id).is_some() {
                return true;
            }
        }
        self.staged.iter().any(|op| match op {
            StagedOp::Insert(record) | StagedOp::Update(record) => record.name == name,
            StagedOp::Delete(_) => false,
        })
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl UserTx for MemoryTx {
    async fn insert_user(&mut self, name: &str, secret: &str, language: &str) -> StoreResult<u64> {
        let state = self.inner.state.read().await;
        if self.name_taken(&state, name) {
            return Err(StoreError::Conflict);
        }
        drop(state);

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        self.staged.push(StagedOp::Insert(UserRecord {
            id,
            name: name.to_string(),
            secret: secret.to_string(),
            language: language.to_string(),
        }));
        Ok(id)
    }

    async fn get_by_id(&mut self, id: u64) -> StoreResult<Option<UserRecord>> {
        let state = self.inner.state.read().await;
        Ok(self.overlay(state.users.get(&id).cloned(), id))
    }

    async fn get_by_name(&mut self, name: &str) -> StoreResult<Option<UserRecord>> {
        let state = self.inner.state.read().await;
        if let Some(id) = state.by_name.get(name) {
            if let Some(record) = self.overlay(state.users.get(id).cloned(), *id) {
                return Ok(Some(record));
            }
        }
        Ok(self
            .staged
            .iter()
            .rev()
            .find_map(|op| match op {
                StagedOp::Insert(record) | StagedOp::Update(record) if record.name == name => {
                    Some(record.clone())
                }
                _ => None,
            }))
    }

    async fn update_user(&mut self, record: &UserRecord) -> StoreResult<bool> {
        if self.get_by_id(record.id).await?.is_none() {
            return Ok(false);
        }
        self.staged.push(StagedOp::Update(record.clone()));
        Ok(true)
    }

    async fn delete_user(&mut self, id: u64) -> StoreResult<bool> {
        if self.get_by_id(id).await?.is_none() {
            return Ok(false);
        }
        self.staged.push(StagedOp::Delete(id));
        Ok(true)
    }

    async fn list_ids(&mut self) -> StoreResult<Vec<u64>> {
        let state = self.inner.state.read().await;
        let mut ids: Vec<u64> = state.users.keys().copied().collect();
        for op in &self.staged {
            match op {
                StagedOp::Insert(record) => ids.push(record.id),
                StagedOp::Delete(id) => ids.retain(|existing| existing != id),
                StagedOp::Update(_) => {}
            }
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if Self::take_failure(&self.inner.fail_commits) {
            // Staged writes are dropped with the transaction
            return Err(StoreError::Storage("injected commit failure".to_string()));
        }

        let mut state = self.inner.state.write().await;

        // Validate unique names against the committed state before touching
        // anything, so a failed commit leaves the table untouched.
        for op in &self.staged {
            if let StagedOp::Insert(record) = op {
                if let Some(existing) = state.by_name.get(&record.name) {
                    if *existing != record.id {
                        return Err(StoreError::Conflict);
                    }
                }
            }
        }

        for op in self.staged {
            match op {
                StagedOp::Insert(record) | StagedOp::Update(record) => {
                    if let Some(previous) = state.users.insert(record.id, record.clone()) {
                        state.by_name.remove(&previous.name);
                    }
                    state.by_name.insert(record.name, record.id);
                }
                StagedOp::Delete(id) => {
                    if let Some(record) = state.users.remove(&id) {
                        state.by_name.remove(&record.name);
                    }
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        if Self::take_failure(&self.inner.fail_rollbacks) {
            return Err(StoreError::Storage("injected rollback failure".to_string()));
        }
        Ok(())
    }
}

//! Commit-before-publish behavior of the primary store.

use std::sync::Arc;
use std::time::Duration;

use greeter_fixtures::FailingBus;
use greeter_repl::{BroadcastBus, ReplicaUserStore};
use greeter_store::{MemoryDatabase, PrimaryUserStore};
use greeter_types::{StoreError, UserEvent};

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_create_publishes_exactly_one_event_after_commit() {
    let db = Arc::new(MemoryDatabase::new());
    let bus = Arc::new(BroadcastBus::new());
    let store = PrimaryUserStore::new(db.clone(), bus.clone());

    let mut stream = bus.subscribe();
    let id = store.create_user("alice", "hunter2").await.unwrap();

    let payload = stream.recv().await.unwrap();
    assert_eq!(
        UserEvent::decode(&payload).unwrap(),
        UserEvent::Created { id, name: "alice".to_string() }
    );
    assert!(matches!(stream.try_recv(), Ok(None)));
}

#[tokio::test]
async fn test_failed_commit_publishes_nothing() {
    let db = Arc::new(MemoryDatabase::new());
    let bus = Arc::new(BroadcastBus::new());
    let store = PrimaryUserStore::new(db.clone(), bus.clone());

    let mut stream = bus.subscribe();
    db.fail_next_commits(1);

    assert!(store.create_user("alice", "hunter2").await.is_err());

    // Nothing persisted, nothing announced
    assert_eq!(db.committed_len().await, 0);
    assert!(matches!(stream.try_recv(), Ok(None)));

    // The next attempt goes through normally
    let id = store.create_user("alice", "hunter2").await.unwrap();
    let payload = stream.recv().await.unwrap();
    assert_eq!(UserEvent::decode(&payload).unwrap().user_id(), id);
}

#[tokio::test]
async fn test_publish_failure_is_degraded_success() {
    let db = Arc::new(MemoryDatabase::new());
    let store = PrimaryUserStore::new(db.clone(), Arc::new(FailingBus));

    // The commit decides the outcome; a dead bus only delays replicas
    let id = store.create_user("alice", "hunter2").await.unwrap();
    assert_eq!(store.get_user_by_id(id).await.unwrap().name, "alice");

    store.delete_user(id).await.unwrap();
    assert!(matches!(store.get_user_by_id(id).await, Err(StoreError::NotFound)));
}

#[tokio::test]
async fn test_delete_event_carries_pre_delete_name() {
    let db = Arc::new(MemoryDatabase::new());
    let bus = Arc::new(BroadcastBus::new());
    let store = PrimaryUserStore::new(db.clone(), bus.clone());

    let id = store.create_user("alice", "hunter2").await.unwrap();

    let mut stream = bus.subscribe();
    store.delete_user(id).await.unwrap();

    let payload = stream.recv().await.unwrap();
    assert_eq!(
        UserEvent::decode(&payload).unwrap(),
        UserEvent::Deleted { id, name: "alice".to_string() }
    );
}

#[tokio::test]
async fn test_replica_follows_primary() {
    // Six earlier users so the interesting one lands on a non-trivial id
    let seeded = greeter_fixtures::seeded_database(&[
        ("u1", "s"),
        ("u2", "s"),
        ("u3", "s"),
        ("u4", "s"),
        ("u5", "s"),
        ("u6", "s"),
    ])
    .await
    .unwrap();
    let db = Arc::new(seeded);
    let bus = Arc::new(BroadcastBus::new());
    let store = PrimaryUserStore::new(db.clone(), bus.clone());

    let replica = ReplicaUserStore::new();
    let _consumer = replica.spawn_consumer(bus.subscribe());

    let id = store.create_user("alice", "hunter2").await.unwrap();
    assert_eq!(id, 7);
    settle().await;

    let user = replica.get_user_by_id(7).await.unwrap();
    assert_eq!(user.name, "alice");
    assert_eq!(replica.get_user_by_name("alice").await.unwrap().id, 7);
    assert!(matches!(
        replica.get_user_by_id(8).await,
        Err(StoreError::NotFound)
    ));

    store.delete_user(7).await.unwrap();
    settle().await;

    assert!(matches!(
        replica.get_user_by_id(7).await,
        Err(StoreError::NotFound)
    ));
    assert!(replica.is_empty().await);
}

#[tokio::test]
async fn test_replica_misses_users_created_before_subscribing() {
    let seeded = greeter_fixtures::seeded_database(&[("alice", "a"), ("bob", "b")])
        .await
        .unwrap();
    let db = Arc::new(seeded);
    let bus = Arc::new(BroadcastBus::new());
    let store = PrimaryUserStore::new(db.clone(), bus.clone());

    let replica = ReplicaUserStore::new();
    let _consumer = replica.spawn_consumer(bus.subscribe());

    let id = store.create_user("carol", "c").await.unwrap();
    settle().await;

    // Only events published after the subscription exist in the projection
    assert_eq!(replica.len().await, 1);
    assert_eq!(replica.get_user_by_name("carol").await.unwrap().id, id);
    assert!(matches!(
        replica.get_user_by_name("alice").await,
        Err(StoreError::NotFound)
    ));
}

#[tokio::test]
async fn test_replica_never_sees_secrets() {
    let db = Arc::new(MemoryDatabase::new());
    let bus = Arc::new(BroadcastBus::new());
    let store = PrimaryUserStore::new(db.clone(), bus.clone());

    let mut stream = bus.subscribe();
    store.create_user("alice", "hunter2").await.unwrap();

    let payload = stream.recv().await.unwrap();
    assert!(!payload.contains("hunter2"));
}

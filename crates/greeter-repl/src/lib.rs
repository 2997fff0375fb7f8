//! # Greeter Repl - User Record Replication
//!
//! Carries user events from the login authority to greeter replicas.
//!
//! The bus offers at-most-once delivery per subscriber, no replay of messages
//! published before a subscription exists, and no ordering guarantee across
//! subscribers. Replicas are therefore eventually consistent and must apply
//! events idempotently.

use thiserror::Error;

pub mod bus;
pub mod greetings;
pub mod replica;

pub use bus::{BroadcastBus, BusConfig, BusStats, EventBus, EventStream};
pub use greetings::greet;
pub use replica::ReplicaUserStore;

/// Errors surfaced by the event bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus was unavailable at publish time. For post-commit publishes the
    /// caller logs this and reports a degraded success; replicas lag until
    /// reconciled.
    #[error("event publish failed: {0}")]
    Publish(String),

    /// Subscription could not be established.
    #[error("event subscribe failed: {0}")]
    Subscribe(String),
}

pub type BusResult<T> = std::result::Result<T, BusError>;

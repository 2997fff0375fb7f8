//! # Greeter Types
//!
//! Shared type definitions for the distributed greeter services.
//!
//! This crate provides the domain types used by both the login authority and
//! the greeter replica, ensuring a single source of truth and preventing
//! circular dependencies between the service crates.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Language used for users that have not chosen one yet.
pub const DEFAULT_LANGUAGE: &str = "en";

// ============================================================================
// Core Domain Types
// ============================================================================

/// A user as seen by read paths (replica lookups, profile handlers).
///
/// Carries no credential material; the secret never leaves the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub language: String,
}

/// A user row as owned by the authoritative store.
///
/// The `secret` field is an opaque credential compared byte-for-byte at login.
/// Strengthening it (hashing, salting) is explicitly out of scope here; the
/// comparison is at least constant-time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: u64,
    pub name: String,
    pub secret: String,
    pub language: String,
}

impl UserRecord {
    /// Compare a presented credential against the stored one in constant time.
    pub fn verify_secret(&self, presented: &str) -> bool {
        self.secret.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User { id: record.id, name: record.name, language: record.language }
    }
}

// ============================================================================
// User Events
// ============================================================================

const EVENT_TYPE_CREATED: u8 = 0;
const EVENT_TYPE_DELETED: u8 = 1;

/// A change to the authoritative user table, broadcast to replicas.
///
/// Produced exactly once per successful authoritative mutation, after the
/// mutation commits. Consumers must apply these idempotently: replicas can
/// miss events and duplicates are possible on reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    Created { id: u64, name: String },
    Deleted { id: u64, name: String },
}

/// On-wire shape: `{"type": <0|1>, "user_id": u64, "user_name": string}`.
#[derive(Debug, Serialize, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: u8,
    user_id: u64,
    user_name: String,
}

impl UserEvent {
    /// The id of the affected user.
    pub fn user_id(&self) -> u64 {
        match self {
            UserEvent::Created { id, .. } | UserEvent::Deleted { id, .. } => *id,
        }
    }

    /// The name of the affected user.
    pub fn user_name(&self) -> &str {
        match self {
            UserEvent::Created { name, .. } | UserEvent::Deleted { name, .. } => name,
        }
    }

    /// Serialize to the UTF-8 JSON wire format.
    pub fn encode(&self) -> String {
        let wire = match self {
            UserEvent::Created { id, name } => WireEvent {
                kind: EVENT_TYPE_CREATED,
                user_id: *id,
                user_name: name.clone(),
            },
            UserEvent::Deleted { id, name } => WireEvent {
                kind: EVENT_TYPE_DELETED,
                user_id: *id,
                user_name: name.clone(),
            },
        };
        // The wire struct contains nothing that can fail to serialize
        serde_json::to_string(&wire).expect("wire event serialization cannot fail")
    }

    /// Parse a wire payload back into an event.
    ///
    /// Unknown discriminators are reported separately from malformed JSON so
    /// that consumers can skip events published by newer producers without
    /// treating them as corruption.
    pub fn decode(payload: &str) -> Result<Self, EventDecodeError> {
        let wire: WireEvent = serde_json::from_str(payload)
            .map_err(|e| EventDecodeError::Malformed(e.to_string()))?;

        match wire.kind {
            EVENT_TYPE_CREATED => Ok(UserEvent::Created { id: wire.user_id, name: wire.user_name }),
            EVENT_TYPE_DELETED => Ok(UserEvent::Deleted { id: wire.user_id, name: wire.user_name }),
            other => Err(EventDecodeError::UnknownType(other)),
        }
    }
}

/// Failure to interpret an event payload received from the bus.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("malformed event payload: {0}")]
    Malformed(String),

    #[error("unknown event type {0}")]
    UnknownType(u8),
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors surfaced by the authoritative and replica user stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A user with the same name already exists.
    #[error("user already exists")]
    Conflict,

    /// No such user or session.
    #[error("not found")]
    NotFound,

    /// Presented credentials did not match. Deliberately carries no detail
    /// about which check failed.
    #[error("bad user or password")]
    BadCredentials,

    /// Backing store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A mutation failed and the rollback failed too; both causes are kept.
    #[error("storage error: {source}; rollback also failed: {rollback}")]
    RollbackFailed { r#source: String, rollback: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

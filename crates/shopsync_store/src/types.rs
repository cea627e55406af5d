//! Record types stored by the pending-update queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A JSON field map: field name to new value.
///
/// Payloads are opaque to the store; only the sync layer and the server
/// interpret individual fields.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

/// Locally unique identifier of a pending update.
///
/// Assigned by the store on enqueue, monotonically increasing. Ids are never
/// reused within one store directory, even after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateId(pub u64);

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the entity (e.g. a user profile) a mutation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    /// Creates a new owner id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OwnerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for OwnerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A locally queued mutation that has not necessarily reached the server.
///
/// # Lifecycle
///
/// Created with `synced == false` when a caller stages a mutation. The sync
/// layer flips `synced`, stamps `synced_at`, and bumps `retry_count`; the
/// record is deleted only after a confirmed sync (or by an explicit purge of
/// synced rows). An unsynced record is never silently dropped.
///
/// `awaiting_resolution` marks a record whose conflict requires user input:
/// it still counts as pending but automatic sync passes skip it until the
/// user picks a side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdate {
    /// Store-assigned surrogate key.
    pub id: UpdateId,
    /// Entity this mutation applies to.
    pub owner_id: OwnerId,
    /// Field name to new value.
    pub payload: FieldMap,
    /// When the mutation was queued.
    pub created_at: DateTime<Utc>,
    /// Whether the server has confirmed acceptance.
    pub synced: bool,
    /// When `synced` flipped to true.
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    /// Failed sync attempts so far. Monotonically non-decreasing.
    #[serde(default)]
    pub retry_count: u32,
    /// Set while a manual conflict resolution is outstanding.
    #[serde(default)]
    pub awaiting_resolution: bool,
}

impl PendingUpdate {
    /// Creates a fresh unsynced record.
    pub fn new(id: UpdateId, owner_id: OwnerId, payload: FieldMap) -> Self {
        Self {
            id,
            owner_id,
            payload,
            created_at: Utc::now(),
            synced: false,
            synced_at: None,
            retry_count: 0,
            awaiting_resolution: false,
        }
    }

    /// Returns true if this record should be attempted by a sync pass.
    pub fn is_syncable(&self) -> bool {
        !self.synced && !self.awaiting_resolution
    }
}

/// Last-known server state for one owner.
///
/// At most one snapshot per owner; cache refreshes overwrite the row
/// wholesale, there is no partial merge at this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEntity {
    /// Entity the snapshot belongs to.
    pub owner_id: OwnerId,
    /// Full entity state as last fetched from the server.
    pub data: FieldMap,
    /// When the cache row was written.
    pub last_updated: DateTime<Utc>,
}

impl CachedEntity {
    /// Creates a snapshot stamped with the current time.
    pub fn new(owner_id: OwnerId, data: FieldMap) -> Self {
        Self {
            owner_id,
            data,
            last_updated: Utc::now(),
        }
    }
}

//! Store backend trait definition.

use crate::error::StoreResult;
use crate::types::{CachedEntity, OwnerId, PendingUpdate, UpdateId};

/// A low-level backend for the pending-update store.
///
/// Backends hold two logical tables: pending updates (keyed by a
/// store-assigned auto-incrementing id) and cached entities (keyed by owner,
/// one row per owner). The queue layer owns all lifecycle semantics;
/// backends only put, get, scan, and delete records.
///
/// # Invariants
///
/// - `allocate_update_id` never returns the same id twice for one store
/// - `updates` returns records in ascending id order
/// - `put_update` with an existing id overwrites that record
/// - `put_cached_entity` overwrites any prior row for the same owner
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing and ephemeral sessions
/// - [`super::FileBackend`] - For persistent storage
pub trait StoreBackend: Send + Sync {
    /// Reserves the next update id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store is unavailable.
    fn allocate_update_id(&self) -> StoreResult<UpdateId>;

    /// Inserts or overwrites a pending-update record.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be made durable.
    fn put_update(&self, update: &PendingUpdate) -> StoreResult<()>;

    /// Fetches a single record by id.
    fn get_update(&self, id: UpdateId) -> StoreResult<Option<PendingUpdate>>;

    /// Returns all update records in ascending id order.
    fn updates(&self) -> StoreResult<Vec<PendingUpdate>>;

    /// Returns all records for one owner, in ascending id order.
    ///
    /// The default implementation scans [`StoreBackend::updates`]; backends
    /// with an owner index may override it.
    fn updates_by_owner(&self, owner: &OwnerId) -> StoreResult<Vec<PendingUpdate>> {
        Ok(self
            .updates()?
            .into_iter()
            .filter(|u| &u.owner_id == owner)
            .collect())
    }

    /// Returns all records matching the given synced flag, in id order.
    ///
    /// The default implementation scans [`StoreBackend::updates`]; backends
    /// with a synced index may override it.
    fn updates_by_synced(&self, synced: bool) -> StoreResult<Vec<PendingUpdate>> {
        Ok(self
            .updates()?
            .into_iter()
            .filter(|u| u.synced == synced)
            .collect())
    }

    /// Removes a record. Returns false if no such record existed.
    fn delete_update(&self, id: UpdateId) -> StoreResult<bool>;

    /// Inserts or overwrites the cached snapshot for an owner.
    fn put_cached_entity(&self, entity: &CachedEntity) -> StoreResult<()>;

    /// Fetches the cached snapshot for an owner.
    fn get_cached_entity(&self, owner: &OwnerId) -> StoreResult<Option<CachedEntity>>;
}

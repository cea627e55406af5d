//! The pending-update queue.

use crate::backend::StoreBackend;
use crate::error::StoreResult;
use crate::types::{CachedEntity, FieldMap, OwnerId, PendingUpdate, UpdateId};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Durable queue of unsynchronized mutations plus a per-owner entity cache.
///
/// The queue owns all record lifecycle semantics on top of a
/// [`StoreBackend`]: producers call [`UpdateQueue::enqueue`], the sync layer
/// flips sync/retry bookkeeping, and records are deleted only after a
/// confirmed sync or an explicit purge of synced rows.
///
/// # Shared-resource policy
///
/// This is the single shared mutable resource of the sync subsystem. Only
/// the sync manager mutates `synced`/`retry_count`/deletion; producers only
/// ever enqueue.
#[derive(Clone)]
pub struct UpdateQueue {
    backend: Arc<dyn StoreBackend>,
}

impl UpdateQueue {
    /// Creates a queue over the given backend.
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    /// Stages a mutation for the given owner.
    ///
    /// The record starts with `synced == false` and `retry_count == 0`.
    ///
    /// # Errors
    ///
    /// Fails only if the backing store is unavailable; callers should treat
    /// that as retryable.
    pub fn enqueue(&self, owner: OwnerId, payload: FieldMap) -> StoreResult<UpdateId> {
        let id = self.backend.allocate_update_id()?;
        let update = PendingUpdate::new(id, owner, payload);
        self.backend.put_update(&update)?;
        debug!(id = %id, owner = %update.owner_id, "queued update");
        Ok(id)
    }

    /// Returns unsynced records, optionally filtered by owner, in id order.
    ///
    /// Already-synced records are never returned, even when they have not
    /// been deleted yet.
    pub fn list_pending(&self, owner: Option<&OwnerId>) -> StoreResult<Vec<PendingUpdate>> {
        let unsynced = match owner {
            Some(owner) => self
                .backend
                .updates_by_owner(owner)?
                .into_iter()
                .filter(|u| !u.synced)
                .collect(),
            None => self.backend.updates_by_synced(false)?,
        };
        Ok(unsynced)
    }

    /// Marks a record as confirmed by the server.
    ///
    /// Returns false (not an error) when no such record exists.
    pub fn mark_synced(&self, id: UpdateId) -> StoreResult<bool> {
        let Some(mut update) = self.backend.get_update(id)? else {
            return Ok(false);
        };
        update.synced = true;
        update.synced_at = Some(Utc::now());
        update.awaiting_resolution = false;
        self.backend.put_update(&update)?;
        Ok(true)
    }

    /// Permanently removes a record. Idempotent.
    pub fn delete_by_id(&self, id: UpdateId) -> StoreResult<bool> {
        self.backend.delete_update(id)
    }

    /// Increments a record's failed-attempt counter.
    ///
    /// Returns the new count, or `None` when the record is gone.
    pub fn record_failed_attempt(&self, id: UpdateId) -> StoreResult<Option<u32>> {
        let Some(mut update) = self.backend.get_update(id)? else {
            return Ok(None);
        };
        update.retry_count += 1;
        let count = update.retry_count;
        self.backend.put_update(&update)?;
        Ok(Some(count))
    }

    /// Flags a record as waiting on manual conflict resolution.
    ///
    /// Flagged records still count as pending but sync passes skip them.
    pub fn mark_awaiting_resolution(&self, id: UpdateId) -> StoreResult<bool> {
        self.set_awaiting(id, true)
    }

    /// Clears the manual-resolution flag so the next pass retries the record.
    pub fn clear_awaiting_resolution(&self, id: UpdateId) -> StoreResult<bool> {
        self.set_awaiting(id, false)
    }

    fn set_awaiting(&self, id: UpdateId, awaiting: bool) -> StoreResult<bool> {
        let Some(mut update) = self.backend.get_update(id)? else {
            return Ok(false);
        };
        update.awaiting_resolution = awaiting;
        self.backend.put_update(&update)?;
        Ok(true)
    }

    /// Fetches a single record by id.
    pub fn get(&self, id: UpdateId) -> StoreResult<Option<PendingUpdate>> {
        self.backend.get_update(id)
    }

    /// Upserts the cached server snapshot for an owner.
    ///
    /// The prior snapshot is overwritten wholesale; there is no field-level
    /// merge at the cache layer.
    pub fn cache_entity(&self, owner: OwnerId, data: FieldMap) -> StoreResult<()> {
        self.backend.put_cached_entity(&CachedEntity::new(owner, data))
    }

    /// Returns the cached snapshot data for an owner, if any.
    pub fn cached_entity(&self, owner: &OwnerId) -> StoreResult<Option<FieldMap>> {
        Ok(self.backend.get_cached_entity(owner)?.map(|e| e.data))
    }

    /// Counts unsynced records, optionally per owner. Drives UI badges.
    pub fn count_pending(&self, owner: Option<&OwnerId>) -> StoreResult<usize> {
        Ok(self.list_pending(owner)?.len())
    }

    /// Deletes every synced record; returns how many were removed.
    ///
    /// Safe to run at any time: records with `synced == false` are never
    /// touched.
    pub fn purge_synced(&self) -> StoreResult<usize> {
        let synced = self.backend.updates_by_synced(true)?;
        let mut deleted = 0;
        for update in synced {
            if self.backend.delete_update(update.id)? {
                deleted += 1;
            }
        }
        if deleted > 0 {
            debug!(deleted, "purged synced updates");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use serde_json::json;

    fn queue() -> UpdateQueue {
        UpdateQueue::new(Arc::new(InMemoryBackend::new()))
    }

    fn payload(name: &str) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("name".into(), json!(name));
        map
    }

    #[test]
    fn enqueue_and_list_pending() {
        let queue = queue();
        let id = queue.enqueue(OwnerId::new("u1"), payload("Alice")).unwrap();

        let pending = queue.list_pending(Some(&OwnerId::new("u1"))).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert!(!pending[0].synced);
        assert_eq!(pending[0].retry_count, 0);
    }

    #[test]
    fn list_pending_excludes_synced() {
        let queue = queue();
        let first = queue.enqueue(OwnerId::new("u1"), payload("A")).unwrap();
        let second = queue.enqueue(OwnerId::new("u1"), payload("B")).unwrap();

        assert!(queue.mark_synced(first).unwrap());

        let pending = queue.list_pending(None).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
    }

    #[test]
    fn list_pending_preserves_insertion_order() {
        let queue = queue();
        let ids: Vec<_> = (0..5)
            .map(|i| queue.enqueue(OwnerId::new("u1"), payload(&format!("v{i}"))).unwrap())
            .collect();

        let pending = queue.list_pending(None).unwrap();
        let listed: Vec<_> = pending.iter().map(|u| u.id).collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn mark_synced_absent_returns_false() {
        let queue = queue();
        assert!(!queue.mark_synced(UpdateId(42)).unwrap());
    }

    #[test]
    fn mark_synced_stamps_time() {
        let queue = queue();
        let id = queue.enqueue(OwnerId::new("u1"), payload("A")).unwrap();

        assert!(queue.mark_synced(id).unwrap());
        let record = queue.get(id).unwrap().unwrap();
        assert!(record.synced);
        assert!(record.synced_at.is_some());
    }

    #[test]
    fn record_failed_attempt_is_monotonic() {
        let queue = queue();
        let id = queue.enqueue(OwnerId::new("u1"), payload("A")).unwrap();

        assert_eq!(queue.record_failed_attempt(id).unwrap(), Some(1));
        assert_eq!(queue.record_failed_attempt(id).unwrap(), Some(2));
        assert_eq!(queue.record_failed_attempt(id).unwrap(), Some(3));
        assert_eq!(queue.record_failed_attempt(UpdateId(999)).unwrap(), None);
    }

    #[test]
    fn awaiting_resolution_flags() {
        let queue = queue();
        let id = queue.enqueue(OwnerId::new("u1"), payload("A")).unwrap();

        assert!(queue.mark_awaiting_resolution(id).unwrap());
        let record = queue.get(id).unwrap().unwrap();
        assert!(record.awaiting_resolution);
        assert!(!record.is_syncable());
        // Still pending: never dropped while unsynced.
        assert_eq!(queue.count_pending(None).unwrap(), 1);

        assert!(queue.clear_awaiting_resolution(id).unwrap());
        assert!(queue.get(id).unwrap().unwrap().is_syncable());
    }

    #[test]
    fn cache_overwrites_not_merges() {
        let queue = queue();
        let owner = OwnerId::new("u1");

        let mut a = FieldMap::new();
        a.insert("name".into(), json!("Alice"));
        a.insert("city".into(), json!("Lima"));
        queue.cache_entity(owner.clone(), a).unwrap();

        let mut b = FieldMap::new();
        b.insert("name".into(), json!("Bob"));
        queue.cache_entity(owner.clone(), b.clone()).unwrap();

        let cached = queue.cached_entity(&owner).unwrap().unwrap();
        assert_eq!(cached, b);
        assert!(!cached.contains_key("city"));
    }

    #[test]
    fn cached_entity_absent_is_none() {
        let queue = queue();
        assert!(queue.cached_entity(&OwnerId::new("nobody")).unwrap().is_none());
    }

    #[test]
    fn count_pending_per_owner() {
        let queue = queue();
        queue.enqueue(OwnerId::new("u1"), payload("A")).unwrap();
        queue.enqueue(OwnerId::new("u1"), payload("B")).unwrap();
        queue.enqueue(OwnerId::new("u2"), payload("C")).unwrap();

        assert_eq!(queue.count_pending(None).unwrap(), 3);
        assert_eq!(queue.count_pending(Some(&OwnerId::new("u1"))).unwrap(), 2);
        assert_eq!(queue.count_pending(Some(&OwnerId::new("u3"))).unwrap(), 0);
    }

    #[test]
    fn purge_only_removes_synced() {
        let queue = queue();
        let first = queue.enqueue(OwnerId::new("u1"), payload("A")).unwrap();
        let _second = queue.enqueue(OwnerId::new("u1"), payload("B")).unwrap();
        let third = queue.enqueue(OwnerId::new("u2"), payload("C")).unwrap();

        queue.mark_synced(first).unwrap();
        queue.mark_synced(third).unwrap();

        let before = queue.count_pending(None).unwrap();
        assert_eq!(queue.purge_synced().unwrap(), 2);
        assert_eq!(queue.count_pending(None).unwrap(), before);

        // Nothing synced left; purge is a no-op.
        assert_eq!(queue.purge_synced().unwrap(), 0);
    }
}

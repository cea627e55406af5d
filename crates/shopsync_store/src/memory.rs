//! In-memory store backend for testing.

use crate::backend::StoreBackend;
use crate::error::{StoreError, StoreResult};
use crate::types::{CachedEntity, OwnerId, PendingUpdate, UpdateId};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// An in-memory store backend.
///
/// Suitable for unit tests, integration tests, and sessions that do not need
/// to survive a restart. Records live in a `BTreeMap` keyed by id, which
/// gives the ascending-id scan order the backend contract requires.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Failure injection
///
/// [`InMemoryBackend::set_unavailable`] makes every subsequent operation fail
/// with [`StoreError::Unavailable`], for exercising caller retry paths.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    updates: RwLock<BTreeMap<u64, PendingUpdate>>,
    entities: RwLock<HashMap<OwnerId, CachedEntity>>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl InMemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            updates: RwLock::new(BTreeMap::new()),
            entities: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulates the backing store going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the number of update records, synced or not.
    #[must_use]
    pub fn update_count(&self) -> usize {
        self.updates.read().len()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory backend offline".into()))
        } else {
            Ok(())
        }
    }
}

impl StoreBackend for InMemoryBackend {
    fn allocate_update_id(&self) -> StoreResult<UpdateId> {
        self.check_available()?;
        Ok(UpdateId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn put_update(&self, update: &PendingUpdate) -> StoreResult<()> {
        self.check_available()?;
        self.updates.write().insert(update.id.0, update.clone());
        Ok(())
    }

    fn get_update(&self, id: UpdateId) -> StoreResult<Option<PendingUpdate>> {
        self.check_available()?;
        Ok(self.updates.read().get(&id.0).cloned())
    }

    fn updates(&self) -> StoreResult<Vec<PendingUpdate>> {
        self.check_available()?;
        Ok(self.updates.read().values().cloned().collect())
    }

    fn delete_update(&self, id: UpdateId) -> StoreResult<bool> {
        self.check_available()?;
        Ok(self.updates.write().remove(&id.0).is_some())
    }

    fn put_cached_entity(&self, entity: &CachedEntity) -> StoreResult<()> {
        self.check_available()?;
        self.entities
            .write()
            .insert(entity.owner_id.clone(), entity.clone());
        Ok(())
    }

    fn get_cached_entity(&self, owner: &OwnerId) -> StoreResult<Option<CachedEntity>> {
        self.check_available()?;
        Ok(self.entities.read().get(owner).cloned())
    }
}

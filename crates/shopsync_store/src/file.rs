//! File-based store backend for persistent storage.

use crate::backend::StoreBackend;
use crate::error::{StoreError, StoreResult};
use crate::types::{CachedEntity, OwnerId, PendingUpdate, UpdateId};
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File names within the store directory.
const LOCK_FILE: &str = "LOCK";
const QUEUE_FILE: &str = "queue.json";
/// Temporary file for atomic queue writes.
const QUEUE_TEMP: &str = "queue.json.tmp";

/// Serialized form of the store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    next_update_id: u64,
    updates: Vec<PendingUpdate>,
    entities: Vec<CachedEntity>,
}

/// In-memory working state, rewritten to disk on every mutation.
#[derive(Debug, Default)]
struct State {
    next_update_id: u64,
    updates: BTreeMap<u64, PendingUpdate>,
    entities: HashMap<OwnerId, CachedEntity>,
}

impl State {
    fn from_document(doc: Document) -> Self {
        Self {
            next_update_id: doc.next_update_id,
            updates: doc.updates.into_iter().map(|u| (u.id.0, u)).collect(),
            entities: doc
                .entities
                .into_iter()
                .map(|e| (e.owner_id.clone(), e))
                .collect(),
        }
    }

    fn to_document(&self) -> Document {
        Document {
            next_update_id: self.next_update_id,
            updates: self.updates.values().cloned().collect(),
            entities: self.entities.values().cloned().collect(),
        }
    }
}

/// A file-based store backend.
///
/// The store lives in a directory:
///
/// ```text
/// <dir>/
/// ├─ LOCK          # Advisory lock for single-process access
/// └─ queue.json    # Pending updates + cached entities
/// ```
///
/// The LOCK file ensures only one process drains a given queue at a time.
/// Every mutation rewrites `queue.json` through a temp file and an atomic
/// rename, so a crash mid-write leaves the previous document intact.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    state: RwLock<State>,
    /// Held for the lifetime of the backend.
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the LOCK
    /// file, or an I/O / serialization error if the queue document cannot
    /// be read.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;

        let lock_path = dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked(dir.display().to_string()))?;

        let queue_path = dir.join(QUEUE_FILE);
        let state = if queue_path.exists() {
            let bytes = fs::read(&queue_path)?;
            State::from_document(serde_json::from_slice(&bytes)?)
        } else {
            State::default()
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            state: RwLock::new(state),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes the document via a temp file and an atomic rename.
    fn persist(&self, state: &State) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&state.to_document())?;

        let temp_path = self.dir.join(QUEUE_TEMP);
        {
            let mut file = File::create(&temp_path)?;
            use std::io::Write;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, self.dir.join(QUEUE_FILE))?;
        Ok(())
    }
}

impl StoreBackend for FileBackend {
    fn allocate_update_id(&self) -> StoreResult<UpdateId> {
        let mut state = self.state.write();
        state.next_update_id += 1;
        let id = UpdateId(state.next_update_id);
        // Persisted immediately so ids survive a restart un-reused.
        self.persist(&state)?;
        Ok(id)
    }

    fn put_update(&self, update: &PendingUpdate) -> StoreResult<()> {
        let mut state = self.state.write();
        state.updates.insert(update.id.0, update.clone());
        self.persist(&state)
    }

    fn get_update(&self, id: UpdateId) -> StoreResult<Option<PendingUpdate>> {
        Ok(self.state.read().updates.get(&id.0).cloned())
    }

    fn updates(&self) -> StoreResult<Vec<PendingUpdate>> {
        Ok(self.state.read().updates.values().cloned().collect())
    }

    fn delete_update(&self, id: UpdateId) -> StoreResult<bool> {
        let mut state = self.state.write();
        let removed = state.updates.remove(&id.0).is_some();
        if removed {
            self.persist(&state)?;
        }
        Ok(removed)
    }

    fn put_cached_entity(&self, entity: &CachedEntity) -> StoreResult<()> {
        let mut state = self.state.write();
        state
            .entities
            .insert(entity.owner_id.clone(), entity.clone());
        self.persist(&state)
    }

    fn get_cached_entity(&self, owner: &OwnerId) -> StoreResult<Option<CachedEntity>> {
        Ok(self.state.read().entities.get(owner).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldMap;
    use serde_json::json;

    fn payload(name: &str) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("name".into(), json!(name));
        map
    }

    #[test]
    fn open_creates_directory_and_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("store");

        let backend = FileBackend::open(&dir).unwrap();
        assert!(dir.join(LOCK_FILE).exists());
        assert_eq!(backend.updates().unwrap().len(), 0);
    }

    #[test]
    fn records_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();

        let id = {
            let backend = FileBackend::open(&dir).unwrap();
            let id = backend.allocate_update_id().unwrap();
            let update = PendingUpdate::new(id, OwnerId::new("u1"), payload("Alice"));
            backend.put_update(&update).unwrap();

            let mut data = FieldMap::new();
            data.insert("name".into(), json!("Alice"));
            backend
                .put_cached_entity(&CachedEntity::new(OwnerId::new("u1"), data))
                .unwrap();
            id
        };

        let backend = FileBackend::open(&dir).unwrap();
        let restored = backend.get_update(id).unwrap().unwrap();
        assert_eq!(restored.owner_id, OwnerId::new("u1"));
        assert_eq!(restored.payload, payload("Alice"));
        assert!(backend
            .get_cached_entity(&OwnerId::new("u1"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn ids_not_reused_after_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();

        let first = {
            let backend = FileBackend::open(&dir).unwrap();
            backend.allocate_update_id().unwrap()
        };

        let backend = FileBackend::open(&dir).unwrap();
        let second = backend.allocate_update_id().unwrap();
        assert!(second > first);
    }

    #[test]
    fn second_open_is_rejected_while_locked() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_path_buf();

        let _backend = FileBackend::open(&dir).unwrap();
        let result = FileBackend::open(&dir);
        assert!(matches!(result, Err(StoreError::Locked(_))));
    }

    #[test]
    fn delete_absent_does_not_rewrite() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(tmp.path()).unwrap();

        assert!(!backend.delete_update(UpdateId(99)).unwrap());
    }
}

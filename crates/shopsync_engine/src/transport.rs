//! Transport layer abstraction for sync operations.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use shopsync_store::{FieldMap, OwnerId};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Server verdict on a pushed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushOutcome {
    /// True when the server persisted the mutation.
    pub accepted: bool,
    /// Server-provided detail, mostly useful on rejection.
    pub message: Option<String>,
}

impl PushOutcome {
    /// An accepted push.
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            message: None,
        }
    }

    /// A rejected push with a reason.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            message: Some(message.into()),
        }
    }
}

/// An update transport handles communication with the update endpoint.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process test server, mock for testing).
/// Implementations own their request timeout; a hung request must resolve
/// (or fail) within it so a sync pass can always finish.
pub trait UpdateTransport: Send + Sync {
    /// Submits an update's payload for the given owner.
    ///
    /// Transport problems are errors; a reachable server that declines the
    /// mutation is an `Ok` with `accepted == false`.
    fn push_update(&self, owner: &OwnerId, payload: &FieldMap) -> SyncResult<PushOutcome>;

    /// Fetches the current server-side entity state for an owner.
    ///
    /// Returns `None` when the server has no entity for this owner.
    fn fetch_entity(&self, owner: &OwnerId) -> SyncResult<Option<FieldMap>>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> SyncResult<()>;
}

/// Scripted behavior for one [`MockTransport::push_update`] call.
#[derive(Debug, Clone)]
pub enum ScriptedPush {
    /// Server accepts the mutation.
    Accept,
    /// Server declines the mutation.
    Reject(String),
    /// The request fails at the transport level.
    Fail(String),
    /// The call blocks for the given time, then accepts.
    Slow(Duration),
}

/// A mock transport for testing.
///
/// Push behavior is scripted per call via a queue; once the queue is empty
/// every push is accepted. Entities served by `fetch_entity` are set
/// directly. All accepted/attempted pushes are recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    connected: AtomicBool,
    script: Mutex<VecDeque<ScriptedPush>>,
    entities: Mutex<HashMap<OwnerId, FieldMap>>,
    pushed: Mutex<Vec<(OwnerId, FieldMap)>>,
}

impl MockTransport {
    /// Creates a connected mock with an empty script.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            entities: Mutex::new(HashMap::new()),
            pushed: Mutex::new(Vec::new()),
        }
    }

    /// Appends a scripted outcome for the next unscripted push call.
    pub fn script_push(&self, outcome: ScriptedPush) {
        self.script.lock().push_back(outcome);
    }

    /// Scripts `count` consecutive transport failures.
    pub fn script_failures(&self, count: usize) {
        let mut script = self.script.lock();
        for _ in 0..count {
            script.push_back(ScriptedPush::Fail("connection refused".into()));
        }
    }

    /// Sets the entity state served for an owner.
    pub fn set_entity(&self, owner: OwnerId, data: FieldMap) {
        self.entities.lock().insert(owner, data);
    }

    /// Removes the entity state for an owner.
    pub fn clear_entity(&self, owner: &OwnerId) {
        self.entities.lock().remove(owner);
    }

    /// Returns every payload handed to `push_update`, in call order.
    pub fn pushed(&self) -> Vec<(OwnerId, FieldMap)> {
        self.pushed.lock().clone()
    }

    /// Returns how many times `push_update` was called.
    pub fn push_count(&self) -> usize {
        self.pushed.lock().len()
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl UpdateTransport for MockTransport {
    fn push_update(&self, owner: &OwnerId, payload: &FieldMap) -> SyncResult<PushOutcome> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        self.pushed.lock().push((owner.clone(), payload.clone()));

        match self.script.lock().pop_front() {
            None | Some(ScriptedPush::Accept) => Ok(PushOutcome::accepted()),
            Some(ScriptedPush::Reject(reason)) => Ok(PushOutcome::rejected(reason)),
            Some(ScriptedPush::Fail(message)) => Err(SyncError::transport_retryable(message)),
            Some(ScriptedPush::Slow(delay)) => {
                std::thread::sleep(delay);
                Ok(PushOutcome::accepted())
            }
        }
    }

    fn fetch_entity(&self, owner: &OwnerId) -> SyncResult<Option<FieldMap>> {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        Ok(self.entities.lock().get(owner).cloned())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> SyncResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("name".into(), json!("Alice"));
        map
    }

    #[test]
    fn mock_accepts_by_default() {
        let transport = MockTransport::new();
        let outcome = transport
            .push_update(&OwnerId::new("u1"), &payload())
            .unwrap();
        assert!(outcome.accepted);
        assert_eq!(transport.push_count(), 1);
    }

    #[test]
    fn mock_scripted_outcomes_in_order() {
        let transport = MockTransport::new();
        transport.script_push(ScriptedPush::Reject("stale".into()));
        transport.script_push(ScriptedPush::Fail("timeout".into()));

        let owner = OwnerId::new("u1");
        let first = transport.push_update(&owner, &payload()).unwrap();
        assert!(!first.accepted);

        let second = transport.push_update(&owner, &payload());
        assert!(matches!(second, Err(SyncError::Transport { .. })));

        // Script exhausted: back to accepting.
        assert!(transport.push_update(&owner, &payload()).unwrap().accepted);
    }

    #[test]
    fn mock_serves_entities() {
        let transport = MockTransport::new();
        let owner = OwnerId::new("u1");
        assert!(transport.fetch_entity(&owner).unwrap().is_none());

        transport.set_entity(owner.clone(), payload());
        assert_eq!(transport.fetch_entity(&owner).unwrap(), Some(payload()));

        transport.clear_entity(&owner);
        assert!(transport.fetch_entity(&owner).unwrap().is_none());
    }

    #[test]
    fn mock_disconnected_fails() {
        let transport = MockTransport::new();
        transport.close().unwrap();
        assert!(!transport.is_connected());

        let result = transport.push_update(&OwnerId::new("u1"), &payload());
        assert!(matches!(result, Err(SyncError::NotConnected)));
    }
}

//! Sync lifecycle events and the listener registry.

use parking_lot::RwLock;
use shopsync_store::{OwnerId, UpdateId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// A sync lifecycle notification.
///
/// Drives UI surfaces (spinner, pending badge, failure toasts); the engine
/// itself never depends on listeners running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync pass began draining the queue.
    Started,
    /// A sync pass finished.
    Completed {
        /// Items attempted this pass.
        total: usize,
        /// Items confirmed by the server.
        succeeded: usize,
        /// Items that failed and stay queued.
        failed: usize,
    },
    /// An item exhausted its retry budget. It stays queued.
    UpdateFailed {
        /// The failing update.
        id: UpdateId,
        /// Its owner.
        owner_id: OwnerId,
        /// Cumulative failed attempts.
        retry_count: u32,
    },
    /// A divergence with server state was detected for an owner.
    ConflictDetected {
        /// The affected owner.
        owner_id: OwnerId,
    },
}

/// Handle for removing a registered sync listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncListenerId(u64);

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

/// Listener registry with protected dispatch.
///
/// A panicking listener is logged and skipped; it never aborts the
/// notification loop or the sync pass driving it.
#[derive(Default)]
pub(crate) struct SyncListeners {
    listeners: RwLock<Vec<(SyncListenerId, Listener)>>,
    next_id: AtomicU64,
}

impl SyncListeners {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add<F>(&self, listener: F) -> SyncListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let id = SyncListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn remove(&self, id: SyncListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub(crate) fn notify(&self, event: &SyncEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                warn!(?event, "sync listener panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn listeners_receive_events() {
        let listeners = SyncListeners::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        listeners.add(move |event| sink.lock().push(event.clone()));

        listeners.notify(&SyncEvent::Started);
        listeners.notify(&SyncEvent::Completed {
            total: 2,
            succeeded: 1,
            failed: 1,
        });

        assert_eq!(seen.lock().len(), 2);
        assert_eq!(seen.lock()[0], SyncEvent::Started);
    }

    #[test]
    fn removed_listener_is_silent() {
        let listeners = SyncListeners::new();
        let seen = Arc::new(Mutex::new(0usize));

        let sink = Arc::clone(&seen);
        let id = listeners.add(move |_| *sink.lock() += 1);

        listeners.notify(&SyncEvent::Started);
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.notify(&SyncEvent::Started);

        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let listeners = SyncListeners::new();
        let seen = Arc::new(Mutex::new(0usize));

        listeners.add(|_| panic!("bad listener"));
        let sink = Arc::clone(&seen);
        listeners.add(move |_| *sink.lock() += 1);

        listeners.notify(&SyncEvent::Started);
        assert_eq!(*seen.lock(), 1);
    }
}

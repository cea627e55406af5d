//! Connectivity state machine and listener registry.

use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// A connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// Connectivity was restored.
    Online,
    /// Connectivity was lost.
    Offline,
}

/// Snapshot of the current connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityStatus {
    /// True when the monitor last observed a working connection.
    pub is_online: bool,
}

/// Handle for removing a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(ConnectivityEvent, bool) + Send + Sync>;
type SyncTrigger = Arc<dyn Fn() + Send + Sync>;

/// Source of truth for whether a connection is believed to exist.
///
/// Implementations typically issue a cheap request against a known endpoint.
/// Used by the optional polling fallback; the primary signal is the hosting
/// environment calling [`ConnectivityMonitor::set_online`] directly.
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true if the network currently appears reachable.
    fn probe(&self) -> bool;
}

struct Poller {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Tracks online/offline transitions and notifies interested parties.
///
/// Two states, `Online` and `Offline`. Transitions are externally triggered
/// via [`ConnectivityMonitor::set_online`]; an optional background poller can
/// drive the same entry point as a fallback. Repeated same-state reports are
/// no-ops, so rapid flapping produces exactly one notification per genuine
/// transition.
///
/// The sync trigger (see [`ConnectivityMonitor::set_sync_trigger`]) fires
/// once per `Offline → Online` transition, independent of how many listeners
/// are registered. Nothing fires on `Online → Offline`.
pub struct ConnectivityMonitor {
    online: AtomicBool,
    listeners: RwLock<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    sync_trigger: RwLock<Option<SyncTrigger>>,
    poller: Mutex<Option<Poller>>,
}

impl ConnectivityMonitor {
    /// Creates a monitor with the platform-reported initial state.
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
            sync_trigger: RwLock::new(None),
            poller: Mutex::new(None),
        }
    }

    /// Returns the current status.
    pub fn status(&self) -> ConnectivityStatus {
        ConnectivityStatus {
            is_online: self.online.load(Ordering::SeqCst),
        }
    }

    /// Convenience accessor for the online flag.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Registers a listener invoked on every transition.
    ///
    /// The callback receives the event and the new online flag. A panicking
    /// listener is logged and does not prevent later listeners from running.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(ConnectivityEvent, bool) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was already gone.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Installs the callback fired once per `Offline → Online` transition.
    ///
    /// Kept as a plain callback so the sync layer can hook in without this
    /// crate depending on it.
    pub fn set_sync_trigger<F>(&self, trigger: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.sync_trigger.write() = Some(Arc::new(trigger));
    }

    /// Reports the platform-observed connectivity state.
    ///
    /// The transition (if any) is decided atomically, so concurrent reports
    /// of the same state collapse into a single notification round.
    pub fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return;
        }

        let event = if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        };
        debug!(?event, "connectivity transition");

        self.notify(event, online);

        if online {
            let trigger = self.sync_trigger.read().clone();
            if let Some(trigger) = trigger {
                trigger();
            }
        }
    }

    /// Invokes every listener in a protected context.
    fn notify(&self, event: ConnectivityEvent, online: bool) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            let result = catch_unwind(AssertUnwindSafe(|| listener(event, online)));
            if result.is_err() {
                warn!(?event, "connectivity listener panicked");
            }
        }
    }

    /// Starts the polling fallback.
    ///
    /// The probe is consulted every `interval`; its answer feeds
    /// [`ConnectivityMonitor::set_online`], so same-state answers are cheap
    /// no-ops. Calling this while a poller is running replaces it.
    pub fn start_polling(
        self: &Arc<Self>,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
    ) {
        self.stop_polling();

        let (stop_tx, stop_rx) = mpsc::channel();
        // The poller holds only a weak handle so the monitor can be dropped
        // while polling is active.
        let monitor = Arc::downgrade(self);
        let handle = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let Some(monitor) = monitor.upgrade() else { break };
                    monitor.set_online(probe.probe());
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        *self.poller.lock() = Some(Poller { stop_tx, handle });
    }

    /// Stops the polling fallback. Safe to call when not polling.
    pub fn stop_polling(&self) {
        if let Some(poller) = self.poller.lock().take() {
            let _ = poller.stop_tx.send(());
            // A listener running on the poller thread may call this; never
            // join the current thread.
            if std::thread::current().id() != poller.handle.thread().id() {
                let _ = poller.handle.join();
            }
        }
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

//! The sync manager: drains the pending-update queue against the server.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::events::{SyncEvent, SyncListenerId, SyncListeners};
use crate::transport::UpdateTransport;
use parking_lot::{Mutex, RwLock};
use shopsync_conflict::{ConflictResolver, ResolutionAction};
use shopsync_connectivity::ConnectivityMonitor;
use shopsync_store::{FieldMap, PendingUpdate, UpdateId, UpdateQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a sync call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another pass holds the sync lock.
    AlreadyRunning,
    /// The monitor reports no connectivity.
    Offline,
}

/// Per-pass bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items attempted this pass.
    pub total: usize,
    /// Items confirmed by the server.
    pub succeeded: usize,
    /// Items that failed and stay queued.
    pub failed: usize,
    /// Items parked this pass awaiting manual resolution.
    pub deferred: usize,
}

/// Result of one sync call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The call returned without draining (see [`SkipReason`]).
    Skipped(SkipReason),
    /// A drain pass ran to completion.
    Completed(SyncReport),
}

impl SyncOutcome {
    /// Returns the report when a pass actually ran.
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }

    /// Returns true when the call was a no-op.
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }
}

/// Snapshot of the manager's externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    /// A pass is currently draining the queue.
    pub is_syncing: bool,
    /// The connectivity monitor's current answer.
    pub is_online: bool,
    /// The periodic timer is running.
    pub auto_sync_enabled: bool,
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Total sync passes completed.
    pub passes_completed: u64,
    /// Total items confirmed by the server.
    pub updates_synced: u64,
    /// Total failed item attempts.
    pub updates_failed: u64,
    /// Total conflicts detected.
    pub conflicts_detected: u64,
    /// Last error message, cleared by a fully clean pass.
    pub last_error: Option<String>,
}

/// Outcome of processing one pending item.
enum ItemResult {
    Synced,
    Failed,
    Deferred,
}

/// Releases the sync lock on every exit path, panics included.
struct SyncingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

struct AutoSync {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Picks the wait before the next automatic pass.
///
/// A pass that left failures behind retries sooner than the full interval.
fn next_wait(outcome: SyncOutcome, interval: Duration, retry_delay: Duration) -> Duration {
    match outcome {
        SyncOutcome::Completed(report) if report.failed > 0 => retry_delay.min(interval),
        _ => interval,
    }
}

/// Owns the synchronization loop.
///
/// At most one drain pass runs at a time, items are processed sequentially
/// in queue order, and every per-item transport or storage error is
/// converted into retry bookkeeping rather than propagated. An unsynced
/// item is never deleted; after `max_retries` cumulative failures it is
/// reported via [`SyncEvent::UpdateFailed`] and stays queued for later
/// passes.
pub struct SyncManager {
    config: SyncConfig,
    queue: UpdateQueue,
    monitor: Arc<ConnectivityMonitor>,
    transport: Arc<dyn UpdateTransport>,
    resolver: Arc<ConflictResolver>,
    is_syncing: AtomicBool,
    auto_sync_enabled: AtomicBool,
    auto_sync: Mutex<Option<AutoSync>>,
    listeners: SyncListeners,
    stats: RwLock<SyncStats>,
}

impl SyncManager {
    /// Creates a new sync manager.
    ///
    /// Components are injected once at construction; the manager never
    /// reaches for ambient state.
    pub fn new(
        config: SyncConfig,
        queue: UpdateQueue,
        monitor: Arc<ConnectivityMonitor>,
        transport: Arc<dyn UpdateTransport>,
        resolver: Arc<ConflictResolver>,
    ) -> Self {
        Self {
            config,
            queue,
            monitor,
            transport,
            resolver,
            is_syncing: AtomicBool::new(false),
            auto_sync_enabled: AtomicBool::new(false),
            auto_sync: Mutex::new(None),
            listeners: SyncListeners::new(),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Hooks this manager into the monitor's reconnect trigger.
    ///
    /// The monitor keeps only a weak handle, so the dependency graph stays
    /// acyclic and the manager can still be dropped.
    pub fn install_sync_trigger(self: &Arc<Self>) {
        let weak: Weak<SyncManager> = Arc::downgrade(self);
        self.monitor.set_sync_trigger(move || {
            if let Some(manager) = weak.upgrade() {
                let _ = manager.sync();
            }
        });
    }

    /// Returns the externally visible status.
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            is_syncing: self.is_syncing.load(Ordering::SeqCst),
            is_online: self.monitor.is_online(),
            auto_sync_enabled: self.auto_sync_enabled.load(Ordering::SeqCst),
        }
    }

    /// Returns a copy of the running statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Registers a lifecycle listener.
    pub fn add_listener<F>(&self, listener: F) -> SyncListenerId
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        self.listeners.add(listener)
    }

    /// Removes a lifecycle listener.
    pub fn remove_listener(&self, id: SyncListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Runs one drain pass.
    ///
    /// Returns immediately when offline or when another pass is already
    /// running; otherwise drains every syncable pending item sequentially
    /// in queue order. Never returns an error: storage and transport
    /// failures become per-item bookkeeping.
    pub fn sync(&self) -> SyncOutcome {
        if !self.monitor.is_online() {
            debug!("sync skipped: offline");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }
        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync skipped: another pass is running");
            return SyncOutcome::Skipped(SkipReason::AlreadyRunning);
        }
        let _guard = SyncingGuard {
            flag: &self.is_syncing,
        };

        self.listeners.notify(&SyncEvent::Started);

        let pending = match self.queue.list_pending(None) {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "could not read pending updates");
                self.stats.write().last_error = Some(e.to_string());
                self.listeners.notify(&SyncEvent::Completed {
                    total: 0,
                    succeeded: 0,
                    failed: 0,
                });
                return SyncOutcome::Completed(SyncReport::default());
            }
        };

        // Items parked on a manual conflict stay untouched until resolved.
        let syncable: Vec<PendingUpdate> =
            pending.into_iter().filter(|u| u.is_syncable()).collect();

        let mut report = SyncReport {
            total: syncable.len(),
            ..SyncReport::default()
        };

        for update in &syncable {
            match self.sync_update(update) {
                ItemResult::Synced => report.succeeded += 1,
                ItemResult::Failed => report.failed += 1,
                ItemResult::Deferred => report.deferred += 1,
            }
        }

        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.updates_synced += report.succeeded as u64;
            stats.updates_failed += report.failed as u64;
            if report.failed == 0 {
                stats.last_error = None;
            }
        }

        self.listeners.notify(&SyncEvent::Completed {
            total: report.total,
            succeeded: report.succeeded,
            failed: report.failed,
        });
        if report.total > 0 {
            info!(
                total = report.total,
                succeeded = report.succeeded,
                failed = report.failed,
                deferred = report.deferred,
                "sync pass finished"
            );
        }
        SyncOutcome::Completed(report)
    }

    /// Runs a pass immediately, bypassing the timer.
    ///
    /// Still respects the mutual-exclusion gate.
    pub fn force_sync(&self) -> SyncOutcome {
        self.sync()
    }

    /// Starts the periodic timer.
    ///
    /// Performs one immediate pass when online, then one pass per interval.
    /// A pass that left failures behind is retried after the (shorter)
    /// retry delay. Replaces any previously running timer.
    pub fn start_auto_sync(self: &Arc<Self>) {
        self.stop_auto_sync();
        self.auto_sync_enabled.store(true, Ordering::SeqCst);

        let (stop_tx, stop_rx) = mpsc::channel();
        let weak: Weak<SyncManager> = Arc::downgrade(self);
        let interval = self.config.sync_interval;
        let retry_delay = self.config.retry_delay;

        let handle = std::thread::spawn(move || {
            let mut wait = interval;
            if let Some(manager) = weak.upgrade() {
                if manager.monitor.is_online() {
                    wait = next_wait(manager.sync(), interval, retry_delay);
                }
            }
            loop {
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => {
                        let Some(manager) = weak.upgrade() else { break };
                        wait = if manager.monitor.is_online() {
                            next_wait(manager.sync(), interval, retry_delay)
                        } else {
                            interval
                        };
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        *self.auto_sync.lock() = Some(AutoSync { stop_tx, handle });
    }

    /// Cancels the periodic timer. Safe to call when not started.
    pub fn stop_auto_sync(&self) {
        self.auto_sync_enabled.store(false, Ordering::SeqCst);
        if let Some(auto) = self.auto_sync.lock().take() {
            let _ = auto.stop_tx.send(());
            // A listener running on the timer thread may call this; never
            // join the current thread.
            if std::thread::current().id() != auto.handle.thread().id() {
                let _ = auto.handle.join();
            }
        }
    }

    /// Applies the user's choice for an item parked on a manual conflict.
    ///
    /// `UseServer` adopts the server's current state and retires the item;
    /// `UseLocal` re-arms it so the next pass pushes the local payload.
    /// Returns false when the item does not exist or is not parked.
    pub fn resolve_manual(&self, id: UpdateId, action: ResolutionAction) -> SyncResult<bool> {
        let Some(update) = self.queue.get(id)? else {
            return Ok(false);
        };
        if !update.awaiting_resolution {
            return Ok(false);
        }

        match action {
            ResolutionAction::UseServer => {
                if let Some(server) = self.transport.fetch_entity(&update.owner_id)? {
                    self.queue.cache_entity(update.owner_id.clone(), server)?;
                }
                self.queue.mark_synced(id)?;
                self.schedule_deletion(id);
            }
            ResolutionAction::UseLocal => {
                self.queue.clear_awaiting_resolution(id)?;
            }
        }
        info!(id = %id, ?action, "manual conflict resolved");
        Ok(true)
    }

    /// Processes one pending item; all errors become retry bookkeeping.
    fn sync_update(&self, update: &PendingUpdate) -> ItemResult {
        let server_state = match self.transport.fetch_entity(&update.owner_id) {
            Ok(state) => state,
            Err(e) => {
                debug!(id = %update.id, error = %e, "entity fetch failed");
                return self.record_failure(update);
            }
        };

        if let Some(state) = &server_state {
            // Read-through cache of last-known-server state.
            if let Err(e) = self.queue.cache_entity(update.owner_id.clone(), state.clone()) {
                warn!(owner = %update.owner_id, error = %e, "could not refresh entity cache");
            }
        }

        if let Some(conflict) = self.resolver.detect_conflict(update, server_state.as_ref()) {
            self.stats.write().conflicts_detected += 1;
            self.listeners.notify(&SyncEvent::ConflictDetected {
                owner_id: update.owner_id.clone(),
            });

            match self.resolver.resolve(&conflict) {
                Ok(resolution) => match resolution.action {
                    ResolutionAction::UseServer => {
                        // Server wins: adopt its state, drop the local push.
                        return self.accept_server_state(update, resolution.data);
                    }
                    ResolutionAction::UseLocal => {
                        debug!(id = %update.id, reason = %resolution.reason, "pushing local side of conflict");
                    }
                },
                Err(e) if e.is_unresolved() => {
                    debug!(id = %update.id, "conflict awaits manual resolution");
                    if let Err(e) = self.queue.mark_awaiting_resolution(update.id) {
                        warn!(id = %update.id, error = %e, "could not park update");
                        return ItemResult::Failed;
                    }
                    return ItemResult::Deferred;
                }
                Err(e) => {
                    warn!(id = %update.id, error = %e, "conflict resolution failed");
                    return self.record_failure(update);
                }
            }
        }

        match self.transport.push_update(&update.owner_id, &update.payload) {
            Ok(outcome) if outcome.accepted => self.finish_synced(update),
            Ok(outcome) => {
                debug!(id = %update.id, message = ?outcome.message, "server declined update");
                self.record_failure(update)
            }
            Err(e) => {
                debug!(id = %update.id, error = %e, "push failed");
                self.record_failure(update)
            }
        }
    }

    /// Caches the winning server state and retires the local item.
    fn accept_server_state(&self, update: &PendingUpdate, data: FieldMap) -> ItemResult {
        if let Err(e) = self.queue.cache_entity(update.owner_id.clone(), data) {
            warn!(id = %update.id, error = %e, "could not cache winning server state");
            return self.record_failure(update);
        }
        self.finish_synced(update)
    }

    /// Marks an item synced and schedules its physical deletion.
    fn finish_synced(&self, update: &PendingUpdate) -> ItemResult {
        match self.queue.mark_synced(update.id) {
            Ok(_) => {
                self.schedule_deletion(update.id);
                ItemResult::Synced
            }
            Err(e) => {
                warn!(id = %update.id, error = %e, "could not mark update synced");
                self.record_failure(update)
            }
        }
    }

    /// Deletes the record after the grace delay (inline when zero), so
    /// readers of pending state during the same tick still see it.
    fn schedule_deletion(&self, id: UpdateId) {
        let grace = self.config.deletion_grace;
        if grace.is_zero() {
            if let Err(e) = self.queue.delete_by_id(id) {
                warn!(id = %id, error = %e, "could not delete synced update");
            }
            return;
        }

        let queue = self.queue.clone();
        std::thread::spawn(move || {
            std::thread::sleep(grace);
            if let Err(e) = queue.delete_by_id(id) {
                warn!(id = %id, error = %e, "could not delete synced update");
            }
        });
    }

    /// Bumps the item's retry counter and reports budget exhaustion.
    fn record_failure(&self, update: &PendingUpdate) -> ItemResult {
        match self.queue.record_failed_attempt(update.id) {
            Ok(Some(count)) => {
                if count >= self.config.max_retries {
                    warn!(id = %update.id, retries = count, "update exhausted its retry budget");
                    self.listeners.notify(&SyncEvent::UpdateFailed {
                        id: update.id,
                        owner_id: update.owner_id.clone(),
                        retry_count: count,
                    });
                }
                ItemResult::Failed
            }
            Ok(None) => ItemResult::Failed,
            Err(e) => {
                warn!(id = %update.id, error = %e, "could not record failed attempt");
                ItemResult::Failed
            }
        }
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.stop_auto_sync();
    }
}

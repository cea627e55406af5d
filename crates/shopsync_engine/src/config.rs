//! Configuration for the sync manager.

use std::time::Duration;

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between automatic sync passes.
    pub sync_interval: Duration,
    /// Shortened wait before the next automatic pass when the previous one
    /// left failed items behind.
    pub retry_delay: Duration,
    /// Failed attempts per item before `UpdateFailed` is reported.
    pub max_retries: u32,
    /// Wait between marking an item synced and physically deleting it, so
    /// concurrent readers of pending state during the same tick still see
    /// the record.
    pub deletion_grace: Duration,
    /// Request timeout handed to the transport.
    pub request_timeout: Duration,
}

impl SyncConfig {
    /// Creates a configuration with the stock defaults.
    pub fn new() -> Self {
        Self {
            sync_interval: Duration::from_secs(30),
            retry_delay: Duration::from_millis(5000),
            max_retries: 3,
            deletion_grace: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the automatic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the post-failure retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the per-item retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the deletion grace delay. Zero deletes synced items inline.
    pub fn with_deletion_grace(mut self, grace: Duration) -> Self {
        self.deletion_grace = grace;
        self
    }

    /// Sets the transport request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! # shopsync Engine
//!
//! Sync manager for shopsync.
//!
//! This crate provides:
//! - The drain loop that replays queued mutations against the server
//! - Mutual exclusion so at most one pass runs at a time
//! - Bounded per-item retries across passes, with failure reporting
//! - Conflict handling via the resolver, including the manual path
//! - A periodic auto-sync timer and a reconnect trigger hook
//! - An update-endpoint transport abstraction with HTTP and mock
//!   implementations
//!
//! ## Key Invariants
//!
//! - At most one sync pass runs at a time, no matter how many triggers fire
//! - Items are processed sequentially in queue order within a pass
//! - An unsynced item is never deleted; exhausted items are reported and
//!   stay queued
//! - Per-item transport and storage errors never escape `sync()`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod events;
mod http;
mod manager;
mod transport;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use events::{SyncEvent, SyncListenerId};
pub use http::{HttpClient, HttpResponse, HttpTransport};
pub use manager::{SkipReason, SyncManager, SyncOutcome, SyncReport, SyncStats, SyncStatus};
pub use transport::{MockTransport, PushOutcome, ScriptedPush, UpdateTransport};

//! # shopsync Store
//!
//! Durable pending-update queue and entity cache for shopsync.
//!
//! This crate provides:
//! - The [`PendingUpdate`] / [`CachedEntity`] data model
//! - A minimal indexed-store backend trait ([`StoreBackend`])
//! - In-memory and file-backed backend implementations
//! - The [`UpdateQueue`] lifecycle API used by producers and the sync layer
//!
//! ## Key Invariants
//!
//! - An unsynced record is never silently dropped; deletion happens only
//!   after a confirmed sync or an explicit purge of synced rows
//! - Update ids are assigned by the store and monotonically increase
//! - At most one cached snapshot per owner, overwritten wholesale
//! - Retry counters never decrease while a record exists

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod queue;
mod types;

pub use backend::StoreBackend;
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
pub use queue::UpdateQueue;
pub use types::{CachedEntity, FieldMap, OwnerId, PendingUpdate, UpdateId};

//! CLI command implementations.

pub mod cache;
pub mod enqueue;
pub mod list;
pub mod purge;
pub mod status;

use shopsync_store::{FileBackend, UpdateQueue};
use std::path::Path;
use std::sync::Arc;

/// Opens the queue in the given store directory.
pub(crate) fn open_queue(path: &Path) -> Result<UpdateQueue, Box<dyn std::error::Error>> {
    let backend = FileBackend::open(path)?;
    Ok(UpdateQueue::new(Arc::new(backend)))
}

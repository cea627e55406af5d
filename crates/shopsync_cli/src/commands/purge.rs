//! `purge` command: delete synced records.

use std::path::Path;

/// Deletes every synced record and reports the count.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let queue = super::open_queue(path)?;
    let deleted = queue.purge_synced()?;
    println!("Purged {deleted} synced update(s)");

    Ok(())
}

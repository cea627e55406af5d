//! `status` command: pending/synced counts.

use std::path::Path;

/// Prints queue counts for the store directory.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let queue = super::open_queue(path)?;

    let pending = queue.list_pending(None)?;
    let awaiting = pending.iter().filter(|u| u.awaiting_resolution).count();

    println!("Store: {}", path.display());
    println!("Pending updates:     {}", pending.len());
    println!("Awaiting resolution: {awaiting}");

    Ok(())
}

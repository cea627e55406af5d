//! `cache` command: show a cached snapshot.

use shopsync_store::OwnerId;
use std::path::Path;

/// Prints the cached server snapshot for an owner.
pub fn run(path: &Path, owner: &str) -> Result<(), Box<dyn std::error::Error>> {
    let queue = super::open_queue(path)?;

    match queue.cached_entity(&OwnerId::new(owner))? {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => println!("No cached entity for owner {owner}"),
    }

    Ok(())
}

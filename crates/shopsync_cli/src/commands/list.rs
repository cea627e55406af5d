//! `list` command: pending updates.

use shopsync_store::OwnerId;
use std::path::Path;

/// Prints pending updates, optionally filtered by owner.
pub fn run(path: &Path, owner: Option<&str>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let queue = super::open_queue(path)?;
    let owner = owner.map(OwnerId::new);
    let pending = queue.list_pending(owner.as_ref())?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&pending)?),
        _ => {
            if pending.is_empty() {
                println!("No pending updates");
                return Ok(());
            }
            for update in pending {
                let state = if update.awaiting_resolution {
                    "awaiting-resolution"
                } else {
                    "pending"
                };
                println!(
                    "#{} owner={} created={} retries={} [{}]",
                    update.id,
                    update.owner_id,
                    update.created_at.to_rfc3339(),
                    update.retry_count,
                    state
                );
            }
        }
    }

    Ok(())
}

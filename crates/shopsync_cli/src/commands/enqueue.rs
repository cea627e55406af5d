//! `enqueue` command: stage a mutation.

use shopsync_store::OwnerId;
use std::path::Path;

/// Stages a JSON payload for the given owner.
pub fn run(path: &Path, owner: &str, payload: &str) -> Result<(), Box<dyn std::error::Error>> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    let serde_json::Value::Object(fields) = value else {
        return Err("payload must be a JSON object".into());
    };

    let queue = super::open_queue(path)?;
    let id = queue.enqueue(OwnerId::new(owner), fields)?;
    println!("Queued update #{id} for owner {owner}");

    Ok(())
}

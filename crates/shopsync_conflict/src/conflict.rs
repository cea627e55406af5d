//! Conflict records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopsync_store::{FieldMap, OwnerId, PendingUpdate};

/// Field names under which servers report the entity's last-modified time.
const UPDATED_AT_FIELDS: [&str; 2] = ["updated_at", "updatedAt"];

/// A divergence between a staged local mutation and current server state.
///
/// Conflicts are ephemeral: derived from one pending update and one server
/// snapshot for the same owner, logged for audit, and handed to the
/// resolution step. They are never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    /// Entity both sides refer to.
    pub owner_id: OwnerId,
    /// The staged local payload.
    pub local_data: FieldMap,
    /// The server's current entity state.
    pub server_data: FieldMap,
    /// When the local mutation was staged.
    pub local_timestamp: DateTime<Utc>,
    /// The server's last-modified time (epoch when the server never
    /// reported one).
    pub server_timestamp: DateTime<Utc>,
    /// When this conflict was detected.
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    /// Builds a conflict from a pending update and a server snapshot.
    pub fn between(update: &PendingUpdate, server_data: &FieldMap) -> Self {
        Self {
            owner_id: update.owner_id.clone(),
            local_data: update.payload.clone(),
            server_data: server_data.clone(),
            local_timestamp: update.created_at,
            server_timestamp: server_modified_at(server_data),
            detected_at: Utc::now(),
        }
    }
}

/// Extracts the server's last-modified timestamp from an entity snapshot.
///
/// Absence of the field, or a value that does not parse as RFC 3339, is
/// treated as "never updated" and maps to the Unix epoch.
pub fn server_modified_at(data: &FieldMap) -> DateTime<Utc> {
    UPDATED_AT_FIELDS
        .iter()
        .find_map(|field| data.get(*field))
        .and_then(|value| value.as_str())
        .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn parses_snake_and_camel_case() {
        let snake = map(&[("updated_at", json!("2024-01-02T00:00:00Z"))]);
        let camel = map(&[("updatedAt", json!("2024-01-02T00:00:00Z"))]);

        assert_eq!(server_modified_at(&snake), server_modified_at(&camel));
        assert!(server_modified_at(&snake) > DateTime::UNIX_EPOCH);
    }

    #[test]
    fn missing_timestamp_is_epoch() {
        let data = map(&[("name", json!("Alice"))]);
        assert_eq!(server_modified_at(&data), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn unparsable_timestamp_is_epoch() {
        let data = map(&[("updated_at", json!("yesterday"))]);
        assert_eq!(server_modified_at(&data), DateTime::UNIX_EPOCH);

        let data = map(&[("updated_at", json!(12345))]);
        assert_eq!(server_modified_at(&data), DateTime::UNIX_EPOCH);
    }
}

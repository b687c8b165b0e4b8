//! Version log entry types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Document;

/// The mutation that produced a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionAction {
    /// The resource was created.
    Create,
    /// The resource was replaced or patched.
    Update,
    /// The resource was deleted (tombstone).
    Delete,
}

impl VersionAction {
    /// Returns the storage code.
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionAction::Create => "create",
            VersionAction::Update => "update",
            VersionAction::Delete => "delete",
        }
    }

    /// Returns the HTTP method reported for this action in history bundles.
    pub fn http_method(&self) -> &'static str {
        match self {
            VersionAction::Create => "POST",
            VersionAction::Update => "PUT",
            VersionAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for VersionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(VersionAction::Create),
            "update" => Ok(VersionAction::Update),
            "delete" => Ok(VersionAction::Delete),
            other => Err(format!("unknown version action: {}", other)),
        }
    }
}

/// One immutable row of a resource's version log.
///
/// For a fixed `(resource_type, resource_id)` the version ids form the
/// sequence `1..=N` and version 1 is always a [`VersionAction::Create`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// The resource type tag (e.g. "ServiceRequest").
    pub resource_type: String,
    /// The stable logical id.
    pub resource_id: String,
    /// Positive, gap-free version number.
    pub version_id: u64,
    /// The document as of this version. Tombstones carry the last live snapshot.
    pub snapshot: Document,
    /// What produced this version.
    pub action: VersionAction,
    /// When the version was recorded.
    pub timestamp: DateTime<Utc>,
}

impl VersionEntry {
    /// Returns true when this entry is a delete tombstone.
    pub fn is_deleted(&self) -> bool {
        self.action == VersionAction::Delete
    }

    /// Returns the weak ETag for this version, e.g. `W/"3"`.
    pub fn etag(&self) -> String {
        format!("W/\"{}\"", self.version_id)
    }

    /// Returns the relative URL `Type/id`.
    pub fn url(&self) -> String {
        format!("{}/{}", self.resource_type, self.resource_id)
    }

    /// Returns the relative version URL `Type/id/_history/vid`.
    pub fn versioned_url(&self) -> String {
        format!(
            "{}/{}/_history/{}",
            self.resource_type, self.resource_id, self.version_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_round_trip_codes() {
        for action in [VersionAction::Create, VersionAction::Update, VersionAction::Delete] {
            assert_eq!(action.as_str().parse::<VersionAction>().unwrap(), action);
        }
        assert!("purge".parse::<VersionAction>().is_err());
    }

    #[test]
    fn test_http_methods() {
        assert_eq!(VersionAction::Create.http_method(), "POST");
        assert_eq!(VersionAction::Update.http_method(), "PUT");
        assert_eq!(VersionAction::Delete.http_method(), "DELETE");
    }

    #[test]
    fn test_entry_urls() {
        let entry = VersionEntry {
            resource_type: "Contract".to_string(),
            resource_id: "c-9".to_string(),
            version_id: 4,
            snapshot: json!({"status": "executed"}),
            action: VersionAction::Update,
            timestamp: Utc::now(),
        };
        assert_eq!(entry.etag(), "W/\"4\"");
        assert_eq!(entry.url(), "Contract/c-9");
        assert_eq!(entry.versioned_url(), "Contract/c-9/_history/4");
        assert!(!entry.is_deleted());
    }

    #[test]
    fn test_action_serde() {
        assert_eq!(
            serde_json::to_value(VersionAction::Delete).unwrap(),
            json!("delete")
        );
    }
}

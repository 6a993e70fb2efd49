//! State types for tracking last-known resource attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::resource::{Attributes, ResourceId};

/// Current version of the persisted state format.
pub const STATE_FORMAT: u32 = 1;

/// The last recorded real-world state of every managed resource.
///
/// Records are never mutated once the store publishes them; a state change
/// always produces a new record with a higher `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Persisted format version.
    #[serde(default = "default_format")]
    pub format: u32,
    /// Monotonic state version; 0 for a store that was never written.
    pub version: u64,
    /// When the state was last replaced.
    pub last_synced: DateTime<Utc>,
    /// Last-known attributes by resource identity.
    #[serde(default)]
    pub resources: BTreeMap<ResourceId, Attributes>,
}

const fn default_format() -> u32 {
    STATE_FORMAT
}

impl StateRecord {
    /// Creates an empty record at version 0.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            format: STATE_FORMAT,
            version: 0,
            last_synced: Utc::now(),
            resources: BTreeMap::new(),
        }
    }

    /// Creates the successor of this record holding `resources`.
    #[must_use]
    pub fn successor(&self, resources: BTreeMap<ResourceId, Attributes>) -> Self {
        Self {
            format: STATE_FORMAT,
            version: self.version + 1,
            last_synced: Utc::now(),
            resources,
        }
    }

    /// Looks up the attributes recorded for a resource.
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&Attributes> {
        self.resources.get(id)
    }

    /// Returns the number of recorded resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resources are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Returns a summary of this record.
    #[must_use]
    pub fn summary(&self) -> StateSummary {
        StateSummary {
            version: self.version,
            last_synced: self.last_synced,
            resource_count: self.resources.len(),
        }
    }
}

impl Default for StateRecord {
    fn default() -> Self {
        Self::empty()
    }
}

/// Version and size of a state record, as carried by state events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    /// State version.
    pub version: u64,
    /// When the state was last replaced.
    pub last_synced: DateTime<Utc>,
    /// Number of recorded resources.
    pub resource_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::AttributeValue;

    #[test]
    fn test_successor_bumps_version() {
        let empty = StateRecord::empty();
        assert_eq!(empty.version, 0);
        assert!(empty.is_empty());

        let mut resources = BTreeMap::new();
        resources.insert(ResourceId::new("aws_instance", "web"), Attributes::new());
        let next = empty.successor(resources);

        assert_eq!(next.version, 1);
        assert_eq!(next.summary().resource_count, 1);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_record_serialization() {
        let mut attrs = Attributes::new();
        attrs.insert(String::from("acl"), AttributeValue::from("private"));
        let mut resources = BTreeMap::new();
        resources.insert(ResourceId::new("aws_s3_bucket", "my_bucket"), attrs);
        let record = StateRecord::empty().successor(resources);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"aws_s3_bucket.my_bucket\""));

        let parsed: StateRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_format_defaults_when_absent() {
        let json = r#"{"version": 3, "last_synced": "2024-01-01T00:00:00Z"}"#;
        let record: StateRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.format, STATE_FORMAT);
        assert_eq!(record.version, 3);
        assert!(record.is_empty());
    }
}

//! Resource identity.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

use crate::error::ConfigError;

/// Unique identity of a resource: its type and name.
///
/// Identities render as `type.name` but order by the `(type, name)` pair, each
/// part compared as a string. This is not the order of the rendered address:
/// `a.z` sorts before `a-b.a` because the type `a` precedes `a-b`, although
/// `-` sorts before `.` in the rendered form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    /// Resource type (e.g. `aws_instance`).
    resource_type: String,
    /// Resource name, unique within its type.
    name: String,
}

impl ResourceId {
    /// Creates a new resource identity.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Returns the resource type.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the provider implied by the type prefix.
    #[must_use]
    pub fn default_provider(&self) -> &str {
        self.resource_type
            .split_once('_')
            .map_or(self.resource_type.as_str(), |(prefix, _)| prefix)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((resource_type, name))
                if !resource_type.is_empty() && !name.is_empty() && !name.contains('.') =>
            {
                Ok(Self::new(resource_type, name))
            }
            _ => Err(ConfigError::validation(
                format!("'{s}' is not a valid resource address (expected type.name)"),
                "resource",
            )),
        }
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id: ResourceId = "aws_s3_bucket.my_bucket".parse().unwrap();
        assert_eq!(id.resource_type(), "aws_s3_bucket");
        assert_eq!(id.name(), "my_bucket");
        assert_eq!(id.to_string(), "aws_s3_bucket.my_bucket");
    }

    #[test]
    fn test_orders_by_type_then_name() {
        let short_type = ResourceId::new("a", "z");
        let long_type = ResourceId::new("a-b", "a");
        assert!(short_type < long_type);
        assert!(long_type.to_string() < short_type.to_string());

        assert!(ResourceId::new("aws_instance", "a") < ResourceId::new("aws_instance", "b"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("no_dot".parse::<ResourceId>().is_err());
        assert!(".name".parse::<ResourceId>().is_err());
        assert!("type.".parse::<ResourceId>().is_err());
        assert!("a.b.c".parse::<ResourceId>().is_err());
    }

    #[test]
    fn test_ordering_by_type_then_name() {
        let mut ids = vec![
            ResourceId::new("aws_s3_bucket", "b"),
            ResourceId::new("aws_instance", "z"),
            ResourceId::new("aws_s3_bucket", "a"),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["aws_instance.z", "aws_s3_bucket.a", "aws_s3_bucket.b"]
        );
    }

    #[test]
    fn test_serializes_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ResourceId::new("aws_instance", "web"), 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"aws_instance.web":1}"#);

        let back: std::collections::BTreeMap<ResourceId, i32> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}

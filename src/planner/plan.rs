//! Plan types.
//!
//! A [`Plan`] is an ordered changeset together with the graph and state
//! versions it was computed from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resource::{Attributes, ResourceId};

/// Kind of change for a single resource.
///
/// The declaration order is the plan order: creates, updates, deletes, no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeAction {
    /// Resource is declared but not recorded.
    Create,
    /// Resource is declared and recorded with different attributes.
    Update,
    /// Resource is recorded but no longer declared.
    Delete,
    /// Resource is declared and recorded with equal attributes.
    NoOp,
}

impl ChangeAction {
    /// Returns true for actions that change infrastructure.
    #[must_use]
    pub const fn is_change(self) -> bool {
        !matches!(self, Self::NoOp)
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::NoOp => "no-op",
        };
        write!(f, "{s}")
    }
}

/// One row of a changeset.
///
/// Entries can only be built through the per-action constructors, which keep
/// `before` and `after` consistent with the action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEntry {
    action: ChangeAction,
    resource: ResourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    before: Option<Attributes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<Attributes>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    changed_attributes: Vec<String>,
}

impl ChangeEntry {
    /// Creates a `create` entry.
    #[must_use]
    pub const fn create(resource: ResourceId, after: Attributes) -> Self {
        Self {
            action: ChangeAction::Create,
            resource,
            before: None,
            after: Some(after),
            changed_attributes: Vec::new(),
        }
    }

    /// Creates an `update` entry listing the changed attribute paths.
    #[must_use]
    pub const fn update(
        resource: ResourceId,
        before: Attributes,
        after: Attributes,
        changed_attributes: Vec<String>,
    ) -> Self {
        Self {
            action: ChangeAction::Update,
            resource,
            before: Some(before),
            after: Some(after),
            changed_attributes,
        }
    }

    /// Creates a `delete` entry.
    #[must_use]
    pub const fn delete(resource: ResourceId, before: Attributes) -> Self {
        Self {
            action: ChangeAction::Delete,
            resource,
            before: Some(before),
            after: None,
            changed_attributes: Vec::new(),
        }
    }

    /// Creates a `no-op` entry.
    #[must_use]
    pub fn no_op(resource: ResourceId, attributes: Attributes) -> Self {
        Self {
            action: ChangeAction::NoOp,
            resource,
            before: Some(attributes.clone()),
            after: Some(attributes),
            changed_attributes: Vec::new(),
        }
    }

    /// Returns the action.
    #[must_use]
    pub const fn action(&self) -> ChangeAction {
        self.action
    }

    /// Returns the resource identity.
    #[must_use]
    pub const fn resource(&self) -> &ResourceId {
        &self.resource
    }

    /// Returns the recorded attributes, absent for creates.
    #[must_use]
    pub const fn before(&self) -> Option<&Attributes> {
        self.before.as_ref()
    }

    /// Returns the desired attributes, absent for deletes.
    #[must_use]
    pub const fn after(&self) -> Option<&Attributes> {
        self.after.as_ref()
    }

    /// Returns the dotted paths of changed attributes, for updates.
    #[must_use]
    pub fn changed_attributes(&self) -> &[String] {
        &self.changed_attributes
    }

    /// Returns a human-readable description of the change.
    #[must_use]
    pub fn description(&self) -> String {
        match self.action {
            ChangeAction::Create => format!("{} will be created", self.resource),
            ChangeAction::Update => format!(
                "{} will be updated in-place ({})",
                self.resource,
                self.changed_attributes.join(", ")
            ),
            ChangeAction::Delete => format!("{} will be destroyed", self.resource),
            ChangeAction::NoOp => format!("{} is up to date", self.resource),
        }
    }
}

impl std::fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self.action {
            ChangeAction::Create => "+",
            ChangeAction::Update => "~",
            ChangeAction::Delete => "-",
            ChangeAction::NoOp => " ",
        };
        write!(f, "{symbol} {}", self.resource)
    }
}

/// Number of entries per action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Resources to create.
    pub create: usize,
    /// Resources to update.
    pub update: usize,
    /// Resources to delete.
    pub delete: usize,
    /// Unchanged resources.
    pub no_op: usize,
}

impl PlanSummary {
    /// Returns true if any resource changes.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.create + self.update + self.delete > 0
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan: {} to add, {} to change, {} to destroy",
            self.create, self.update, self.delete
        )
    }
}

/// An ordered changeset and the inputs it was computed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    /// Entries in plan order.
    pub entries: Vec<ChangeEntry>,
    /// When the plan was computed.
    pub generated_at: DateTime<Utc>,
    /// Desired graph version the plan was computed from.
    pub graph_version: u64,
    /// State version the plan was computed from.
    pub state_version: u64,
}

impl Plan {
    /// Returns per-action counts.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        self.entries
            .iter()
            .fold(PlanSummary::default(), |mut summary, entry| {
                match entry.action {
                    ChangeAction::Create => summary.create += 1,
                    ChangeAction::Update => summary.update += 1,
                    ChangeAction::Delete => summary.delete += 1,
                    ChangeAction::NoOp => summary.no_op += 1,
                }
                summary
            })
    }

    /// Returns true if the plan has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if any entry changes infrastructure.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|e| e.action.is_change())
    }

    /// Returns the entries that change infrastructure.
    pub fn changes(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries.iter().filter(|e| e.action.is_change())
    }

    /// Returns true if the plan was computed from the given versions.
    #[must_use]
    pub const fn is_current(&self, graph_version: u64, state_version: u64) -> bool {
        self.graph_version == graph_version && self.state_version == state_version
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.has_changes() {
            return write!(f, "No changes. Infrastructure is up-to-date.");
        }

        for entry in self.changes() {
            writeln!(f, "  {entry}")?;
        }
        write!(f, "\n{}", self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::AttributeValue;

    fn attrs(key: &str, value: &str) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert(key.to_string(), AttributeValue::from(value));
        attrs
    }

    fn plan(entries: Vec<ChangeEntry>) -> Plan {
        Plan {
            entries,
            generated_at: Utc::now(),
            graph_version: 1,
            state_version: 0,
        }
    }

    #[test]
    fn test_action_order() {
        assert!(ChangeAction::Create < ChangeAction::Update);
        assert!(ChangeAction::Update < ChangeAction::Delete);
        assert!(ChangeAction::Delete < ChangeAction::NoOp);
    }

    #[test]
    fn test_constructors_respect_invariants() {
        let id = ResourceId::new("aws_instance", "web");
        let create = ChangeEntry::create(id.clone(), attrs("type", "t3.micro"));
        assert!(create.before().is_none() && create.after().is_some());

        let delete = ChangeEntry::delete(id.clone(), attrs("type", "t3.micro"));
        assert!(delete.before().is_some() && delete.after().is_none());

        let update = ChangeEntry::update(
            id,
            attrs("type", "t3.micro"),
            attrs("type", "t3.large"),
            vec![String::from("type")],
        );
        assert_ne!(update.before(), update.after());
    }

    #[test]
    fn test_summary_line() {
        let p = plan(vec![
            ChangeEntry::create(ResourceId::new("aws_instance", "a"), Attributes::new()),
            ChangeEntry::delete(ResourceId::new("aws_instance", "b"), Attributes::new()),
            ChangeEntry::no_op(ResourceId::new("aws_instance", "c"), Attributes::new()),
        ]);
        let summary = p.summary();
        assert_eq!(summary.no_op, 1);
        assert_eq!(summary.to_string(), "Plan: 1 to add, 0 to change, 1 to destroy");
        assert!(p.to_string().contains("+ aws_instance.a"));
        assert!(!p.to_string().contains("aws_instance.c"));
    }

    #[test]
    fn test_no_changes_rendering() {
        let p = plan(vec![ChangeEntry::no_op(
            ResourceId::new("aws_instance", "c"),
            Attributes::new(),
        )]);
        assert!(!p.has_changes());
        assert_eq!(p.to_string(), "No changes. Infrastructure is up-to-date.");
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = ChangeEntry::create(ResourceId::new("aws_instance", "example"), attrs("type", "t3.micro"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "create",
                "resource": "aws_instance.example",
                "after": {"type": "t3.micro"}
            })
        );

        let delete = ChangeEntry::delete(ResourceId::new("aws_instance", "old"), attrs("type", "t3.micro"));
        let json = serde_json::to_value(&delete).unwrap();
        assert_eq!(json["before"], serde_json::json!({"type": "t3.micro"}));
        assert!(json.get("after").is_none());

        let no_op = serde_json::to_value(ChangeAction::NoOp).unwrap();
        assert_eq!(no_op, serde_json::json!("no-op"));
    }

    #[test]
    fn test_is_current() {
        let p = plan(vec![]);
        assert!(p.is_current(1, 0));
        assert!(!p.is_current(1, 1));
        assert!(!p.is_current(2, 0));
    }
}

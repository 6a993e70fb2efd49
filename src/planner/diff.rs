//! Diff engine for comparing the desired graph against recorded state.
//!
//! Every identity in either input produces exactly one entry. Attribute
//! comparison is deep and order independent, and never coerces between types.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::DesiredGraph;
use crate::resource::{AttributeValue, Attributes};
use crate::state::StateRecord;

use super::plan::{ChangeEntry, Plan};

/// Engine for computing plans.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the plan reconciling `state` toward `desired`, stamped now.
    #[must_use]
    pub fn compute(&self, desired: &DesiredGraph, state: &StateRecord) -> Plan {
        self.compute_at(desired, state, Utc::now())
    }

    /// Computes the plan with an explicit timestamp.
    ///
    /// The result depends only on the arguments, so equal inputs yield plans
    /// that serialize identically.
    #[must_use]
    pub fn compute_at(
        &self,
        desired: &DesiredGraph,
        state: &StateRecord,
        generated_at: DateTime<Utc>,
    ) -> Plan {
        let mut entries = Vec::with_capacity(desired.len().max(state.len()));

        for (id, resource) in desired.resources() {
            let after = resource.attributes();
            let entry = match state.get(id) {
                None => ChangeEntry::create(id.clone(), after.clone()),
                Some(before) => {
                    let changed = changed_paths(before, after);
                    if changed.is_empty() {
                        ChangeEntry::no_op(id.clone(), after.clone())
                    } else {
                        ChangeEntry::update(id.clone(), before.clone(), after.clone(), changed)
                    }
                }
            };
            entries.push(entry);
        }

        for (id, before) in &state.resources {
            if desired.get(id).is_none() {
                entries.push(ChangeEntry::delete(id.clone(), before.clone()));
            }
        }

        entries.sort_by(|a, b| {
            a.action()
                .cmp(&b.action())
                .then_with(|| a.resource().cmp(b.resource()))
        });

        let plan = Plan {
            entries,
            generated_at,
            graph_version: desired.version(),
            state_version: state.version,
        };

        debug!(
            "Computed plan for graph v{} / state v{}: {}",
            plan.graph_version,
            plan.state_version,
            plan.summary()
        );
        plan
    }
}

/// Returns the sorted dotted paths at which two attribute maps differ.
///
/// Nested maps are descended into; any other differing value, including a
/// list or a change of type, is reported at its own path.
#[must_use]
pub fn changed_paths(before: &Attributes, after: &Attributes) -> Vec<String> {
    let mut paths = BTreeSet::new();
    collect_changes("", before, after, &mut paths);
    paths.into_iter().collect()
}

fn collect_changes(prefix: &str, before: &Attributes, after: &Attributes, out: &mut BTreeSet<String>) {
    let keys: BTreeSet<&String> = before.keys().chain(after.keys()).collect();

    for key in keys {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match (before.get(key), after.get(key)) {
            (Some(AttributeValue::Map(old)), Some(AttributeValue::Map(new))) => {
                collect_changes(&path, old, new, out);
            }
            (Some(old), Some(new)) if old == new => {}
            _ => {
                out.insert(path);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ChangeAction;
    use crate::resource::{Resource, ResourceId};
    use std::collections::BTreeMap;

    fn attrs(pairs: &[(&str, AttributeValue)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn graph(resources: &[(&str, Attributes)]) -> DesiredGraph {
        let resources = resources
            .iter()
            .map(|(address, attrs)| {
                Resource::with_default_provider(address.parse().unwrap(), attrs.clone(), "")
            })
            .collect();
        DesiredGraph::from_resources(resources).unwrap().with_version(1)
    }

    fn state(resources: &[(&str, Attributes)]) -> StateRecord {
        let map: BTreeMap<ResourceId, Attributes> = resources
            .iter()
            .map(|(address, attrs)| (address.parse().unwrap(), attrs.clone()))
            .collect();
        StateRecord::empty().successor(map)
    }

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_empty_inputs_yield_empty_plan() {
        let plan = DiffEngine::new().compute(&DesiredGraph::empty(), &StateRecord::empty());
        assert!(plan.is_empty());
        assert_eq!(plan.graph_version, 0);
        assert_eq!(plan.state_version, 0);
    }

    #[test]
    fn test_create_scenario() {
        let desired = graph(&[("aws_instance.example", attrs(&[("type", "t3.micro".into())]))]);
        let plan = DiffEngine::new().compute(&desired, &StateRecord::empty());

        assert_eq!(plan.entries.len(), 1);
        let entry = &plan.entries[0];
        assert_eq!(entry.action(), ChangeAction::Create);
        assert_eq!(entry.resource(), &ResourceId::new("aws_instance", "example"));
        assert!(entry.before().is_none());
        assert_eq!(entry.after(), Some(&attrs(&[("type", "t3.micro".into())])));
    }

    #[test]
    fn test_update_scenario() {
        let desired = graph(&[("aws_s3_bucket.my_bucket", attrs(&[("acl", "public".into())]))]);
        let recorded = state(&[("aws_s3_bucket.my_bucket", attrs(&[("acl", "private".into())]))]);
        let plan = DiffEngine::new().compute(&desired, &recorded);

        assert_eq!(plan.entries.len(), 1);
        let entry = &plan.entries[0];
        assert_eq!(entry.action(), ChangeAction::Update);
        assert_eq!(entry.before(), Some(&attrs(&[("acl", "private".into())])));
        assert_eq!(entry.after(), Some(&attrs(&[("acl", "public".into())])));
        assert_eq!(entry.changed_attributes(), ["acl"]);
        assert_eq!(plan.state_version, 1);
    }

    #[test]
    fn test_no_implicit_coercion() {
        let desired = graph(&[("aws_instance.web", attrs(&[("port", AttributeValue::from(1))]))]);
        let recorded = state(&[("aws_instance.web", attrs(&[("port", "1".into())]))]);
        let plan = DiffEngine::new().compute(&desired, &recorded);
        assert_eq!(plan.entries[0].action(), ChangeAction::Update);
    }

    #[test]
    fn test_nested_changes_reported_by_path() {
        let mut old_tags = Attributes::new();
        old_tags.insert(String::from("env"), "dev".into());
        old_tags.insert(String::from("team"), "infra".into());
        let mut new_tags = old_tags.clone();
        new_tags.insert(String::from("env"), "prod".into());
        new_tags.remove("team");

        let before = attrs(&[("tags", old_tags.into()), ("ami", "ami-1".into())]);
        let after = attrs(&[("tags", new_tags.into()), ("ami", "ami-1".into()), ("ebs", true.into())]);

        assert_eq!(changed_paths(&before, &after), vec!["ebs", "tags.env", "tags.team"]);
        assert!(changed_paths(&after, &after).is_empty());
    }

    #[test]
    fn test_ordering_law() {
        let desired = graph(&[
            ("aws_instance.b", Attributes::new()),
            ("aws_instance.a", Attributes::new()),
            ("aws_vpc.main", attrs(&[("cidr", "10.0.0.0/16".into())])),
            ("aws_subnet.keep", Attributes::new()),
            ("aws_eip.new", Attributes::new()),
        ]);
        let recorded = state(&[
            ("aws_vpc.main", attrs(&[("cidr", "10.1.0.0/16".into())])),
            ("aws_subnet.keep", Attributes::new()),
            ("aws_s3_bucket.old", Attributes::new()),
            ("aws_iam_role.old", Attributes::new()),
        ]);

        let plan = DiffEngine::new().compute(&desired, &recorded);
        let rendered: Vec<String> = plan
            .entries
            .iter()
            .map(|e| format!("{} {}", e.action(), e.resource()))
            .collect();

        assert_eq!(
            rendered,
            vec![
                "create aws_eip.new",
                "create aws_instance.a",
                "create aws_instance.b",
                "update aws_vpc.main",
                "delete aws_iam_role.old",
                "delete aws_s3_bucket.old",
                "no-op aws_subnet.keep",
            ]
        );
    }

    #[test]
    fn test_ordering_compares_type_before_name() {
        let desired = graph(&[("a-b.a", Attributes::new()), ("a.z", Attributes::new())]);
        let plan = DiffEngine::new().compute_at(&desired, &StateRecord::empty(), fixed_time());
        let order: Vec<String> = plan.entries.iter().map(|e| e.resource().to_string()).collect();
        assert_eq!(order, vec!["a.z", "a-b.a"]);
    }

    /// Builds a pseudo-random but reproducible pair of inputs.
    fn generated_case(seed: u64) -> (DesiredGraph, StateRecord) {
        let mut x = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
        let mut next = move || {
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            x
        };

        let mut desired = Vec::new();
        let mut recorded = Vec::new();
        for i in 0..24 {
            let address = format!("type_{}.r{i}", next() % 3);
            let value = AttributeValue::from(i64::try_from(next() % 3).unwrap());
            let a = attrs(&[("v", value.clone())]);
            match next() % 4 {
                0 => desired.push((address, a)),
                1 => recorded.push((address, a)),
                2 => {
                    desired.push((address.clone(), a.clone()));
                    recorded.push((address, a));
                }
                _ => {
                    desired.push((address.clone(), a));
                    recorded.push((address, attrs(&[("v", "changed".into())])));
                }
            }
        }

        let desired: Vec<(&str, Attributes)> = desired.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let recorded: Vec<(&str, Attributes)> = recorded.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        (graph(&desired), state(&recorded))
    }

    #[test]
    fn test_determinism() {
        let engine = DiffEngine::new();
        for seed in 0..32 {
            let (desired, recorded) = generated_case(seed);
            let a = serde_json::to_string(&engine.compute_at(&desired, &recorded, fixed_time())).unwrap();
            let b = serde_json::to_string(&engine.compute_at(&desired, &recorded, fixed_time())).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_completeness_and_classification() {
        let engine = DiffEngine::new();
        for seed in 0..32 {
            let (desired, recorded) = generated_case(seed);
            let plan = engine.compute(&desired, &recorded);

            let union: BTreeSet<&ResourceId> =
                desired.resources().keys().chain(recorded.resources.keys()).collect();
            let planned: Vec<&ResourceId> = plan.entries.iter().map(ChangeEntry::resource).collect();
            let planned_set: BTreeSet<&ResourceId> = planned.iter().copied().collect();
            assert_eq!(planned.len(), union.len());
            assert_eq!(planned_set, union);

            for entry in &plan.entries {
                let id = entry.resource();
                let expected = match (desired.get(id), recorded.get(id)) {
                    (Some(_), None) => ChangeAction::Create,
                    (None, Some(_)) => ChangeAction::Delete,
                    (Some(r), Some(s)) if r.attributes() == s => ChangeAction::NoOp,
                    (Some(_), Some(_)) => ChangeAction::Update,
                    (None, None) => unreachable!(),
                };
                assert_eq!(entry.action(), expected, "{id}");
            }

            let keys: Vec<_> = plan.entries.iter().map(|e| (e.action(), e.resource().clone())).collect();
            let mut sorted = keys.clone();
            sorted.sort();
            assert_eq!(keys, sorted);
        }
    }

    #[test]
    fn test_state_equal_to_desired_is_all_no_op() {
        let engine = DiffEngine::new();
        for seed in 0..16 {
            let (desired, _) = generated_case(seed);
            let matching: BTreeMap<ResourceId, Attributes> = desired
                .resources()
                .iter()
                .map(|(id, r)| (id.clone(), r.attributes().clone()))
                .collect();
            let recorded = StateRecord::empty().successor(matching);

            let plan = engine.compute(&desired, &recorded);
            assert!(plan.entries.iter().all(|e| e.action() == ChangeAction::NoOp));
            assert!(!plan.has_changes());
        }
    }
}

//! Modules and the desired resource graph.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{ConfigError, FleetformError, Result};
use crate::resource::{Resource, ResourceId};

use super::hash::GraphHasher;

/// A directory-scoped collection of resources and nested modules.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    /// Path relative to the modules root, `/`-separated; empty for the root.
    path: String,
    /// Resources declared directly in this module.
    resources: Vec<Resource>,
    /// Nested sub-modules, ordered by path.
    modules: Vec<Module>,
}

impl Module {
    /// Creates a module.
    #[must_use]
    pub fn new(path: impl Into<String>, resources: Vec<Resource>, modules: Vec<Self>) -> Self {
        Self {
            path: path.into(),
            resources,
            modules,
        }
    }

    /// Returns the module path relative to the modules root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the module name: its directory name, or `root`.
    #[must_use]
    pub fn name(&self) -> &str {
        if self.path.is_empty() {
            "root"
        } else {
            self.path.rsplit('/').next().unwrap_or(&self.path)
        }
    }

    /// Returns the resources declared directly in this module.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Returns the nested sub-modules.
    #[must_use]
    pub fn modules(&self) -> &[Self] {
        &self.modules
    }

    /// Visits this module and all descendants in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in &self.modules {
            child.walk(visit);
        }
    }
}

/// The complete desired resource set, keyed by identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesiredGraph {
    /// Root of the module tree.
    root: Module,
    /// All resources by identity.
    resources: BTreeMap<ResourceId, Resource>,
    /// Content digest of the resource set.
    digest: String,
    /// Generation assigned by the engine when the graph was installed.
    version: u64,
}

impl DesiredGraph {
    /// Builds a graph from a module tree.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateResource` if an identity is declared by
    /// more than one module.
    pub fn from_root(root: Module) -> Result<Self> {
        let mut resources: BTreeMap<ResourceId, Resource> = BTreeMap::new();
        let mut duplicate = None;

        root.walk(&mut |module| {
            for resource in &module.resources {
                if duplicate.is_some() {
                    return;
                }
                if let Some(existing) = resources.get(resource.id()) {
                    duplicate = Some(ConfigError::DuplicateResource {
                        resource: resource.id().to_string(),
                        first: module_label(existing.module()),
                        second: module_label(resource.module()),
                    });
                    return;
                }
                resources.insert(resource.id().clone(), resource.clone());
            }
        });

        if let Some(err) = duplicate {
            return Err(FleetformError::Config(err));
        }

        let digest = GraphHasher::new().hash_graph(&root, &resources);
        Ok(Self {
            root,
            resources,
            digest,
            version: 0,
        })
    }

    /// Builds a single-module graph from a list of resources.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateResource` on repeated identities.
    pub fn from_resources(resources: Vec<Resource>) -> Result<Self> {
        Self::from_root(Module::new("", resources, Vec::new()))
    }

    /// Creates an empty graph.
    #[must_use]
    pub fn empty() -> Self {
        let root = Module::new("", Vec::new(), Vec::new());
        let resources = BTreeMap::new();
        let digest = GraphHasher::new().hash_graph(&root, &resources);
        Self {
            root,
            resources,
            digest,
            version: 0,
        }
    }

    /// Returns the graph stamped with the given generation.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Returns the generation of this graph.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Returns the content digest.
    #[must_use]
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Returns the root module.
    #[must_use]
    pub const fn root(&self) -> &Module {
        &self.root
    }

    /// Looks up a resource by identity.
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.resources.get(id)
    }

    /// Returns all resources keyed by identity.
    #[must_use]
    pub const fn resources(&self) -> &BTreeMap<ResourceId, Resource> {
        &self.resources
    }

    /// Returns the number of resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if no resources are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Returns the paths of all modules, in pre-order.
    #[must_use]
    pub fn module_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.root.walk(&mut |module| paths.push(module_label(module.path())));
        paths
    }
}

/// Renders a module path for messages, naming the root module `root`.
fn module_label(path: &str) -> String {
    if path.is_empty() {
        String::from("root")
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Attributes;

    fn resource(address: &str, module: &str) -> Resource {
        Resource::with_default_provider(address.parse().unwrap(), Attributes::new(), module)
    }

    #[test]
    fn test_graph_indexes_nested_modules() {
        let child = Module::new("network", vec![resource("aws_vpc.main", "network")], vec![]);
        let root = Module::new("", vec![resource("aws_instance.web", "")], vec![child]);
        let graph = DesiredGraph::from_root(root).unwrap();

        assert_eq!(graph.len(), 2);
        assert!(graph.get(&ResourceId::new("aws_vpc", "main")).is_some());
        assert_eq!(graph.module_paths(), vec!["root", "network"]);
        assert_eq!(graph.root().modules()[0].name(), "network");
        assert_eq!(graph.root().name(), "root");
    }

    #[test]
    fn test_duplicate_in_nested_scope_rejected() {
        let child = Module::new("app", vec![resource("aws_instance.web", "app")], vec![]);
        let root = Module::new("", vec![resource("aws_instance.web", "")], vec![child]);
        let err = DesiredGraph::from_root(root).unwrap_err();
        assert!(matches!(
            err,
            FleetformError::Config(ConfigError::DuplicateResource { ref first, ref second, .. })
                if first == "root" && second == "app"
        ));
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = DesiredGraph::from_resources(vec![resource("aws_instance.web", "")]).unwrap();
        let b = DesiredGraph::from_resources(vec![resource("aws_instance.web", "")]).unwrap();
        let c = DesiredGraph::from_resources(vec![resource("aws_instance.api", "")]).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_ne!(a.digest(), DesiredGraph::empty().digest());
    }

    #[test]
    fn test_version_stamp() {
        let graph = DesiredGraph::empty().with_version(7);
        assert_eq!(graph.version(), 7);
        assert!(graph.is_empty());
    }
}

//! Module registry.
//!
//! Walks a modules directory and turns every directory into a [`Module`],
//! parsing the files inside it with the format registered for their extension.
//! Hidden entries are skipped, symlinks are followed, and a symlink pointing
//! back at one of its ancestors is reported as a module cycle.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::{ConfigError, FleetformError, Result};
use crate::resource::{Resource, ResourceId};

use super::format::FormatRegistry;
use super::graph::{DesiredGraph, Module};
use super::validator::ConfigValidator;

/// Loads module trees into desired graphs.
#[derive(Debug, Default, Clone)]
pub struct ModuleRegistry {
    /// Parsers by file extension.
    formats: FormatRegistry,
    /// Declaration validator.
    validator: ConfigValidator,
}

impl ModuleRegistry {
    /// Creates a registry understanding HCL, JSON and YAML.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every module below `root` into a desired graph.
    ///
    /// Loading has no side effects, so calling it twice on an unchanged tree
    /// yields equal graphs.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the root is missing, a directory or file
    /// cannot be read or parsed, a declaration is invalid, an identity is
    /// declared twice anywhere in the tree, or a symlink loop is found.
    pub fn load(&self, root: impl AsRef<Path>) -> Result<DesiredGraph> {
        let root = root.as_ref();
        info!("Loading modules from: {}", root.display());

        let layout = self.scan(root)?;
        let mut seen: HashMap<ResourceId, String> = HashMap::new();
        let root_module = self.build_module("", &layout, &mut seen)?;
        let graph = DesiredGraph::from_root(root_module)?;

        info!(
            "Loaded {} resources from {} modules",
            graph.len(),
            layout.len()
        );
        Ok(graph)
    }

    /// Lists the module paths below `root`, root first.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::load`].
    pub fn list_modules(&self, root: impl AsRef<Path>) -> Result<Vec<String>> {
        Ok(self.load(root)?.module_paths())
    }

    /// Loads `root` and reports non-fatal issues.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Self::load`].
    pub fn validate(&self, root: impl AsRef<Path>) -> Result<Vec<String>> {
        let graph = self.load(root)?;
        Ok(self.validator.warnings(&graph))
    }

    /// Walks `root`, mapping each module path to its recognised files.
    fn scan(&self, root: &Path) -> Result<BTreeMap<String, Vec<PathBuf>>> {
        if !root.exists() {
            return Err(FleetformError::Config(ConfigError::FileNotFound {
                path: root.to_path_buf(),
            }));
        }
        if !root.is_dir() {
            return Err(FleetformError::Config(ConfigError::UnreadableDirectory {
                path: root.to_path_buf(),
                message: String::from("not a directory"),
            }));
        }

        let mut layout: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        for entry in walker {
            let entry = entry.map_err(|e| walk_error(root, &e))?;
            let relative = module_path(root, entry.path());

            if entry.file_type().is_dir() {
                layout.entry(relative).or_default();
                continue;
            }

            if self.formats.for_path(entry.path()).is_none() {
                debug!("Ignoring file without a known format: {}", entry.path().display());
                continue;
            }

            let parent = entry
                .path()
                .parent()
                .map_or_else(String::new, |dir| module_path(root, dir));
            layout.entry(parent).or_default().push(entry.into_path());
        }

        Ok(layout)
    }

    /// Builds the module at `path` and, recursively, its children.
    fn build_module(
        &self,
        path: &str,
        layout: &BTreeMap<String, Vec<PathBuf>>,
        seen: &mut HashMap<ResourceId, String>,
    ) -> Result<Module> {
        let mut resources = Vec::new();
        for file in layout.get(path).into_iter().flatten() {
            resources.extend(self.load_file(file, path, seen)?);
        }

        let mut modules = Vec::new();
        for child in layout.keys().filter(|key| parent_of(key) == Some(path)) {
            modules.push(self.build_module(child, layout, seen)?);
        }

        debug!(
            "Module '{}': {} resources, {} sub-modules",
            path,
            resources.len(),
            modules.len()
        );
        Ok(Module::new(path, resources, modules))
    }

    /// Parses a single file into resources scoped to `module`.
    fn load_file(
        &self,
        file: &Path,
        module: &str,
        seen: &mut HashMap<ResourceId, String>,
    ) -> Result<Vec<Resource>> {
        let location = file.display().to_string();
        let Some(format) = self.formats.for_path(file) else {
            return Ok(Vec::new());
        };

        debug!("Parsing {} as {}", location, format.name());
        let content = std::fs::read_to_string(file).map_err(|e| {
            FleetformError::Config(ConfigError::parse(
                format!("Failed to read file: {e}"),
                location.clone(),
            ))
        })?;

        let decls = format.parse(&content, file)?;
        self.validator.validate_decls(&decls, &location)?;

        let mut resources = Vec::with_capacity(decls.len());
        for decl in decls {
            if let Some(first) = seen.get(&decl.id) {
                return Err(FleetformError::Config(ConfigError::DuplicateResource {
                    resource: decl.id.to_string(),
                    first: first.clone(),
                    second: location,
                }));
            }
            seen.insert(decl.id.clone(), location.clone());

            let resource = match decl.provider {
                Some(provider) => Resource::new(decl.id, provider, decl.attributes, module),
                None => Resource::with_default_provider(decl.id, decl.attributes, module),
            };
            resources.push(resource);
        }

        Ok(resources)
    }
}

/// Check if a walkdir entry is hidden (name starts with '.').
fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|s| s.starts_with('.'))
}

/// Renders `path` relative to `root` as a `/`-separated module path.
fn module_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Returns the parent module path, or `None` for the root.
fn parent_of(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rsplit_once('/').map_or("", |(parent, _)| parent))
}

/// Converts a directory walk failure into a configuration error.
fn walk_error(root: &Path, err: &walkdir::Error) -> FleetformError {
    let path = err.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);

    if let Some(ancestor) = err.loop_ancestor() {
        return FleetformError::Config(ConfigError::CircularDependency {
            cycle: format!("{} -> {}", path.display(), ancestor.display()),
        });
    }

    FleetformError::Config(ConfigError::UnreadableDirectory {
        path,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::AttributeValue;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "main.hcl",
            r#"
resource "aws_instance" "example" {
  instance_type = "t3.micro"
}
"#,
        );
        write(
            temp.path(),
            "network/vpc.json",
            r#"{"resource": {"aws_vpc": {"main": {"cidr_block": "10.0.0.0/16"}}}}"#,
        );
        write(
            temp.path(),
            "network/subnets/private.yaml",
            "resource:\n  aws_subnet:\n    private:\n      cidr_block: 10.0.1.0/24\n",
        );
        write(temp.path(), "README.md", "# not a module file\n");
        temp
    }

    #[test]
    fn test_load_nested_modules() {
        let temp = fixture();
        let graph = ModuleRegistry::new().load(temp.path()).unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.module_paths(), vec!["root", "network", "network/subnets"]);

        let subnet = graph.get(&ResourceId::new("aws_subnet", "private")).unwrap();
        assert_eq!(subnet.module(), "network/subnets");
        assert_eq!(subnet.provider(), "aws");
        assert_eq!(
            subnet.attributes()["cidr_block"],
            AttributeValue::from("10.0.1.0/24")
        );
    }

    #[test]
    fn test_load_is_idempotent() {
        let temp = fixture();
        let registry = ModuleRegistry::new();
        let first = registry.load(temp.path()).unwrap();
        let second = registry.load(temp.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_hidden_directories_skipped() {
        let temp = fixture();
        write(
            temp.path(),
            ".fleetform/state.json",
            r#"{"resource": {"aws_vpc": {"main": {}}}}"#,
        );
        let graph = ModuleRegistry::new().load(temp.path()).unwrap();
        assert_eq!(graph.len(), 3);
        assert!(!graph.module_paths().iter().any(|p| p.contains(".fleetform")));
    }

    #[test]
    fn test_duplicate_in_sibling_modules() {
        let temp = TempDir::new().unwrap();
        let body = r#"{"resource": {"aws_instance": {"web": {}}}}"#;
        write(temp.path(), "a/main.json", body);
        write(temp.path(), "b/main.json", body);

        let err = ModuleRegistry::new().load(temp.path()).unwrap_err();
        assert!(matches!(
            err,
            FleetformError::Config(ConfigError::DuplicateResource { ref resource, .. })
                if resource == "aws_instance.web"
        ));
    }

    #[test]
    fn test_duplicate_across_files_in_one_module() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "one.json", r#"{"resource": {"aws_instance": {"web": {}}}}"#);
        write(temp.path(), "two.yaml", "resource:\n  aws_instance:\n    web: {}\n");

        let err = ModuleRegistry::new().load(temp.path()).unwrap_err();
        assert!(matches!(
            err,
            FleetformError::Config(ConfigError::DuplicateResource { .. })
        ));
    }

    #[test]
    fn test_duplicate_within_one_file() {
        for (file, content) in [
            (
                "net/main.json",
                r#"{"resource": {"aws_vpc": {"main": {"cidr": "10.0.0.0/16"}, "main": {"cidr": "10.1.0.0/16"}}}}"#,
            ),
            (
                "net/main.yaml",
                "resource:\n  aws_vpc:\n    main:\n      cidr: 10.0.0.0/16\n    main:\n      cidr: 10.1.0.0/16\n",
            ),
        ] {
            let temp = TempDir::new().unwrap();
            write(temp.path(), file, content);

            let err = ModuleRegistry::new().load(temp.path()).unwrap_err();
            match err {
                FleetformError::Config(ConfigError::DuplicateResource { resource, first, second }) => {
                    assert_eq!(resource, "aws_vpc.main");
                    assert_eq!(first, second);
                    assert!(first.ends_with(file), "{first} should name {file}");
                }
                other => panic!("{file}: unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = ModuleRegistry::new().load(temp.path().join("absent")).unwrap_err();
        assert!(matches!(
            err,
            FleetformError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_unparseable_file_fails_load() {
        let temp = fixture();
        write(temp.path(), "broken/main.json", "{\"resource\": ");

        let err = ModuleRegistry::new().load(temp.path()).unwrap_err();
        assert!(matches!(
            err,
            FleetformError::Config(ConfigError::ParseError { ref location, .. })
                if location.as_deref().is_some_and(|l| l.ends_with("main.json"))
        ));
    }

    #[test]
    fn test_invalid_identifier_fails_load() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "main.json", r#"{"resource": {"aws_instance": {"9lives": {}}}}"#);
        assert!(ModuleRegistry::new().load(temp.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_cycle() {
        let temp = fixture();
        std::os::unix::fs::symlink(temp.path(), temp.path().join("network/back")).unwrap();

        let err = ModuleRegistry::new().load(temp.path()).unwrap_err();
        assert!(matches!(
            err,
            FleetformError::Config(ConfigError::CircularDependency { .. })
        ));
    }

    #[test]
    fn test_empty_root_loads_empty_graph() {
        let temp = TempDir::new().unwrap();
        let registry = ModuleRegistry::new();
        let graph = registry.load(temp.path()).unwrap();
        assert!(graph.is_empty());
        assert_eq!(registry.list_modules(temp.path()).unwrap(), vec!["root"]);
    }

    #[test]
    fn test_validate_reports_warnings() {
        let temp = fixture();
        std::fs::create_dir_all(temp.path().join("unused")).unwrap();

        let warnings = ModuleRegistry::new().validate(temp.path()).unwrap();
        assert!(warnings.iter().any(|w| w.contains("'unused'")));
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of(""), None);
        assert_eq!(parent_of("network"), Some(""));
        assert_eq!(parent_of("network/subnets"), Some("network"));
    }
}

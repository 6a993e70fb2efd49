//! Validation of declared resources and loaded module trees.

use crate::error::{ConfigError, FleetformError, Result};
use tracing::debug;

use super::format::ResourceDecl;
use super::graph::DesiredGraph;

/// Validator for resource declarations.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates the declarations of a single file.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate_decls(&self, decls: &[ResourceDecl], location: &str) -> Result<()> {
        let mut result = ValidationResult::default();

        for decl in decls {
            let field = format!("{location}: {}", decl.id);

            if !is_valid_identifier(decl.id.resource_type()) {
                result.errors.push(ValidationError {
                    field: field.clone(),
                    message: format!(
                        "Resource type '{}' is invalid. Must start with a letter and contain only letters, digits, '_' or '-'.",
                        decl.id.resource_type()
                    ),
                });
            }

            if !is_valid_identifier(decl.id.name()) {
                result.errors.push(ValidationError {
                    field: field.clone(),
                    message: format!(
                        "Resource name '{}' is invalid. Must start with a letter and contain only letters, digits, '_' or '-'.",
                        decl.id.name()
                    ),
                });
            }

            if decl.provider.as_ref().is_some_and(|p| p.trim().is_empty()) {
                result.errors.push(ValidationError {
                    field,
                    message: String::from("Provider cannot be empty"),
                });
            }
        }

        result.into_result()
    }

    /// Collects non-fatal warnings about a loaded graph.
    #[must_use]
    pub fn warnings(&self, graph: &DesiredGraph) -> Vec<String> {
        let mut warnings = Vec::new();

        if graph.is_empty() {
            warnings.push(String::from("No resources declared in any module"));
        }

        graph.root().walk(&mut |module| {
            if module.resources().is_empty() && module.modules().is_empty() && !module.path().is_empty() {
                warnings.push(format!("Module '{}' declares no resources", module.path()));
            }
        });

        for resource in graph.resources().values() {
            if resource.attributes().is_empty() {
                warnings.push(format!("Resource {} has no attributes", resource.id()));
            }
        }

        warnings
    }
}

impl ValidationResult {
    /// Converts the result into the first error, if any.
    fn into_result(self) -> Result<()> {
        match self.errors.into_iter().next() {
            None => {
                debug!("Resource validation passed");
                Ok(())
            }
            Some(first) => Err(FleetformError::Config(ConfigError::ValidationError {
                message: first.message,
                field: Some(first.field),
            })),
        }
    }
}

/// Checks that an identifier starts with a letter and contains only
/// alphanumerics, underscores, or hyphens.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::graph::Module;
    use crate::resource::{Attributes, Resource, ResourceId};

    fn decl(resource_type: &str, name: &str) -> ResourceDecl {
        ResourceDecl {
            id: ResourceId::new(resource_type, name),
            provider: None,
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("aws_instance"));
        assert!(is_valid_identifier("my-bucket_2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1bucket"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier("dotted.name"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let validator = ConfigValidator::new();
        assert!(validator.validate_decls(&[decl("aws_instance", "web")], "main.hcl").is_ok());

        let err = validator
            .validate_decls(&[decl("aws_instance", "bad name")], "main.hcl")
            .unwrap_err();
        assert!(err.to_string().contains("bad name"));
    }

    #[test]
    fn test_empty_provider_rejected() {
        let mut bad = decl("aws_instance", "web");
        bad.provider = Some(String::from("  "));
        assert!(ConfigValidator::new().validate_decls(&[bad], "main.hcl").is_err());
    }

    #[test]
    fn test_warnings() {
        let web = Resource::with_default_provider(ResourceId::new("aws_instance", "web"), Attributes::new(), "");
        let empty_child = Module::new("unused", vec![], vec![]);
        let graph = DesiredGraph::from_root(Module::new("", vec![web], vec![empty_child])).unwrap();

        let warnings = ConfigValidator::new().warnings(&graph);
        assert!(warnings.iter().any(|w| w.contains("'unused'")));
        assert!(warnings.iter().any(|w| w.contains("aws_instance.web")));
    }
}

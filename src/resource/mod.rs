//! Resource model for managed infrastructure.
//!
//! A resource is identified by its `(type, name)` pair and carries an ordered
//! set of attributes plus the provider responsible for it. Resources are
//! immutable values: a changed declaration produces a new `Resource`.

mod id;
mod value;

pub use id::ResourceId;
pub use value::{AttributeValue, Attributes};

use serde::Serialize;

/// A single declared resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    /// Resource identity.
    id: ResourceId,
    /// Provider that manages this resource.
    provider: String,
    /// Declared attributes.
    attributes: Attributes,
    /// Path of the module that declared the resource.
    module: String,
}

impl Resource {
    /// Creates a new resource.
    #[must_use]
    pub fn new(
        id: ResourceId,
        provider: impl Into<String>,
        attributes: Attributes,
        module: impl Into<String>,
    ) -> Self {
        Self {
            id,
            provider: provider.into(),
            attributes,
            module: module.into(),
        }
    }

    /// Creates a resource whose provider is derived from its type.
    ///
    /// `aws_instance` is managed by `aws`, `google_storage_bucket` by `google`.
    #[must_use]
    pub fn with_default_provider(
        id: ResourceId,
        attributes: Attributes,
        module: impl Into<String>,
    ) -> Self {
        let provider = id.default_provider().to_string();
        Self::new(id, provider, attributes, module)
    }

    /// Returns the resource identity.
    #[must_use]
    pub const fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Returns the provider name.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Returns the declared attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns the declaring module path.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.provider)
    }
}

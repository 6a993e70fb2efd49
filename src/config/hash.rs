//! Content hashing for desired graphs.
//!
//! The digest identifies the declared content of a graph independently of the
//! generation number the engine assigns to it, so two loads of an unchanged
//! module tree produce the same digest. The module layout is part of the
//! content: adding an empty module or moving a resource changes the digest.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::resource::{AttributeValue, Resource, ResourceId};

use super::graph::Module;

/// Hasher for computing graph digests.
#[derive(Debug, Default)]
pub struct GraphHasher;

impl GraphHasher {
    /// Creates a new graph hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the digest of a module tree and its resources.
    #[must_use]
    pub fn hash_graph(&self, root: &Module, resources: &BTreeMap<ResourceId, Resource>) -> String {
        let mut hasher = Sha256::new();

        root.walk(&mut |module| {
            hasher.update([b'M']);
            hasher.update(module.path().as_bytes());
            hasher.update([0u8]);
        });

        for resource in resources.values() {
            hasher.update([b'R']);
            hasher.update(resource.id().to_string().as_bytes());
            hasher.update([0u8]);
            hasher.update(resource.module().as_bytes());
            hasher.update([0u8]);
            hasher.update(resource.provider().as_bytes());
            hasher.update([0u8]);

            // BTreeMap iteration is already sorted by key
            for (key, value) in resource.attributes() {
                hasher.update(key.as_bytes());
                hasher.update([b'=']);
                Self::hash_value(&mut hasher, value);
            }
            hasher.update([b'\n']);
        }

        hex::encode(hasher.finalize())
    }

    /// Feeds a value into the hasher with a type tag, so `1` and `"1"` differ.
    fn hash_value(hasher: &mut Sha256, value: &AttributeValue) {
        match value {
            AttributeValue::Bool(b) => {
                hasher.update([b'b', u8::from(*b)]);
            }
            AttributeValue::Number(n) => {
                hasher.update([b'n']);
                hasher.update(n.to_string().as_bytes());
            }
            AttributeValue::String(s) => {
                hasher.update([b's']);
                hasher.update((s.len() as u64).to_be_bytes());
                hasher.update(s.as_bytes());
            }
            AttributeValue::List(items) => {
                hasher.update([b'l']);
                hasher.update((items.len() as u64).to_be_bytes());
                for item in items {
                    Self::hash_value(hasher, item);
                }
            }
            AttributeValue::Map(entries) => {
                hasher.update([b'm']);
                hasher.update((entries.len() as u64).to_be_bytes());
                for (key, item) in entries {
                    hasher.update(key.as_bytes());
                    hasher.update([0u8]);
                    Self::hash_value(hasher, item);
                }
            }
        }
    }
}

//! Configuration file formats.
//!
//! HCL, JSON and YAML are equivalent input dialects. Each concrete format only
//! turns file content into a generic document; normalization into resource
//! declarations is shared, so every dialect yields the same shape:
//!
//! ```text
//! resource "aws_instance" "web" { instance_type = "t3.micro" }
//! {"resource": {"aws_instance": {"web": {"instance_type": "t3.micro"}}}}
//! resource: { aws_instance: { web: { instance_type: t3.micro } } }
//! ```

use serde::de::{self, Deserialize, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::{ConfigError, FleetformError, Result};
use crate::resource::{AttributeValue, Attributes, ResourceId};

/// Top-level key holding resource declarations.
const RESOURCE_KEY: &str = "resource";

/// Meta argument selecting the provider of a resource.
const PROVIDER_KEY: &str = "provider";

/// A resource as declared in a single file, before module scoping.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDecl {
    /// Declared identity.
    pub id: ResourceId,
    /// Explicit provider, if the `provider` meta argument was set.
    pub provider: Option<String>,
    /// Declared attributes.
    pub attributes: Attributes,
}

/// A configuration dialect.
pub trait ConfigFormat: Send + Sync + std::fmt::Debug {
    /// Human-readable format name.
    fn name(&self) -> &'static str;

    /// File extensions handled by this format, lowercase and without dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Parses file content into its resource blocks.
    ///
    /// # Errors
    ///
    /// Returns a description of the syntax or shape error.
    fn parse_document(&self, content: &str) -> std::result::Result<Document, String>;

    /// Parses file content into resource declarations.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the content is not valid in this dialect or
    /// does not follow the resource document shape.
    fn parse(&self, content: &str, source: &Path) -> Result<Vec<ResourceDecl>> {
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let document = self.parse_document(content).map_err(|e| {
            FleetformError::Config(ConfigError::parse(
                format!("{} parse error: {e}", self.name()),
                source.display().to_string(),
            ))
        })?;
        normalize_document(document, source)
    }
}

/// HCL dialect (`.hcl`, `.tf`).
#[derive(Debug, Default, Clone, Copy)]
pub struct HclFormat;

/// JSON dialect (`.json`).
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormat;

/// YAML dialect (`.yaml`, `.yml`).
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlFormat;

impl ConfigFormat for HclFormat {
    fn name(&self) -> &'static str {
        "HCL"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["hcl", "tf"]
    }

    fn parse_document(&self, content: &str) -> std::result::Result<Document, String> {
        hcl::from_str(content)
            .map(Document::split_repeated_blocks)
            .map_err(|e| e.to_string())
    }
}

impl ConfigFormat for JsonFormat {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["json"]
    }

    fn parse_document(&self, content: &str) -> std::result::Result<Document, String> {
        serde_json::from_str(content).map_err(|e| e.to_string())
    }
}

impl ConfigFormat for YamlFormat {
    fn name(&self) -> &'static str {
        "YAML"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["yaml", "yml"]
    }

    fn parse_document(&self, content: &str) -> std::result::Result<Document, String> {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }
}

/// The resource blocks of one document, in declaration order.
///
/// Repeated keys are kept as separate blocks rather than collapsed, so a
/// name declared twice in one file is still seen twice.
#[derive(Debug, Default)]
pub struct Document {
    /// Declared blocks.
    blocks: Vec<Block>,
}

/// One `resource "<type>" "<name>"` block with its raw body.
#[derive(Debug)]
struct Block {
    resource_type: String,
    name: String,
    body: Value,
}

impl Document {
    /// Returns the number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if the document declares no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Splits list bodies into one block per element.
    ///
    /// HCL groups blocks that share both labels into a list under the name.
    fn split_repeated_blocks(self) -> Self {
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for block in self.blocks {
            match block.body {
                Value::Array(bodies) => blocks.extend(bodies.into_iter().map(|body| Block {
                    resource_type: block.resource_type.clone(),
                    name: block.name.clone(),
                    body,
                })),
                body => blocks.push(Block { body, ..block }),
            }
        }
        Self { blocks }
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(DocumentVisitor)
    }
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = Document;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping at top level")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Document, E> {
        Ok(Document::default())
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Document, E> {
        Ok(Document::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Document, A::Error> {
        let mut blocks = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            if key != RESOURCE_KEY {
                map.next_value::<IgnoredAny>()?;
                continue;
            }

            let Entries(by_type) = map.next_value::<Entries<Entries<Value>>>()?;
            for (resource_type, Entries(by_name)) in by_type {
                blocks.extend(by_name.into_iter().map(|(name, body)| Block {
                    resource_type: resource_type.clone(),
                    name,
                    body,
                }));
            }
        }
        Ok(Document { blocks })
    }
}

/// Mapping entries in order, repeated keys included.
struct Entries<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

struct EntriesVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
    type Value = Entries<V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of resource types or names")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Entries<V>, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(entry) = map.next_entry::<String, V>()? {
            entries.push(entry);
        }
        Ok(Entries(entries))
    }
}

/// Formats keyed by file extension.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    /// Registered formats by extension.
    by_extension: HashMap<&'static str, Arc<dyn ConfigFormat>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(HclFormat));
        registry.register(Arc::new(JsonFormat));
        registry.register(Arc::new(YamlFormat));
        registry
    }
}

impl FormatRegistry {
    /// Creates a registry with no formats.
    fn empty() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// Registers a format for all of its extensions.
    fn register(&mut self, format: Arc<dyn ConfigFormat>) {
        for ext in format.extensions() {
            self.by_extension.insert(ext, Arc::clone(&format));
        }
    }

    /// Returns the format handling the given file, if any.
    #[must_use]
    pub fn for_path(&self, path: &Path) -> Option<&dyn ConfigFormat> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.by_extension.get(ext.as_str()).map(|format| format.as_ref())
    }

}

/// Normalizes a parsed document into resource declarations.
fn normalize_document(document: Document, source: &Path) -> Result<Vec<ResourceDecl>> {
    let location = source.display().to_string();
    if document.is_empty() {
        debug!("No resources declared in {location}");
        return Ok(Vec::new());
    }

    let mut seen = HashSet::with_capacity(document.len());
    let mut decls = Vec::with_capacity(document.len());
    for block in document.blocks {
        let id = ResourceId::new(block.resource_type, block.name);
        if !seen.insert(id.clone()) {
            return Err(FleetformError::Config(ConfigError::DuplicateResource {
                resource: id.to_string(),
                first: location.clone(),
                second: location,
            }));
        }
        decls.push(normalize_body(id, block.body, &location)?);
    }

    Ok(decls)
}

/// Normalizes the body of a single resource.
fn normalize_body(id: ResourceId, body: Value, location: &str) -> Result<ResourceDecl> {
    let mut body: Map<String, Value> = match body {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(malformed(
                format!("resource {id} must be a mapping, found {}", json_kind(&other)),
                location,
            ));
        }
    };

    let provider = match body.remove(PROVIDER_KEY) {
        None => None,
        Some(Value::String(provider)) => Some(provider),
        Some(other) => {
            return Err(malformed(
                format!("provider of {id} must be a string, found {}", json_kind(&other)),
                location,
            ));
        }
    };

    let mut attributes = Attributes::new();
    for (key, value) in body {
        let value = AttributeValue::try_from(value)
            .map_err(|e| malformed(format!("{id}.{key}: {e}"), location))?;
        attributes.insert(key, value);
    }

    Ok(ResourceDecl {
        id,
        provider,
        attributes,
    })
}

/// Builds a parse error for a document that does not follow the resource shape.
fn malformed(message: impl Into<String>, location: &str) -> FleetformError {
    FleetformError::Config(ConfigError::parse(message, location))
}

/// Returns a short name for the kind of a JSON value.
const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

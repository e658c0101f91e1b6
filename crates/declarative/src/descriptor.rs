//! Resource descriptors - the declared side of reconciliation

use std::collections::BTreeMap;

/// Attribute keys that every descriptor may carry regardless of kind.
pub const RESERVED_FIELDS: [&str; 3] = ["name", "kind", "dependencies"];

/// A named, typed bag of declared attributes.
///
/// Descriptors are built once per run by whatever reads the declaration and
/// are never mutated afterwards. The `kind` tag is kept as the declared string
/// so that an unknown tag surfaces as a validation error rather than a parse
/// failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Unique name of the resource within the run
    pub name: String,
    /// Kind tag, e.g. "file", "package", "service"
    pub kind: String,
    /// Kind-specific attributes
    pub attributes: BTreeMap<String, String>,
    /// Names of resources this one depends on, in declared order
    pub dependencies: Vec<String>,
}

impl ResourceDescriptor {
    /// Create a descriptor with no attributes and no dependencies.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            attributes: BTreeMap::new(),
            dependencies: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style dependency setter.
    pub fn depends_on(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Look up an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

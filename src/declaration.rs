//! Declaration file loading
//!
//! A declaration is a TOML document whose top-level tables are resources, in
//! the order they are written:
//!
//! ```toml
//! [app_config]
//! kind = "file"
//! path = "/etc/app"
//! name = "config.conf"
//! mode = "644"
//! owner = "root"
//! group = "root"
//! content = "X=1\n"
//!
//! [appd]
//! kind = "service"
//! name = "appd"
//! state = "running"
//! dependencies = ["app_config"]
//! ```
//!
//! Loading only shapes the document into descriptors. Whether the attributes
//! fit the kind is decided by validation in the engine.

use declarative::ResourceDescriptor;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::{Table, Value};

#[derive(Debug, Error)]
pub enum DeclarationError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("'{0}' must be a table describing a resource")]
    NotATable(String),

    #[error("Resource '{0}' must have a 'kind' parameter")]
    MissingKind(String),

    #[error("Resource '{resource}': '{field}' must be {expected}")]
    WrongType {
        resource: String,
        field: String,
        expected: &'static str,
    },
}

/// Read and shape a declaration file
pub fn load(path: &Path) -> Result<Vec<ResourceDescriptor>, DeclarationError> {
    let text = std::fs::read_to_string(path).map_err(|source| DeclarationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let descriptors = parse(&text)?;
    log::debug!("Loaded {} resources from {}", descriptors.len(), path.display());
    Ok(descriptors)
}

/// Shape a declaration document into descriptors, in document order
pub fn parse(text: &str) -> Result<Vec<ResourceDescriptor>, DeclarationError> {
    let document: Table = toml::from_str(text)?;

    document
        .into_iter()
        .map(|(name, value)| match value {
            Value::Table(table) => descriptor(name, table),
            _ => Err(DeclarationError::NotATable(name)),
        })
        .collect()
}

fn descriptor(name: String, table: Table) -> Result<ResourceDescriptor, DeclarationError> {
    let mut kind = None;
    let mut descriptor = ResourceDescriptor::new(name.clone(), String::new());

    for (field, value) in table {
        match field.as_str() {
            "kind" => match value {
                Value::String(tag) => kind = Some(tag),
                _ => return Err(wrong_type(&name, &field, "a string")),
            },
            "dependencies" => descriptor.dependencies = dependencies(&name, value)?,
            _ => {
                let rendered =
                    scalar(value).ok_or_else(|| wrong_type(&name, &field, "a scalar"))?;
                descriptor.attributes.insert(field, rendered);
            }
        }
    }

    descriptor.kind = kind.ok_or(DeclarationError::MissingKind(name))?;
    Ok(descriptor)
}

fn dependencies(resource: &str, value: Value) -> Result<Vec<String>, DeclarationError> {
    let Value::Array(items) = value else {
        return Err(wrong_type(resource, "dependencies", "an array of names"));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::String(name) => Ok(name),
            _ => Err(wrong_type(resource, "dependencies", "an array of names")),
        })
        .collect()
}

/// Render a scalar the way it would be written in a shell-style config.
fn scalar(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(d) => Some(d.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

fn wrong_type(resource: &str, field: &str, expected: &'static str) -> DeclarationError {
    DeclarationError::WrongType {
        resource: resource.to_string(),
        field: field.to_string(),
        expected,
    }
}

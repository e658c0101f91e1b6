//! Resource kinds and the registry mapping kind tags to implementations
//!
//! The set of kinds is closed. Each descriptor's `kind` tag is resolved with
//! [`Kind::from_str`], validated with [`Kind::validate`] and turned into a
//! live resource with [`Kind::instantiate`].

pub mod file;
pub mod package;
pub mod placeholder;
pub mod service;

pub use file::ManagedFile;
pub use package::ManagedPackage;
pub use placeholder::Placeholder;
pub use service::{ManagedService, ServiceState};

use crate::descriptor::{RESERVED_FIELDS, ResourceDescriptor};
use crate::error::ValidationError;
use crate::probe::Probes;
use crate::resource::BoxedResource;
use std::fmt;
use std::str::FromStr;

/// Tag selecting which implementation governs a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Placeholder that never drifts
    Generic,
    /// Placeholder with two mandatory fields, used to exercise validation
    Test,
    /// A file with content, mode and ownership
    File,
    /// A package pinned to a version
    Package,
    /// A service that should be running or stopped
    Service,
}

impl Kind {
    /// Every registered kind.
    pub const ALL: [Kind; 5] = [
        Kind::Generic,
        Kind::Test,
        Kind::File,
        Kind::Package,
        Kind::Service,
    ];

    /// The tag used in declarations.
    pub fn tag(&self) -> &'static str {
        match self {
            Kind::Generic => "dummy",
            Kind::Test => "test",
            Kind::File => "file",
            Kind::Package => "package",
            Kind::Service => "service",
        }
    }

    /// Attributes a descriptor of this kind must carry, no more and no fewer.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Kind::Generic => &[],
            Kind::Test => placeholder::TEST_FIELDS,
            Kind::File => file::FIELDS,
            Kind::Package => package::FIELDS,
            Kind::Service => service::FIELDS,
        }
    }

    /// Resolve a descriptor's kind tag.
    pub fn of(descriptor: &ResourceDescriptor) -> Result<Kind, ValidationError> {
        descriptor
            .kind
            .parse()
            .map_err(|_| ValidationError::UnknownKind {
                resource: descriptor.name.clone(),
                kind: descriptor.kind.clone(),
                expected: Kind::ALL.map(|k| k.tag()).join(", "),
            })
    }

    /// Check a descriptor against this kind.
    ///
    /// Rejects attributes outside the required set, then missing required
    /// attributes, then kind-specific constraint violations. Pure.
    pub fn validate(&self, descriptor: &ResourceDescriptor) -> Result<(), ValidationError> {
        check_fields(*self, descriptor)?;
        match self {
            Kind::Generic | Kind::Test => Ok(()),
            Kind::File => file::FileSpec::parse(descriptor).map(drop),
            Kind::Package => package::PackageSpec::parse(descriptor).map(drop),
            Kind::Service => service::ServiceSpec::parse(descriptor).map(drop),
        }
    }

    /// Build the resource governing `descriptor`.
    pub fn instantiate(
        &self,
        descriptor: &ResourceDescriptor,
        probes: &Probes,
    ) -> Result<BoxedResource, ValidationError> {
        check_fields(*self, descriptor)?;
        let resource: BoxedResource = match self {
            Kind::Generic | Kind::Test => Box::new(Placeholder::new(*self, descriptor)),
            Kind::File => Box::new(ManagedFile::new(descriptor, probes.fs.clone())?),
            Kind::Package => Box::new(ManagedPackage::new(descriptor, probes.packages.clone())?),
            Kind::Service => Box::new(ManagedService::new(descriptor, probes.services.clone())?),
        };
        Ok(resource)
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.tag() == s)
            .ok_or_else(|| format!("unknown resource kind: {s}"))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

fn check_fields(kind: Kind, descriptor: &ResourceDescriptor) -> Result<(), ValidationError> {
    let required = kind.required_fields();
    let expected = || required.join(", ");

    for key in descriptor.attributes.keys() {
        if !required.contains(&key.as_str()) && !RESERVED_FIELDS.contains(&key.as_str()) {
            return Err(ValidationError::UnexpectedField {
                resource: descriptor.name.clone(),
                kind: kind.tag(),
                field: key.clone(),
                expected: expected(),
            });
        }
    }

    for field in required {
        if !descriptor.attributes.contains_key(*field) {
            return Err(ValidationError::MissingField {
                resource: descriptor.name.clone(),
                kind: kind.tag(),
                field: (*field).to_string(),
                expected: expected(),
            });
        }
    }

    Ok(())
}

/// Fetch a required attribute that must not be blank.
pub(crate) fn required_attr<'a>(
    descriptor: &'a ResourceDescriptor,
    field: &str,
) -> Result<&'a str, ValidationError> {
    let value = descriptor
        .attr(field)
        .ok_or_else(|| ValidationError::MissingField {
            resource: descriptor.name.clone(),
            kind: Kind::of(descriptor).map_or("unknown", |k| k.tag()),
            field: field.to_string(),
            expected: field.to_string(),
        })?;

    if value.trim().is_empty() {
        return Err(invalid(descriptor, field, value, "must not be empty"));
    }
    Ok(value)
}

pub(crate) fn invalid(
    descriptor: &ResourceDescriptor,
    field: &str,
    value: &str,
    reason: &str,
) -> ValidationError {
    ValidationError::InvalidValue {
        resource: descriptor.name.clone(),
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

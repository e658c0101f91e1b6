//! Error taxonomy for reconciliation.
//!
//! Errors are split by the phase that raised them, because each phase has a
//! different failure policy:
//!
//! - [`ValidationError`] is fatal to the whole run and is raised before any
//!   probe or mutation happens.
//! - [`ProbeError`] is local to one resource. Its drift becomes unknown and
//!   the run moves on.
//! - [`MutationError`] is local to one resource. Nothing is rolled back.

use std::io;
use thiserror::Error;

/// A declaration that cannot be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The `kind` tag does not name a registered resource kind.
    #[error("resource '{resource}' has unknown kind '{kind}' (expected one of: {expected})")]
    UnknownKind {
        /// Name of the offending resource
        resource: String,
        /// The declared kind tag
        kind: String,
        /// Comma-separated list of known kind tags
        expected: String,
    },

    /// A required attribute is absent.
    #[error("resource '{resource}' of kind '{kind}' is missing field '{field}' (expected fields: {expected})")]
    MissingField {
        /// Name of the offending resource
        resource: String,
        /// Kind tag of the resource
        kind: &'static str,
        /// The missing attribute
        field: String,
        /// Comma-separated list of required attributes
        expected: String,
    },

    /// An attribute is not part of the kind's required set.
    #[error("resource '{resource}' of kind '{kind}' has unexpected field '{field}' (expected fields: {expected})")]
    UnexpectedField {
        /// Name of the offending resource
        resource: String,
        /// Kind tag of the resource
        kind: &'static str,
        /// The unexpected attribute
        field: String,
        /// Comma-separated list of required attributes
        expected: String,
    },

    /// An attribute is present but its value violates a kind constraint.
    #[error("resource '{resource}' has invalid {field} '{value}': {reason}")]
    InvalidValue {
        /// Name of the offending resource
        resource: String,
        /// The attribute carrying the bad value
        field: String,
        /// The declared value
        value: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Two descriptors share a name.
    #[error("resource '{0}' is declared more than once")]
    DuplicateName(String),

    /// A dependency names no declared resource.
    #[error("resource '{resource}' depends on undeclared resource '{dependency}'")]
    UnknownDependency {
        /// Name of the dependent resource
        resource: String,
        /// The dangling reference
        dependency: String,
    },

    /// A resource lists itself as a dependency.
    #[error("resource '{0}' depends on itself")]
    SelfDependency(String),

    /// A dependency is declared after its dependent.
    #[error(
        "resource '{resource}' depends on '{dependency}', which is declared after it; \
         dependencies must be declared first"
    )]
    ForwardDependency {
        /// Name of the dependent resource
        resource: String,
        /// The dependency declared too late
        dependency: String,
    },
}

/// A read of live system state failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Filesystem or OS call failed.
    #[error("failed to {action} {target}: {source}")]
    Io {
        /// What was being read (e.g. "stat", "read")
        action: &'static str,
        /// Path or name that was probed
        target: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// An external tool answered with an error.
    #[error("{tool} query for '{target}' failed: {message}")]
    Command {
        /// The tool that was queried (e.g. "dpkg-query", "systemctl")
        tool: String,
        /// Name that was probed
        target: String,
        /// Error output from the tool
        message: String,
    },
}

impl ProbeError {
    /// Build an IO probe error.
    pub fn io(action: &'static str, target: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            action,
            target: target.into(),
            source,
        }
    }
}

/// A change to live system state failed.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Filesystem or OS call failed.
    #[error("failed to {action} {target}: {source}")]
    Io {
        /// What was being changed (e.g. "write", "chmod")
        action: &'static str,
        /// Path or name that was mutated
        target: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// An external tool exited unsuccessfully.
    #[error("{tool} failed to {action} '{target}': {message}")]
    Command {
        /// The tool that was run (e.g. "apt-get", "systemctl")
        tool: String,
        /// The attempted action (e.g. "install", "restart")
        action: &'static str,
        /// Name that was mutated
        target: String,
        /// Error output from the tool
        message: String,
    },
}

impl MutationError {
    /// Build an IO mutation error.
    pub fn io(action: &'static str, target: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            action,
            target: target.into(),
            source,
        }
    }
}

/// Any reconciliation error.
#[derive(Debug, Error)]
pub enum Error {
    /// Declaration rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Live state could not be read
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Live state could not be changed
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

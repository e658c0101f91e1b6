//! # Declarative
//!
//! Declarative resource reconciliation.
//!
//! A declaration is an ordered list of [`ResourceDescriptor`]s. Each pass
//! validates the whole declaration, then walks it in order: every resource
//! compares its declared state with live state, records drift in a per-pass
//! [`Ledger`], and (unless the pass is check-only) converges. A resource whose
//! dependency changed is treated as drifted, which is how a service gets
//! restarted after its configuration file was rewritten.
//!
//! ## Core Concepts
//!
//! - **Descriptor**: A named, kinded set of string attributes plus dependencies
//! - **Kind**: The closed registry of resource kinds and their required fields
//! - **Resource**: A validated, live-checkable instance built from a descriptor
//! - **Ledger**: The set of resources found changed so far in the current pass
//! - **Engine**: Runs passes and produces a [`RunReport`]
//!
//! ## Example
//!
//! ```
//! use declarative::memory::{MemoryFileSystem, MemoryPackageManager, MemoryServiceManager};
//! use declarative::{Engine, NoReport, Probes, ResourceDescriptor, RunOptions};
//! use std::sync::Arc;
//!
//! let probes = Probes::new(
//!     Arc::new(MemoryFileSystem::new()),
//!     Arc::new(MemoryPackageManager::new()),
//!     Arc::new(MemoryServiceManager::new()),
//! );
//!
//! let declaration = vec![
//!     ResourceDescriptor::new("app_config", "file")
//!         .with_attr("path", "/etc/app")
//!         .with_attr("name", "config.conf")
//!         .with_attr("mode", "644")
//!         .with_attr("owner", "root")
//!         .with_attr("group", "root")
//!         .with_attr("content", "X=1"),
//!     ResourceDescriptor::new("appd", "service")
//!         .with_attr("name", "appd")
//!         .with_attr("state", "running")
//!         .depends_on("app_config"),
//! ];
//!
//! let report = Engine::new(probes)
//!     .run(&declaration, &RunOptions::check(), &mut NoReport)
//!     .unwrap();
//! assert_eq!(report.drifted().collect::<Vec<_>>(), ["app_config", "appd"]);
//! ```
//!
//! ## Probe Traits
//!
//! All contact with the host goes through three traits:
//!
//! - [`FileSystem`]: Directory and file metadata, content, and mutation
//! - [`PackageManager`]: Installed package status and installation
//! - [`ServiceManager`]: Service activity and start/stop/restart
//!
//! The [`memory`] module has in-memory implementations for tests and
//! dry runs; the binary supplies real ones.

pub mod descriptor;
pub mod engine;
pub mod error;
pub mod kinds;
pub mod ledger;
pub mod memory;
pub mod probe;
pub mod report;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use descriptor::{RESERVED_FIELDS, ResourceDescriptor};
pub use engine::{Engine, validate};
pub use error::{Error, MutationError, ProbeError, Result, ValidationError};
pub use kinds::{Kind, ManagedFile, ManagedPackage, ManagedService, Placeholder, ServiceState};
pub use ledger::Ledger;
pub use probe::{FileStat, FileSystem, PackageManager, PackageStatus, Probes, ServiceManager};
pub use report::{NoReport, ReportSink};
pub use resource::{BoxedResource, Resource};
pub use types::{
    ApplyResult, DriftOutcome, ResourceOutcome, RunOptions, RunReport, RunSummary,
};

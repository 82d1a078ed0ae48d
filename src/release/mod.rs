//! Dependency-ordered crate publishing
//!
//! The pipeline runs in four stages, leaf first:
//!
//! 1. **workspace**: raw `cargo metadata` records become a validated [`Workspace`]
//! 2. **order**: members are sorted so every crate follows its dependencies,
//!    rejecting cycles and dependencies on crates that will never be published
//! 3. **registry**: the registry is queried for what is already published, and
//!    polled until a new version becomes visible
//! 4. **orchestrator**: packages are published one at a time in order
//!
//! Structural problems (bad metadata, cycles, invalid members) abort before
//! anything is uploaded.

pub mod orchestrator;
pub mod order;
pub mod publisher;
pub mod registry;
pub mod workspace;

pub use orchestrator::{Orchestrator, PackageOutcome, PublishReport, SkipReason};
pub use publisher::{CargoPublisher, PublishRequest, Publisher};
pub use registry::{CrateInfo, CratesIoRegistry, PollConfig, Registry, await_published};
pub use workspace::{Dependency, DependencyKind, Package, Workspace, WorkspaceLoader};

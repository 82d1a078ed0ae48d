//! CLI commands for release-crates
//!
//! - **publish**: Publish every workspace crate in dependency order, then tag

pub mod publish;

pub use publish::run_publish;

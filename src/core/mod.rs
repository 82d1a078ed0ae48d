//! Core building blocks shared by every release-crates command
//!
//! - **config**: Publish options and registry settings, built once at the boundary
//! - **error**: Tagged error kinds with contextual help messages
//! - **vcs**: Git tagging (SystemGit)

pub mod config;
pub mod error;
pub mod vcs;

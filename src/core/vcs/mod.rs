//! Git operations (system git)

pub mod system_git;

pub use system_git::SystemGit;

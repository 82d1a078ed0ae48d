//! Cargo CLI integration
//!
//! - **command**: Subprocess execution with deadlines and captured output
//! - **metadata**: `cargo metadata` / `cargo package --list` records

pub mod command;
pub mod metadata;

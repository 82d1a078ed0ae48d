//! Publish the crates of a Cargo workspace in dependency order
//!
//! The `release-crates` binary wraps [`commands::run_publish`]; the pieces it
//! is built from live in [`release`].

pub mod cargo;
pub mod commands;
pub mod core;
pub mod release;
pub mod ui;

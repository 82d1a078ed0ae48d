//! Raw workspace metadata from `cargo metadata` and `cargo package --list`
//!
//! Records are deserialized leniently (every field optional) so that the
//! workspace loader can report exactly which field is missing instead of a
//! generic JSON error.

use super::command;
use crate::core::error::{RailResult, ValidationError};
use cargo_metadata::MetadataCommand;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// `cargo metadata --format-version 1 --no-deps` document
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
  #[serde(default)]
  pub packages: Option<Vec<RawPackage>>,
  #[serde(default)]
  pub workspace_root: Option<PathBuf>,
}

/// One workspace member as cargo reports it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPackage {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub version: Option<String>,
  #[serde(default)]
  pub manifest_path: PathBuf,
  /// `None` = publish anywhere, `[]` = `publish = false`
  #[serde(default)]
  pub publish: Option<Vec<String>>,
  /// Kept untyped so a non-array value is a validation error, not a parse error
  #[serde(default)]
  pub dependencies: Option<serde_json::Value>,
}

/// One dependency entry of a [`RawPackage`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDependency {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub kind: Option<String>,
  #[serde(default)]
  pub req: String,
  #[serde(default)]
  pub path: Option<PathBuf>,
}

impl RawMetadata {
  /// Parse a metadata document
  pub fn parse(raw: &str) -> RailResult<Self> {
    serde_json::from_str(raw).map_err(|e| {
      ValidationError::Metadata {
        reason: e.to_string(),
      }
      .into()
    })
  }
}

/// Workspace introspection through the cargo CLI
pub struct WorkspaceMetadata {
  cargo: PathBuf,
  timeout: Duration,
}

impl WorkspaceMetadata {
  pub fn new(cargo: impl Into<PathBuf>, timeout: Duration) -> Self {
    Self {
      cargo: cargo.into(),
      timeout,
    }
  }

  /// Run `cargo metadata --no-deps` for a manifest
  pub fn load(&self, manifest_path: &Path) -> RailResult<RawMetadata> {
    let cmd = MetadataCommand::new()
      .cargo_path(&self.cargo)
      .manifest_path(manifest_path)
      .no_deps()
      .cargo_command();
    let raw = command::run(
      cmd,
      self.timeout,
      &format!("Failed to get cargo metadata for {}", manifest_path.display()),
    )?;
    RawMetadata::parse(&raw)
  }

  /// Files `cargo package` would include for a member, one per line
  pub fn list_files(&self, manifest_path: &Path) -> RailResult<String> {
    let mut cmd = Command::new(&self.cargo);
    cmd
      .args(["package", "--list", "--allow-dirty", "--manifest-path"])
      .arg(manifest_path);
    command::run(
      cmd,
      self.timeout,
      &format!("Failed to get cargo package list for {}", manifest_path.display()),
    )
  }

  /// Whether a usable cargo is on PATH
  pub fn cargo_available(&self) -> bool {
    let mut cmd = Command::new(&self.cargo);
    cmd.arg("--version");
    match command::run(cmd, self.timeout, "Failed to get cargo version") {
      Ok(version) => {
        tracing::debug!(%version, "found cargo");
        true
      }
      Err(_) => false,
    }
  }
}

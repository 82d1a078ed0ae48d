//! `cargo publish` invocation

use crate::cargo::command;
use crate::core::error::RailResult;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Everything needed to publish one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest<'a> {
  pub name: &'a str,
  pub manifest_path: &'a Path,
  /// Directory the command runs in
  pub workspace_root: &'a Path,
  /// Pass `--dry-run`
  pub dry_run: bool,
  pub allow_dirty: bool,
  pub arguments: &'a [String],
}

impl PublishRequest<'_> {
  /// Arguments after `cargo`
  pub fn args(&self) -> Vec<String> {
    let mut args = vec![
      "publish".to_string(),
      "--package".to_string(),
      self.name.to_string(),
      "--manifest-path".to_string(),
      self.manifest_path.display().to_string(),
    ];
    if self.dry_run {
      args.push("--dry-run".to_string());
    }
    if self.allow_dirty {
      args.push("--allow-dirty".to_string());
    }
    args.extend(self.arguments.iter().cloned());
    args
  }

  /// Error prefix when the command fails
  pub fn action(&self) -> String {
    format!(
      "Failed to publish crate \"{}\"{}",
      self.name,
      if self.dry_run { " (dry-run)" } else { "" }
    )
  }
}

/// Runs the publish step for one package
pub trait Publisher {
  fn publish(&self, request: &PublishRequest<'_>) -> RailResult<()>;
}

/// Publishes through the cargo CLI
pub struct CargoPublisher {
  cargo: PathBuf,
  registry_token: String,
  timeout: Duration,
}

impl CargoPublisher {
  pub fn new(registry_token: impl Into<String>, timeout: Duration) -> Self {
    Self {
      cargo: PathBuf::from("cargo"),
      registry_token: registry_token.into(),
      timeout,
    }
  }

  /// Use a different cargo executable
  pub fn with_cargo(mut self, cargo: impl Into<PathBuf>) -> Self {
    self.cargo = cargo.into();
    self
  }

  fn command(&self, request: &PublishRequest<'_>) -> Command {
    let mut cmd = Command::new(&self.cargo);
    cmd
      .args(request.args())
      .current_dir(request.workspace_root)
      .env("CARGO_REGISTRY_TOKEN", &self.registry_token);
    cmd
  }
}

impl Publisher for CargoPublisher {
  fn publish(&self, request: &PublishRequest<'_>) -> RailResult<()> {
    let cmd = self.command(request);
    println!(
      "   Running \"{}\" in \"{}\"",
      command::describe(&cmd),
      request.workspace_root.display()
    );
    let output = command::run(cmd, self.timeout, &request.action())?;
    if !output.is_empty() {
      tracing::debug!(package = request.name, %output, "cargo publish output");
    }
    Ok(())
  }
}

//! Sequential publishing of a sorted workspace
//!
//! Packages are handled one at a time in publish order. Each package ends in
//! one of three states: skipped, published or failed. In push mode the first
//! failure aborts the run; otherwise it is reported as a warning and the next
//! package is attempted, so a rehearsal reports on every package.

use crate::core::config::{PublishOptions, RegistrySettings};
use crate::core::error::{ErrorKind, RailError, RailResult, ValidationError};
use crate::release::publisher::{PublishRequest, Publisher};
use crate::release::registry::{PollConfig, Registry, await_published};
use crate::release::workspace::{Package, Workspace};
use crate::ui::WorkflowReporter;
use serde::Serialize;

/// Why a package was not published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
  /// `publish = false` or the target registry is not listed
  NotPublishable,
  /// Version 0.0.0
  PlaceholderVersion,
  /// Exact version already in the registry (push mode only)
  AlreadyPublished,
  /// Registry has a newer max version and `only_newest` is set
  NotNewest,
}

impl SkipReason {
  pub fn describe(&self) -> &'static str {
    match self {
      SkipReason::NotPublishable => "it is not published",
      SkipReason::PlaceholderVersion => "it has version \"0.0.0\"",
      SkipReason::AlreadyPublished => "this version is already published",
      SkipReason::NotNewest => "it is not the newest version",
    }
  }
}

/// Terminal state of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PackageOutcome {
  Skipped { reason: SkipReason },
  Published,
  Failed { kind: ErrorKind, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
  pub name: String,
  pub version: String,
  #[serde(flatten)]
  pub outcome: PackageOutcome,
}

/// Outcome of a publish run, in publish order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishReport {
  pub push: bool,
  pub packages: Vec<PackageReport>,
}

impl PublishReport {
  /// Names that were published (or rehearsed) without error, in order
  pub fn published(&self) -> Vec<String> {
    self
      .packages
      .iter()
      .filter(|p| p.outcome == PackageOutcome::Published)
      .map(|p| p.name.clone())
      .collect()
  }

  pub fn is_published(&self, name: &str) -> bool {
    self
      .packages
      .iter()
      .any(|p| p.name == name && p.outcome == PackageOutcome::Published)
  }

  pub fn failed(&self) -> usize {
    self
      .packages
      .iter()
      .filter(|p| matches!(p.outcome, PackageOutcome::Failed { .. }))
      .count()
  }

  pub fn skipped(&self) -> usize {
    self
      .packages
      .iter()
      .filter(|p| matches!(p.outcome, PackageOutcome::Skipped { .. }))
      .count()
  }
}

/// Collaborators of a publish run
pub struct Orchestrator<'a> {
  pub registry: &'a dyn Registry,
  pub publisher: &'a dyn Publisher,
  pub reporter: &'a WorkflowReporter,
}

impl Orchestrator<'_> {
  /// Publish every package of `order`
  ///
  /// `push` is the effective push mode (`push && !dry_run`).
  pub fn publish(
    &self,
    workspace: &Workspace,
    order: &[String],
    options: &PublishOptions,
    settings: &RegistrySettings,
    push: bool,
  ) -> RailResult<PublishReport> {
    let mut report = PublishReport {
      push,
      packages: Vec::with_capacity(order.len()),
    };

    for name in order {
      let Some(package) = workspace.get(name) else {
        continue;
      };

      let outcome = match self.publish_package(workspace, package, options, settings, push) {
        Ok(Some(reason)) => {
          println!("⏭️  Skipping {} because {}", package.name, reason.describe());
          PackageOutcome::Skipped { reason }
        }
        Ok(None) => PackageOutcome::Published,
        Err(e) if push => return Err(e),
        Err(e) => {
          self.reporter.warning(&e.to_string());
          PackageOutcome::Failed {
            kind: e.kind(),
            error: e.to_string(),
          }
        }
      };

      report.packages.push(PackageReport {
        name: package.name.clone(),
        version: package.version_string.clone(),
        outcome,
      });
    }

    Ok(report)
  }

  /// `Ok(Some(reason))` when skipped, `Ok(None)` when published
  fn publish_package(
    &self,
    workspace: &Workspace,
    package: &Package,
    options: &PublishOptions,
    settings: &RegistrySettings,
    push: bool,
  ) -> RailResult<Option<SkipReason>> {
    if !package.publish {
      return Ok(Some(SkipReason::NotPublishable));
    }
    if package.is_placeholder() {
      return Ok(Some(SkipReason::PlaceholderVersion));
    }

    if let Some(reason) = self.check_registry(package, options, push)? {
      return Ok(Some(reason));
    }

    let mode = if push { "" } else { " (dry-run)" };
    self
      .reporter
      .start_group(&format!("Publishing {} {}{}", package.name, package.version_string, mode));
    let result = self.run_publish(workspace, package, options, settings, push);
    self.reporter.end_group();
    result?;

    Ok(None)
  }

  fn check_registry(&self, package: &Package, options: &PublishOptions, push: bool) -> RailResult<Option<SkipReason>> {
    let Some(info) = self.registry.fetch(&package.name)? else {
      tracing::debug!(package = %package.name, "not in registry yet");
      return Ok(None);
    };
    tracing::debug!(package = %package.name, max_version = %info.krate.max_version, "registry state");

    if push && info.has_version(&package.version_string) {
      return Ok(Some(SkipReason::AlreadyPublished));
    }

    let max_version = semver::Version::parse(&info.krate.max_version).map_err(|_| {
      RailError::Validation(ValidationError::PublishedVersion {
        package: package.name.clone(),
        value: info.krate.max_version.clone(),
      })
    })?;
    if options.only_newest && package.version < max_version {
      return Ok(Some(SkipReason::NotNewest));
    }

    Ok(None)
  }

  fn run_publish(
    &self,
    workspace: &Workspace,
    package: &Package,
    options: &PublishOptions,
    settings: &RegistrySettings,
    push: bool,
  ) -> RailResult<()> {
    if push {
      self
        .reporter
        .notice(&format!("Publishing crate \"{}\" version \"{}\"", package.name, package.version_string));
    }

    let request = PublishRequest {
      name: &package.name,
      manifest_path: &package.path,
      workspace_root: &workspace.root,
      dry_run: !push,
      allow_dirty: options.allow_dirty,
      arguments: &options.arguments,
    };
    self.publisher.publish(&request)?;

    if !options.dry_run {
      let config = PollConfig::new(settings.poll_interval(), settings.propagation_timeout(push));
      await_published(self.registry, &package.name, &package.version_string, config)?;
    }

    Ok(())
  }
}

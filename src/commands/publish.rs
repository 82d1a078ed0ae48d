//! Publish command implementation
//!
//! Loads the workspace, computes the publish order, publishes every package
//! and finally tags the release of the chosen crate.

use crate::cargo::metadata::WorkspaceMetadata;
use crate::core::config::{PublishOptions, RegistrySettings};
use crate::core::error::{RailError, RailResult};
use crate::core::vcs::SystemGit;
use crate::release::{CargoPublisher, CratesIoRegistry, Orchestrator, PublishReport, Workspace, WorkspaceLoader, order};
use crate::ui::WorkflowReporter;

/// Remote that release tags are pushed to
const TAG_REMOTE: &str = "origin";

/// Run the publish command
///
/// `push` requests a real upload; it is ignored when `options.dry_run` is set.
pub fn run_publish(
  options: &PublishOptions,
  settings: &RegistrySettings,
  push: bool,
  reporter: &WorkflowReporter,
  json: bool,
) -> RailResult<()> {
  let metadata = WorkspaceMetadata::new(options.cargo_program(), settings.command_timeout());
  if !metadata.cargo_available() {
    return Err(RailError::with_help(
      "Cargo could not be found",
      "Make sure a Rust toolchain is installed and cargo is on PATH.",
    ));
  }

  options.validate(push)?;
  let push = options.effective_push(push);
  tracing::debug!(directory = %options.directory.display(), push, "publish options");

  let raw = metadata.load(&options.manifest_path())?;
  let workspace = WorkspaceLoader::new(&settings.registry_name, |manifest| metadata.list_files(manifest)).load(raw)?;
  let order = order::sort(&workspace)?;
  println!("🔍 Processing {} crates: {}", order.len(), order.join(", "));

  let registry = CratesIoRegistry::new(settings)?;
  let publisher =
    CargoPublisher::new(options.registry_token.clone(), settings.command_timeout()).with_cargo(options.cargo_program());
  let orchestrator = Orchestrator {
    registry: &registry,
    publisher: &publisher,
    reporter,
  };
  let report = orchestrator.publish(&workspace, &order, options, settings, push)?;

  release_outputs(&workspace, &report, options, push, reporter)?;

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_summary(&report);
  }

  Ok(())
}

/// Tag the chosen crate and write the step outputs
pub fn release_outputs(
  workspace: &Workspace,
  report: &PublishReport,
  options: &PublishOptions,
  push: bool,
  reporter: &WorkflowReporter,
) -> RailResult<()> {
  let tagged = options
    .tag_crate
    .as_deref()
    .filter(|name| report.is_published(name))
    .and_then(|name| workspace.get(name));

  match tagged {
    Some(package) => {
      let tag = format!("v{}", package.version_string);
      println!(
        "🏷️  Creating tag {} for {} {}{}",
        tag,
        package.name,
        package.version_string,
        if push { "" } else { " (dry-run)" }
      );

      let git = SystemGit::open(&options.repository_dir())?;
      tracing::debug!(work_tree = %git.work_tree().display(), %tag, "tagging");
      git.create_tag(&tag)?;
      if push {
        git.push_tag(TAG_REMOTE, &tag)?;
      }

      reporter.set_output("tag", &tag)?;
      reporter.set_output("version", &package.version_string)?;
    }
    None => {
      if let Some(name) = &options.tag_crate {
        tracing::info!(package = %name, "tag crate was not published, no tag created");
      }
      reporter.set_output("tag", "")?;
      reporter.set_output("version", "")?;
    }
  }

  let published = report.published();
  reporter.set_output("published", &serde_json::to_string(&published)?)?;

  if push && !published.is_empty() {
    reporter.notice(&format!(
      "Published {} crate{}: {}",
      published.len(),
      if published.len() == 1 { "" } else { "s" },
      published.join(", ")
    ));
  }

  Ok(())
}

fn print_summary(report: &PublishReport) {
  let published = report.published();
  let verb = if report.push { "Published" } else { "Checked" };

  println!();
  println!(
    "{} {} crate(s), skipped {}, failed {}",
    verb,
    published.len(),
    report.skipped(),
    report.failed()
  );
  for name in &published {
    println!("  ✅ {}", name);
  }
}

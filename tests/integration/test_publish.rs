//! Integration tests for `release-crates publish`

use crate::helpers::{TestWorkspace, git, stderr, stdout};
use anyhow::Result;

fn names(calls: &[(String, bool)]) -> Vec<&str> {
  calls.iter().map(|(name, _)| name.as_str()).collect()
}

#[test]
fn test_dry_run_publishes_in_dependency_order() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("a", "0.1.0", true, &[("c", "normal"), ("d", "normal")])?;
  ws.add_crate("b", "0.1.0", true, &[])?;
  ws.add_crate("c", "0.1.0", true, &[("b", "normal")])?;
  ws.prepare()?;

  let output = ws.run(&["publish", "--dry-run"], &[])?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  assert!(stdout(&output).contains("Processing 3 crates: b, c, a"));
  let calls = ws.publish_calls()?;
  assert_eq!(names(&calls), vec!["b", "c", "a"]);
  assert!(calls.iter().all(|(_, dry_run)| *dry_run));
  assert_eq!(ws.outputs()?, "tag=\nversion=\npublished=[\"b\",\"c\",\"a\"]\n");

  Ok(())
}

#[test]
fn test_dev_dependencies_do_not_gate_order() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("app", "0.1.0", true, &[("testkit", "dev")])?;
  ws.add_crate("testkit", "0.1.0", true, &[("app", "normal")])?;
  ws.prepare()?;

  let output = ws.run(&["publish", "--dry-run"], &[])?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert_eq!(names(&ws.publish_calls()?), vec!["app", "testkit"]);

  Ok(())
}

#[test]
fn test_push_publishes_waits_and_tags() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("core", "0.2.0", true, &[])?;
  ws.add_crate("app", "0.2.0", true, &[("core", "normal")])?;
  let origin = ws.add_origin()?;
  ws.prepare()?;

  let output = ws.run(
    &["publish", "--tag-crate", "app"],
    &[("INPUT_CRATES-TOKEN", "secret"), ("GITHUB_ACTIONS", "true")],
  )?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  assert_eq!(
    ws.publish_calls()?,
    vec![("core".to_string(), false), ("app".to_string(), false)]
  );
  assert_eq!(
    ws.outputs()?,
    "tag=v0.2.0\nversion=0.2.0\npublished=[\"core\",\"app\"]\n"
  );

  let out = stdout(&output);
  assert!(out.contains("::group::Publishing core 0.2.0"));
  assert!(out.contains("::notice::Published 2 crates: core, app"));

  // Tag exists locally and on the remote, pointing at HEAD
  let head = git(&ws.path, &["rev-parse", "HEAD"])?;
  let remote_tag = git(&origin, &["rev-parse", "refs/tags/v0.2.0"])?;
  assert_eq!(
    String::from_utf8_lossy(&remote_tag.stdout).trim(),
    String::from_utf8_lossy(&head.stdout).trim()
  );

  Ok(())
}

#[test]
fn test_no_push_keeps_tag_local() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("core", "1.0.0", true, &[])?;
  let origin = ws.add_origin()?;
  ws.prepare()?;

  // Dry run: no polling, tag created but not pushed
  let output = ws.run(&["publish", "--dry-run", "--tag-crate", "core"], &[])?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  assert!(git(&ws.path, &["rev-parse", "refs/tags/v1.0.0"]).is_ok());
  assert!(git(&origin, &["rev-parse", "refs/tags/v1.0.0"]).is_err());
  assert!(ws.outputs()?.starts_with("tag=v1.0.0\nversion=1.0.0\n"));

  Ok(())
}

#[test]
fn test_already_published_version_is_skipped() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("core", "1.0.0", true, &[])?;
  ws.existing_versions("core", &["0.9.0", "1.0.0"]);
  ws.prepare()?;

  let output = ws.run(&["publish", "--crates-token", "secret"], &[])?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  assert!(stdout(&output).contains("already published"));
  assert!(ws.publish_calls()?.is_empty());
  assert!(ws.outputs()?.ends_with("published=[]\n"));

  Ok(())
}

#[test]
fn test_only_newest_from_action_input() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("core", "1.0.0", true, &[])?;
  ws.add_crate("cli", "2.0.0", true, &[])?;
  ws.existing_versions("core", &["1.0.0", "1.2.0"]);
  ws.existing_versions("cli", &["1.0.0"]);
  ws.prepare()?;

  let output = ws.run(&["publish"], &[("INPUT_DRY-RUN", "true"), ("INPUT_ONLY-NEWEST", "true")])?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  assert!(stdout(&output).contains("not the newest version"));
  assert_eq!(names(&ws.publish_calls()?), vec!["cli"]);

  Ok(())
}

#[test]
fn test_unpublishable_and_placeholder_crates_are_skipped() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("internal", "0.1.0", false, &[])?;
  ws.add_crate("scratch", "0.0.0", true, &[])?;
  ws.add_crate("core", "0.1.0", true, &[("internal", "dev")])?;
  ws.prepare()?;

  let output = ws.run(&["publish", "--dry-run", "--json"], &[])?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  let out = stdout(&output);
  assert!(out.contains("\"reason\": \"not-publishable\""));
  assert!(out.contains("\"reason\": \"placeholder-version\""));
  assert_eq!(names(&ws.publish_calls()?), vec!["core"]);

  Ok(())
}

#[test]
fn test_dry_run_failure_continues() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("a", "0.1.0", true, &[])?;
  ws.add_crate("b", "0.1.0", true, &[])?;
  ws.add_crate("c", "0.1.0", true, &[])?;
  ws.fail_publish("b")?;
  ws.prepare()?;

  let output = ws.run(&["publish", "--dry-run"], &[])?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  assert!(stdout(&output).contains("Failed to publish crate \"b\" (dry-run)"));
  assert_eq!(names(&ws.publish_calls()?), vec!["a", "b", "c"]);
  assert!(ws.outputs()?.ends_with("published=[\"a\",\"c\"]\n"));

  Ok(())
}

#[test]
fn test_push_failure_aborts_run() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("a", "0.1.0", true, &[])?;
  ws.add_crate("b", "0.1.0", true, &[])?;
  ws.fail_publish("a")?;
  ws.prepare()?;

  let output = ws.run(&["publish", "--crates-token", "secret"], &[])?;
  assert_eq!(output.status.code(), Some(2));

  assert!(stderr(&output).contains("Failed to publish crate \"a\""));
  assert_eq!(names(&ws.publish_calls()?), vec!["a"]);
  assert_eq!(ws.outputs()?, "");

  Ok(())
}

#[test]
fn test_extra_arguments_are_passed_through() -> Result<()> {
  let mut ws = TestWorkspace::new()?;
  ws.add_crate("core", "0.1.0", true, &[])?;
  ws.prepare()?;

  let output = ws.run(
    &["publish", "--dry-run", "--allow-dirty", "--arguments", "--no-verify --locked"],
    &[],
  )?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  assert!(stdout(&output).contains("--dry-run --allow-dirty --no-verify --locked"));

  Ok(())
}

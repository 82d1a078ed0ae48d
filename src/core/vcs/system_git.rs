//! System git backend
//!
//! Tagging is the only git work the release pipeline does, so this is a thin
//! wrapper around `git tag` / `git push` with an isolated environment.

use crate::core::error::{GitError, RailError, RailResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git backend using system git
pub struct SystemGit {
  /// Working tree root
  work_tree: PathBuf,
}

impl SystemGit {
  /// Open a git repository
  pub fn open(path: &Path) -> RailResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(RailError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(RailError::message(format!("Failed to open git repository: {}", stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let work_tree = stdout.trim();

    Ok(Self {
      work_tree: PathBuf::from(work_tree),
    })
  }

  /// Working tree root
  pub fn work_tree(&self) -> &Path {
    &self.work_tree
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> RailResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "HEAD"])
      .output()
      .context("Failed to get HEAD commit")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(RailError::Git(GitError::CommandFailed {
        command: "git rev-parse HEAD".to_string(),
        stderr: stderr.to_string(),
      }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Create (or move, with `-f`) a lightweight tag at HEAD
  pub fn create_tag(&self, tag: &str) -> RailResult<()> {
    let output = self
      .git_cmd()
      .args(["tag", "-f", tag])
      .output()
      .context("Failed to run git tag")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(RailError::Git(GitError::CommandFailed {
        command: format!("git tag -f {}", tag),
        stderr: stderr.to_string(),
      }));
    }

    Ok(())
  }

  /// Force-push a tag by exact ref name
  pub fn push_tag(&self, remote_name: &str, tag: &str) -> RailResult<()> {
    let refspec = format!("refs/tags/{tag}:refs/tags/{tag}");

    let output = self
      .git_cmd()
      .args(["push", "-u", remote_name, "--force", &refspec])
      .output()
      .context("Failed to push tag")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(RailError::Git(GitError::PushFailed {
        remote: remote_name.to_string(),
        refspec,
        reason: stderr.to_string(),
      }));
    }

    Ok(())
  }

  /// Commit a tag points at, if the tag exists
  pub fn tag_target(&self, tag: &str) -> RailResult<Option<String>> {
    let output = self
      .git_cmd()
      .args(["rev-list", "-n", "1", &format!("refs/tags/{}", tag)])
      .output()
      .context("Failed to resolve tag")?;

    if !output.status.success() {
      return Ok(None);
    }

    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
  }

  /// Create a git command with isolated environment
  ///
  /// - Runs in the working tree root
  /// - Clears environment variables
  /// - Whitelists only PATH and HOME
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");

    cmd.arg("-C").arg(&self.work_tree);

    // Don't trust ambient GIT_* variables
    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }

    cmd.arg("-c").arg("advice.detachedHead=false");

    cmd
  }
}

//! Run configuration
//!
//! Everything the publish pipeline needs is collected into two records at the
//! process boundary: [`PublishOptions`] (what to publish, from CLI flags or action
//! inputs) and [`RegistrySettings`] (where to publish and how long to wait, from an
//! optional settings file). The core never reads the environment itself.

use crate::core::error::{ConfigError, RailError, RailResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options for a publish run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublishOptions {
  /// GitHub token; accepted as an input only, tag pushes use the checkout's git credentials
  #[serde(skip_serializing)]
  pub github_token: String,
  /// Registry token, exported to cargo as `CARGO_REGISTRY_TOKEN`
  #[serde(skip_serializing)]
  pub registry_token: String,
  /// Workspace directory (or path to a `Cargo.toml`)
  pub directory: PathBuf,
  /// Run `cargo publish --dry-run` and skip propagation polling
  pub dry_run: bool,
  /// Pass `--allow-dirty` to cargo
  pub allow_dirty: bool,
  /// Skip crates whose local version is older than the registry max version
  pub only_newest: bool,
  /// Crate whose version becomes the `v{version}` tag once published
  pub tag_crate: Option<String>,
  /// Extra arguments for `cargo publish`
  pub arguments: Vec<String>,
  /// Cargo executable, `cargo` from PATH when unset
  #[serde(skip_serializing)]
  pub cargo: Option<PathBuf>,
}

impl PublishOptions {
  /// Build options from raw input strings, resolving `directory` against `cwd`
  #[allow(clippy::too_many_arguments)]
  pub fn from_inputs(
    cwd: &Path,
    github_token: &str,
    registry_token: &str,
    directory: &str,
    dry_run: bool,
    allow_dirty: bool,
    only_newest: bool,
    tag_crate: &str,
    arguments: &str,
  ) -> Self {
    let directory = if directory.trim().is_empty() { "." } else { directory.trim() };
    let tag_crate = tag_crate.trim();

    Self {
      github_token: github_token.trim().to_string(),
      registry_token: registry_token.trim().to_string(),
      directory: normalize(&cwd.join(directory)),
      dry_run,
      allow_dirty,
      only_newest,
      tag_crate: (!tag_crate.is_empty()).then(|| tag_crate.to_string()),
      arguments: arguments.split_whitespace().map(String::from).collect(),
      cargo: None,
    }
  }

  /// Use a specific cargo executable
  pub fn with_cargo(mut self, cargo: Option<PathBuf>) -> Self {
    self.cargo = cargo;
    self
  }

  /// Cargo executable for every subprocess of the run
  pub fn cargo_program(&self) -> PathBuf {
    self.cargo.clone().unwrap_or_else(|| PathBuf::from("cargo"))
  }

  /// Whether a run with the caller's `push` request actually uploads
  pub fn effective_push(&self, push: bool) -> bool {
    push && !self.dry_run
  }

  /// Check invariants that depend on the push mode
  pub fn validate(&self, push: bool) -> RailResult<()> {
    if self.effective_push(push) && self.registry_token.is_empty() {
      return Err(RailError::Config(ConfigError::MissingField {
        field: "crates-token".to_string(),
      }));
    }
    Ok(())
  }

  /// Manifest path for `cargo metadata`
  pub fn manifest_path(&self) -> PathBuf {
    if self.directory.file_name().is_some_and(|n| n == "Cargo.toml") {
      self.directory.clone()
    } else {
      self.directory.join("Cargo.toml")
    }
  }

  /// Directory git commands run in
  pub fn repository_dir(&self) -> PathBuf {
    if self.directory.file_name().is_some_and(|n| n == "Cargo.toml") {
      self
        .directory
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| self.directory.clone())
    } else {
      self.directory.clone()
    }
  }
}

/// Drop `.` components so logged paths stay readable
fn normalize(path: &Path) -> PathBuf {
  path
    .components()
    .filter(|c| !matches!(c, std::path::Component::CurDir))
    .collect()
}

/// Registry endpoint and timing settings
///
/// Searched in order: release-crates.toml, .release-crates.toml,
/// .github/release-crates.toml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
  /// Base URL of the registry web API
  pub api_url: String,
  /// User agent sent with API requests (crates.io rejects anonymous clients)
  pub user_agent: String,
  /// Registry name matched against a package's `publish` list
  pub registry_name: String,
  /// Delay between propagation checks
  pub poll_interval_ms: u64,
  /// Propagation deadline when actually publishing
  pub push_timeout_ms: u64,
  /// Propagation deadline in non-push runs
  pub rehearsal_timeout_ms: u64,
  /// Deadline for each cargo subprocess
  pub command_timeout_ms: u64,
}

impl Default for RegistrySettings {
  fn default() -> Self {
    Self {
      api_url: "https://crates.io/api/v1".to_string(),
      user_agent: "release-crates".to_string(),
      registry_name: "crates-io".to_string(),
      poll_interval_ms: 2_000,
      push_timeout_ms: 60_000,
      rehearsal_timeout_ms: 10_000,
      command_timeout_ms: 180_000,
    }
  }
}

impl RegistrySettings {
  /// Find the settings file in search order
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("release-crates.toml"),
      path.join(".release-crates.toml"),
      path.join(".github").join("release-crates.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load settings from the first file found, or defaults
  pub fn load(path: &Path) -> RailResult<Self> {
    let Some(config_path) = Self::find_config_path(path) else {
      return Ok(Self::default());
    };

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read settings from {}", config_path.display()))?;
    let settings: RegistrySettings = toml_edit::de::from_str(&content).map_err(|e| {
      RailError::Config(ConfigError::ParseFailed {
        path: config_path.clone(),
        reason: e.to_string(),
      })
    })?;

    settings.validate()?;
    Ok(settings)
  }

  /// Validate settings
  pub fn validate(&self) -> RailResult<()> {
    if !(self.api_url.starts_with("https://") || self.api_url.starts_with("http://")) {
      return Err(invalid("api_url", format!("'{}' is not an http(s) URL", self.api_url)));
    }
    if self.user_agent.trim().is_empty() {
      return Err(invalid("user_agent", "must not be empty"));
    }
    if self.registry_name.trim().is_empty() {
      return Err(invalid("registry_name", "must not be empty"));
    }
    if self.poll_interval_ms == 0 {
      return Err(invalid("poll_interval_ms", "must be greater than zero"));
    }
    for (field, value) in [
      ("push_timeout_ms", self.push_timeout_ms),
      ("rehearsal_timeout_ms", self.rehearsal_timeout_ms),
    ] {
      if value < self.poll_interval_ms {
        return Err(invalid(
          field,
          format!("{}ms is shorter than poll_interval_ms ({}ms)", value, self.poll_interval_ms),
        ));
      }
    }
    if self.command_timeout_ms == 0 {
      return Err(invalid("command_timeout_ms", "must be greater than zero"));
    }
    Ok(())
  }

  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  /// Propagation deadline for the given mode
  pub fn propagation_timeout(&self, push: bool) -> Duration {
    Duration::from_millis(if push {
      self.push_timeout_ms
    } else {
      self.rehearsal_timeout_ms
    })
  }

  pub fn command_timeout(&self) -> Duration {
    Duration::from_millis(self.command_timeout_ms)
  }
}

fn invalid(field: &str, reason: impl Into<String>) -> RailError {
  RailError::Config(ConfigError::InvalidValue {
    field: field.to_string(),
    reason: reason.into(),
  })
}

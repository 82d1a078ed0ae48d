//! Registry queries and propagation polling
//!
//! A freshly published version takes a moment to show up in the registry API.
//! [`Poller`] models the wait as a small state machine: it stays in
//! [`PollState::Polling`] until the exact version string is listed
//! ([`PollState::Found`]) or the deadline passes ([`PollState::TimedOut`]).

use crate::core::config::RegistrySettings;
use crate::core::error::{RailError, RailResult, RegistryError, TimeoutError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// `GET /crates/{name}` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrateInfo {
  #[serde(rename = "crate")]
  pub krate: CrateSummary,
  #[serde(default)]
  pub versions: Vec<CrateVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrateSummary {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
  pub max_version: String,
  #[serde(default)]
  pub newest_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrateVersion {
  pub num: String,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

impl CrateInfo {
  /// Whether the exact version string is listed
  pub fn has_version(&self, version: &str) -> bool {
    self.versions.iter().any(|v| v.num == version)
  }
}

/// Read access to a package registry
pub trait Registry {
  /// Current registry state of a crate, `None` if it was never published
  fn fetch(&self, name: &str) -> RailResult<Option<CrateInfo>>;
}

/// crates.io web API client
pub struct CratesIoRegistry {
  client: reqwest::blocking::Client,
  api_url: String,
}

impl CratesIoRegistry {
  pub fn new(settings: &RegistrySettings) -> RailResult<Self> {
    let client = reqwest::blocking::Client::builder()
      .user_agent(settings.user_agent.clone())
      .timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| RailError::message(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self {
      client,
      api_url: settings.api_url.trim_end_matches('/').to_string(),
    })
  }
}

impl Registry for CratesIoRegistry {
  fn fetch(&self, name: &str) -> RailResult<Option<CrateInfo>> {
    let url = format!("{}/crates/{}", self.api_url, name);
    tracing::debug!(%url, "querying registry");

    let request_error = |e: reqwest::Error| RegistryError::Request {
      package: name.to_string(),
      message: e.to_string(),
    };
    let response = self
      .client
      .get(&url)
      .header(reqwest::header::ACCEPT, "application/json")
      .send()
      .map_err(request_error)?;

    let status = response.status();
    let reason = status.canonical_reason().unwrap_or_default().to_string();
    let body = response.text().map_err(request_error)?;

    parse_response(name, status.as_u16(), &reason, &body)
  }
}

/// Interpret a registry response
///
/// 404 means the crate was never published. Any other non-2xx status, or a
/// body that is not a crate document with an `id`, is a [`RegistryError`].
pub fn parse_response(name: &str, status: u16, reason: &str, body: &str) -> RailResult<Option<CrateInfo>> {
  if status == 404 {
    return Ok(None);
  }
  if !(200..300).contains(&status) {
    return Err(
      RegistryError::Status {
        package: name.to_string(),
        status,
        reason: reason.to_string(),
      }
      .into(),
    );
  }

  let info: CrateInfo = serde_json::from_str(body).map_err(|e| RegistryError::InvalidResponse {
    package: name.to_string(),
    detail: e.to_string(),
  })?;
  if info.krate.id.is_empty() {
    return Err(
      RegistryError::InvalidResponse {
        package: name.to_string(),
        detail: "missing crate id".to_string(),
      }
      .into(),
    );
  }

  Ok(Some(info))
}

/// Poll timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
  /// Sleep before each query
  pub interval: Duration,
  /// No new query starts once this much time has passed
  pub timeout: Duration,
}

impl PollConfig {
  pub fn new(interval: Duration, timeout: Duration) -> Self {
    Self { interval, timeout }
  }
}

impl Default for PollConfig {
  fn default() -> Self {
    Self::new(Duration::from_secs(2), Duration::from_secs(60))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
  Polling { attempts: u32 },
  Found(CrateInfo),
  TimedOut { attempts: u32 },
}

impl PollState {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, PollState::Polling { .. })
  }
}

/// Waits for one crate version to become visible in a registry
pub struct Poller<'a, R: Registry + ?Sized> {
  registry: &'a R,
  name: &'a str,
  version: &'a str,
  config: PollConfig,
  started: Instant,
  state: PollState,
}

impl<'a, R: Registry + ?Sized> Poller<'a, R> {
  /// The deadline starts counting here
  pub fn new(registry: &'a R, name: &'a str, version: &'a str, config: PollConfig) -> Self {
    Self {
      registry,
      name,
      version,
      config,
      started: Instant::now(),
      state: PollState::Polling { attempts: 0 },
    }
  }

  pub fn state(&self) -> &PollState {
    &self.state
  }

  /// Advance by one sleep-then-query cycle; terminal states are sticky
  pub fn step(&mut self) -> &PollState {
    let PollState::Polling { attempts } = self.state else {
      return &self.state;
    };

    if self.started.elapsed() >= self.config.timeout {
      self.state = PollState::TimedOut { attempts };
      return &self.state;
    }

    println!("   ⏳ Waiting for {} {} to be published", self.name, self.version);
    thread::sleep(self.config.interval);
    let attempts = attempts + 1;

    self.state = match self.registry.fetch(self.name) {
      Ok(Some(info)) if info.has_version(self.version) => {
        tracing::info!(package = self.name, version = self.version, attempts, "version is published");
        PollState::Found(info)
      }
      Ok(Some(info)) => {
        tracing::info!(
          package = self.name,
          version = self.version,
          newest = %info.krate.newest_version,
          "version not listed yet"
        );
        PollState::Polling { attempts }
      }
      Ok(None) => {
        tracing::info!(package = self.name, "crate not found in registry yet");
        PollState::Polling { attempts }
      }
      Err(e) => {
        tracing::warn!(package = self.name, error = %e, "registry query failed, retrying");
        PollState::Polling { attempts }
      }
    };
    &self.state
  }

  /// Step until a terminal state
  pub fn run(mut self) -> RailResult<CrateInfo> {
    while !self.step().is_terminal() {}

    match self.state {
      PollState::Found(info) => Ok(info),
      _ => Err(
        TimeoutError {
          package: self.name.to_string(),
          version: self.version.to_string(),
          timeout: self.config.timeout,
        }
        .into(),
      ),
    }
  }
}

/// Block until `version` of `name` is listed by the registry
pub fn await_published<R: Registry + ?Sized>(
  registry: &R,
  name: &str,
  version: &str,
  config: PollConfig,
) -> RailResult<CrateInfo> {
  Poller::new(registry, name, version, config).run()
}

//! Error types for release-crates with contextual messages and exit codes
//!
//! Every fallible operation returns [`RailResult`]. Errors are tagged by kind so
//! callers (the publish orchestrator in particular) can branch on what went wrong
//! instead of inspecting message strings.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Exit codes for release-crates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing token)
  User = 1,
  /// System error (git, cargo, network, I/O)
  System = 2,
  /// Validation failure (malformed metadata, illegal dependency graph)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Coarse error category, used for reporting and push/dry-run branching
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
  Config,
  Validation,
  CyclicDependency,
  InvalidMember,
  Registry,
  Timeout,
  Command,
  Git,
  Io,
  Other,
}

/// Main error type for release-crates
#[derive(Debug)]
pub enum RailError {
  /// Configuration errors
  Config(ConfigError),

  /// Malformed or missing workspace metadata
  Validation(ValidationError),

  /// Dependency cycles between workspace members
  Cycle(CycleError),

  /// Publishable crate depending on a member that cannot be published
  InvalidMember(InvalidMemberError),

  /// Registry API errors
  Registry(RegistryError),

  /// Registry never showed the expected version
  Timeout(TimeoutError),

  /// External command (cargo) failed
  Command(CommandError),

  /// Git operation errors
  Git(GitError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl RailError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      RailError::Message { message, context, help } => RailError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      RailError::Io(err) => RailError::Message {
        message: format!("{}: {}", ctx_str, err),
        context: None,
        help: None,
      },
      _ => self,
    }
  }

  /// Kind of this error
  pub fn kind(&self) -> ErrorKind {
    match self {
      RailError::Config(_) => ErrorKind::Config,
      RailError::Validation(_) => ErrorKind::Validation,
      RailError::Cycle(_) => ErrorKind::CyclicDependency,
      RailError::InvalidMember(_) => ErrorKind::InvalidMember,
      RailError::Registry(_) => ErrorKind::Registry,
      RailError::Timeout(_) => ErrorKind::Timeout,
      RailError::Command(_) => ErrorKind::Command,
      RailError::Git(_) => ErrorKind::Git,
      RailError::Io(_) => ErrorKind::Io,
      RailError::Message { .. } => ErrorKind::Other,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      RailError::Config(_) => ExitCode::User,
      RailError::Validation(_) | RailError::Cycle(_) | RailError::InvalidMember(_) => ExitCode::Validation,
      RailError::Registry(_) | RailError::Timeout(_) | RailError::Command(_) => ExitCode::System,
      RailError::Git(_) | RailError::Io(_) => ExitCode::System,
      RailError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      RailError::Config(e) => e.help_message(),
      RailError::Cycle(_) => Some("Move the shared code into a new crate, or turn one edge into a dev-dependency.".to_string()),
      RailError::InvalidMember(e) => e.help_message(),
      RailError::Timeout(_) => {
        Some("The registry index may be lagging. Re-run once the version shows up; published crates are skipped.".to_string())
      }
      RailError::Git(e) => e.help_message(),
      RailError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for RailError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RailError::Config(e) => write!(f, "{}", e),
      RailError::Validation(e) => write!(f, "{}", e),
      RailError::Cycle(e) => write!(f, "{}", e),
      RailError::InvalidMember(e) => write!(f, "{}", e),
      RailError::Registry(e) => write!(f, "{}", e),
      RailError::Timeout(e) => write!(f, "{}", e),
      RailError::Command(e) => write!(f, "{}", e),
      RailError::Git(e) => write!(f, "{}", e),
      RailError::Io(e) => write!(f, "I/O error: {}", e),
      RailError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for RailError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      RailError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for RailError {
  fn from(err: io::Error) -> Self {
    RailError::Io(err)
  }
}

impl From<String> for RailError {
  fn from(msg: String) -> Self {
    RailError::message(msg)
  }
}

impl From<&str> for RailError {
  fn from(msg: &str) -> Self {
    RailError::message(msg)
  }
}

impl From<toml_edit::de::Error> for RailError {
  fn from(err: toml_edit::de::Error) -> Self {
    RailError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for RailError {
  fn from(err: serde_json::Error) -> Self {
    RailError::message(format!("JSON error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for RailError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    RailError::message(format!("UTF-8 conversion error: {}", err))
  }
}

impl From<ConfigError> for RailError {
  fn from(err: ConfigError) -> Self {
    RailError::Config(err)
  }
}

impl From<ValidationError> for RailError {
  fn from(err: ValidationError) -> Self {
    RailError::Validation(err)
  }
}

impl From<CycleError> for RailError {
  fn from(err: CycleError) -> Self {
    RailError::Cycle(err)
  }
}

impl From<InvalidMemberError> for RailError {
  fn from(err: InvalidMemberError) -> Self {
    RailError::InvalidMember(err)
  }
}

impl From<RegistryError> for RailError {
  fn from(err: RegistryError) -> Self {
    RailError::Registry(err)
  }
}

impl From<TimeoutError> for RailError {
  fn from(err: TimeoutError) -> Self {
    RailError::Timeout(err)
  }
}

impl From<CommandError> for RailError {
  fn from(err: CommandError) -> Self {
    RailError::Command(err)
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// Missing required field
  MissingField { field: String },

  /// Field present but unusable
  InvalidValue { field: String, reason: String },

  /// Settings file could not be parsed
  ParseFailed { path: PathBuf, reason: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::MissingField { field } if field == "crates-token" => Some(
        "Pass --crates-token, set INPUT_CRATES-TOKEN, or use --dry-run. Tokens are issued at https://crates.io/me"
          .to_string(),
      ),
      ConfigError::ParseFailed { path, .. } => Some(format!("Check the TOML syntax of {}", path.display())),
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::MissingField { field } => write!(f, "Missing required input: {}", field),
      ConfigError::InvalidValue { field, reason } => write!(f, "Invalid value for {}: {}", field, reason),
      ConfigError::ParseFailed { path, reason } => {
        write!(f, "Failed to parse settings from {}: {}", path.display(), reason)
      }
    }
  }
}

/// Malformed workspace metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
  /// Metadata document itself is unusable (missing packages, root, bad JSON)
  Metadata { reason: String },

  /// Package name missing or blank
  PackageName { value: String },

  /// Package version missing, blank or not semver
  PackageVersion { package: String, value: String },

  /// Dependency list missing or not a sequence
  Dependencies { package: String },

  /// Dependency name missing or blank
  DependencyName { package: String, value: String },

  /// Publishable package with a `*` requirement on a non-dev dependency
  WildcardRequirement {
    package: String,
    dependency: String,
    requirement: String,
  },

  /// Registry reported a max version that is not semver
  PublishedVersion { package: String, value: String },
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ValidationError::Metadata { reason } => write!(f, "Failed to parse cargo metadata: {}", reason),
      ValidationError::PackageName { value } => write!(f, "Invalid package name: \"{}\"", value),
      ValidationError::PackageVersion { package, value } => {
        write!(f, "Invalid package version for {}: \"{}\"", package, value)
      }
      ValidationError::Dependencies { package } => write!(f, "Invalid package dependencies for {}", package),
      ValidationError::DependencyName { package, value } => {
        write!(f, "Invalid dependency name in {}: \"{}\"", package, value)
      }
      ValidationError::WildcardRequirement {
        package,
        dependency,
        requirement,
      } => write!(
        f,
        "Invalid dependency version for {} in {}: \"{}\"",
        dependency, package, requirement
      ),
      ValidationError::PublishedVersion { package, value } => {
        write!(f, "Invalid published version for crate \"{}\": \"{}\"", package, value)
      }
    }
  }
}

/// Illegal dependency cycles
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
  /// Peeling ran out of rounds with these packages still unplaced
  Unresolved {
    packages: Vec<String>,
    cycles: Vec<Vec<String>>,
  },

  /// An earlier package depends on a later one
  BackEdge { package: String, dependency: String },
}

impl fmt::Display for CycleError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      CycleError::Unresolved { packages, cycles } => {
        write!(
          f,
          "Failed to build workspace dependency graph due to cyclic dependencies: could not resolve [{}]",
          packages.join(", ")
        )?;
        for cycle in cycles {
          write!(f, "\n  cycle: {}", cycle.join(" → "))?;
        }
        Ok(())
      }
      CycleError::BackEdge { package, dependency } => {
        write!(f, "Cyclic dependency between \"{}\" and \"{}\"", package, dependency)
      }
    }
  }
}

/// Publishable crate depending on a member that cannot be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidMemberError {
  /// Dependency has `publish = false` (or excludes the target registry)
  Unpublished { package: String, dependency: String },

  /// Dependency has the placeholder version 0.0.0
  PlaceholderVersion { package: String, dependency: String },
}

impl InvalidMemberError {
  fn help_message(&self) -> Option<String> {
    match self {
      InvalidMemberError::Unpublished { dependency, .. } => Some(format!(
        "Allow publishing \"{}\" or make the dependency a dev-dependency.",
        dependency
      )),
      InvalidMemberError::PlaceholderVersion { dependency, .. } => {
        Some(format!("Give \"{}\" a real version before publishing its dependents.", dependency))
      }
    }
  }
}

impl fmt::Display for InvalidMemberError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      InvalidMemberError::Unpublished { package, dependency } => write!(
        f,
        "\"{}\" depends on workspace member \"{}\" which is not published",
        package, dependency
      ),
      InvalidMemberError::PlaceholderVersion { package, dependency } => write!(
        f,
        "\"{}\" depends on workspace member \"{}\" which has version \"0.0.0\"",
        package, dependency
      ),
    }
  }
}

/// Registry API errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
  /// Non-2xx, non-404 status
  Status { package: String, status: u16, reason: String },

  /// Body was not the expected crate document
  InvalidResponse { package: String, detail: String },

  /// Transport failure (DNS, TLS, connection reset)
  Request { package: String, message: String },
}

impl fmt::Display for RegistryError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RegistryError::Status { package, status, reason } => write!(
        f,
        "Failed to get published version for crate \"{}\": {} {}",
        package, status, reason
      ),
      RegistryError::InvalidResponse { package, detail } => write!(
        f,
        "Failed to get published version for crate \"{}\", invalid response: {}",
        package, detail
      ),
      RegistryError::Request { package, message } => {
        write!(f, "Failed to query registry for crate \"{}\": {}", package, message)
      }
    }
  }
}

/// Registry never listed the expected version in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutError {
  pub package: String,
  pub version: String,
  pub timeout: Duration,
}

impl fmt::Display for TimeoutError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Failed to get published version for crate \"{}\" version \"{}\" within {}ms",
      self.package,
      self.version,
      self.timeout.as_millis()
    )
  }
}

/// External command failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
  /// What we were trying to do ("Failed to publish crate \"a\"")
  pub action: String,
  /// Rendered command line
  pub command: String,
  /// stderr, else stdout, else exit status
  pub output: String,
}

impl fmt::Display for CommandError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.action, self.output)
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Push failed
  PushFailed { remote: String, refspec: String, reason: String },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } => {
        if reason.contains("permission denied") || reason.contains("403") {
          Some("Check that the workflow token has `contents: write` permission.".to_string())
        } else {
          None
        }
      }
      GitError::RepoNotFound { path } => Some(format!(
        "Run inside a git checkout or point --directory at one: {}",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::PushFailed { remote, refspec, reason } => {
        write!(f, "Push of {} to {} failed: {}", refspec, remote, reason)
      }
    }
  }
}

/// Result type alias for release-crates
pub type RailResult<T> = Result<T, RailError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> RailResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<RailError>,
{
  fn context(self, ctx: impl Into<String>) -> RailResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &RailError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}

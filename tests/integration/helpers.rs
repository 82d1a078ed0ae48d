//! Test helpers for integration tests
//!
//! Every test gets a throwaway git repository, a scripted `cargo` executable
//! (selected through `$CARGO`) and an in-process registry API server, so the
//! real binary runs end to end without touching the network.

use anyhow::{Context, Result};
use serde_json::json;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::thread;
use tempfile::TempDir;

/// Variables that must not leak into tests from the surrounding environment
const SCRUBBED_VARS: &[&str] = &[
  "GITHUB_ACTIONS",
  "RUST_LOG",
  "HTTP_PROXY",
  "HTTPS_PROXY",
  "ALL_PROXY",
  "http_proxy",
  "https_proxy",
  "all_proxy",
  "INPUT_DIRECTORY",
  "INPUT_CRATES-TOKEN",
  "INPUT_GITHUB-TOKEN",
  "INPUT_DRY-RUN",
  "INPUT_ALLOW-DIRTY",
  "INPUT_ONLY-NEWEST",
  "INPUT_TAG-CRATE",
  "INPUT_ARGUMENTS",
];

struct CrateSpec {
  name: String,
  version: String,
  publish: bool,
  deps: Vec<(String, String)>,
}

/// A workspace driven by a scripted cargo
pub struct TestWorkspace {
  root: TempDir,
  /// Workspace (and git repository) root
  pub path: PathBuf,
  crates: Vec<CrateSpec>,
  /// Versions the registry already lists, by crate
  existing: HashMap<String, Vec<String>>,
}

impl TestWorkspace {
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("ws");
    std::fs::create_dir_all(&path)?;
    std::fs::create_dir_all(root.path().join("bin"))?;
    std::fs::create_dir_all(root.path().join("published"))?;

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    std::fs::write(
      path.join("Cargo.toml"),
      "[workspace]\nmembers = [\"crates/*\"]\nresolver = \"2\"\n",
    )?;

    let ws = Self {
      root,
      path,
      crates: Vec::new(),
      existing: HashMap::new(),
    };
    ws.write_fake_cargo()?;
    Ok(ws)
  }

  /// Add a member; `deps` are `(name, kind)` with kind `normal`, `dev` or `build`
  pub fn add_crate(&mut self, name: &str, version: &str, publish: bool, deps: &[(&str, &str)]) -> Result<()> {
    let crate_path = self.path.join("crates").join(name);
    std::fs::create_dir_all(crate_path.join("src"))?;

    let mut manifest = format!(
      "[package]\nname = \"{}\"\nversion = \"{}\"\nedition = \"2021\"\n",
      name, version
    );
    if !publish {
      manifest.push_str("publish = false\n");
    }
    std::fs::write(crate_path.join("Cargo.toml"), manifest)?;
    std::fs::write(crate_path.join("src/lib.rs"), format!("//! {} crate\n", name))?;

    self.crates.push(CrateSpec {
      name: name.to_string(),
      version: version.to_string(),
      publish,
      deps: deps.iter().map(|(n, k)| (n.to_string(), k.to_string())).collect(),
    });
    Ok(())
  }

  /// Make the registry list `versions` (ascending) for `name`
  pub fn existing_versions(&mut self, name: &str, versions: &[&str]) {
    self
      .existing
      .insert(name.to_string(), versions.iter().map(|v| v.to_string()).collect());
  }

  /// Make `cargo publish` fail for `name`
  pub fn fail_publish(&self, name: &str) -> Result<()> {
    let path = self.bin_dir().join("fail");
    let mut existing = std::fs::read_to_string(&path).unwrap_or_default();
    existing.push_str(name);
    existing.push('\n');
    std::fs::write(path, existing)?;
    Ok(())
  }

  /// Add a bare `origin` remote and return its path
  pub fn add_origin(&self) -> Result<PathBuf> {
    let remote = self.root.path().join("origin.git");
    git(self.root.path(), &["init", "--bare", "origin.git"])?;
    git(&self.path, &["remote", "add", "origin", remote.to_str().context("non-UTF-8 temp path")?])?;
    Ok(remote)
  }

  /// Commit everything
  pub fn commit(&self, message: &str) -> Result<()> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;
    Ok(())
  }

  /// Write `cargo metadata` output for the members added so far
  pub fn write_metadata(&self) -> Result<()> {
    let packages: Vec<_> = self
      .crates
      .iter()
      .map(|spec| {
        let manifest = self.path.join("crates").join(&spec.name).join("Cargo.toml");
        let dependencies: Vec<_> = spec
          .deps
          .iter()
          .map(|(dep, kind)| {
            let member = self.crates.iter().find(|c| &c.name == dep);
            json!({
              "name": dep,
              "kind": if kind == "normal" { None } else { Some(kind) },
              "req": member.map(|m| format!("^{}", m.version)).unwrap_or_else(|| "^1".to_string()),
              "path": member.map(|m| self.path.join("crates").join(&m.name)),
            })
          })
          .collect();
        json!({
          "name": spec.name,
          "version": spec.version,
          "manifest_path": manifest,
          "publish": if spec.publish { None } else { Some(Vec::<String>::new()) },
          "dependencies": dependencies,
          "targets": [],
        })
      })
      .collect();

    let metadata = json!({
      "packages": packages,
      "workspace_root": self.path,
      "version": 1,
    });
    std::fs::write(self.bin_dir().join("metadata.json"), serde_json::to_string_pretty(&metadata)?)?;
    Ok(())
  }

  /// Start the registry and point `release-crates.toml` at it
  pub fn start_registry(&self) -> Result<()> {
    let local: HashMap<String, String> = self
      .crates
      .iter()
      .map(|c| (c.name.clone(), c.version.clone()))
      .collect();
    let url = FakeRegistry {
      published_dir: self.root.path().join("published"),
      existing: self.existing.clone(),
      local,
    }
    .start()?;

    std::fs::write(
      self.path.join("release-crates.toml"),
      format!(
        "api_url = \"{}\"\npoll_interval_ms = 10\npush_timeout_ms = 2000\nrehearsal_timeout_ms = 200\n",
        url
      ),
    )?;
    Ok(())
  }

  /// Metadata, registry and commit in one go
  pub fn prepare(&self) -> Result<()> {
    self.write_metadata()?;
    self.start_registry()?;
    self.commit("Initial workspace")
  }

  /// Run the binary in the workspace; does not fail on a non-zero exit
  pub fn run(&self, args: &[&str], env: &[(&str, &str)]) -> Result<Output> {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_release-crates"));
    cmd
      .current_dir(&self.path)
      .args(args)
      .env("CARGO", self.bin_dir().join("cargo"))
      .env("GITHUB_OUTPUT", self.output_path());
    for var in SCRUBBED_VARS {
      cmd.env_remove(var);
    }
    for (key, value) in env {
      cmd.env(key, value);
    }
    cmd.output().context("Failed to run release-crates")
  }

  /// Step outputs written so far
  pub fn outputs(&self) -> Result<String> {
    Ok(std::fs::read_to_string(self.output_path()).unwrap_or_default())
  }

  /// Package names passed to `cargo publish`, with whether `--dry-run` was set
  pub fn publish_calls(&self) -> Result<Vec<(String, bool)>> {
    let log = std::fs::read_to_string(self.bin_dir().join("publish.log")).unwrap_or_default();
    Ok(
      log
        .lines()
        .map(|line| {
          let args: Vec<&str> = line.split_whitespace().collect();
          (args[2].to_string(), args.contains(&"--dry-run"))
        })
        .collect(),
    )
  }

  fn bin_dir(&self) -> PathBuf {
    self.root.path().join("bin")
  }

  fn output_path(&self) -> PathBuf {
    self.root.path().join("github_output")
  }

  fn write_fake_cargo(&self) -> Result<()> {
    let bin = self.bin_dir();
    let published = self.root.path().join("published");
    let script = format!(
      r#"#!/bin/sh
case "$1" in
  --version)
    echo "cargo 1.91.0 (scripted)"
    ;;
  metadata)
    cat "{bin}/metadata.json"
    ;;
  package)
    printf 'Cargo.toml\nsrc/lib.rs\n'
    ;;
  publish)
    echo "$*" >> "{bin}/publish.log"
    if grep -qx "$3" "{bin}/fail" 2>/dev/null; then
      echo "error: failed to verify package tarball for $3" >&2
      exit 101
    fi
    case " $* " in
      *" --dry-run "*) ;;
      *) touch "{published}/$3" ;;
    esac
    ;;
  *)
    echo "unexpected cargo invocation: $*" >&2
    exit 2
    ;;
esac
"#,
      bin = bin.display(),
      published = published.display()
    );

    let path = bin.join("cargo");
    std::fs::write(&path, script)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
  }
}

/// Minimal crates.io API: `GET /api/v1/crates/{name}`
///
/// A crate is listed with its `existing` versions plus its local version once
/// the scripted cargo has really published it.
struct FakeRegistry {
  published_dir: PathBuf,
  existing: HashMap<String, Vec<String>>,
  local: HashMap<String, String>,
}

impl FakeRegistry {
  /// Serve on an ephemeral port; returns the API base URL
  fn start(self) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}/api/v1", listener.local_addr()?);

    thread::spawn(move || {
      for stream in listener.incoming().flatten() {
        let _ = self.respond(stream);
      }
    });

    Ok(url)
  }

  fn respond(&self, mut stream: TcpStream) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    loop {
      let mut header = String::new();
      if reader.read_line(&mut header)? == 0 || header == "\r\n" {
        break;
      }
    }

    let path = request_line.split_whitespace().nth(1).unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    let mut versions = self.existing.get(name).cloned().unwrap_or_default();
    if self.published_dir.join(name).exists()
      && let Some(version) = self.local.get(name)
    {
      versions.push(version.clone());
    }

    let (status, body) = match versions.last() {
      None => ("404 Not Found", json!({"errors": [{"detail": "Not Found"}]})),
      Some(max) => (
        "200 OK",
        json!({
          "crate": {"id": name, "name": name, "max_version": max, "newest_version": max},
          "versions": versions.iter().map(|v| json!({"num": v})).collect::<Vec<_>>(),
        }),
      ),
    };
    let body = body.to_string();
    write!(
      stream,
      "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
      status,
      body.len(),
      body
    )?;
    stream.flush()?;
    Ok(())
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).to_string()
}

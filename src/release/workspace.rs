//! Normalized workspace model and the loader that builds it from raw metadata

use crate::cargo::metadata::{RawDependency, RawMetadata, RawPackage};
use crate::core::error::{RailResult, ValidationError};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Dependency kind as reported by cargo (`null` means normal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
  Normal,
  Dev,
  Build,
}

impl DependencyKind {
  /// Unknown kinds gate ordering like normal dependencies
  pub fn from_raw(kind: Option<&str>) -> Self {
    match kind {
      Some("dev") => DependencyKind::Dev,
      Some("build") => DependencyKind::Build,
      _ => DependencyKind::Normal,
    }
  }
}

/// A declared dependency of a workspace member
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
  pub name: String,
  pub kind: DependencyKind,
  /// Version requirement string (`*` for path-only dependencies)
  pub requirement: String,
  /// Path relative to the owning manifest directory, for path dependencies
  pub path: Option<PathBuf>,
}

impl Dependency {
  /// Dev dependencies never gate ordering or publish-ability
  pub fn is_dev(&self) -> bool {
    self.kind == DependencyKind::Dev
  }
}

/// A workspace member
#[derive(Debug, Clone, Serialize)]
pub struct Package {
  /// Manifest path
  pub path: PathBuf,
  pub name: String,
  pub version_string: String,
  #[serde(skip)]
  pub version: semver::Version,
  pub publish: bool,
  pub files: BTreeSet<String>,
  /// Dependencies by name, one record per name (non-dev wins over dev)
  pub dependencies: HashMap<String, Dependency>,
}

impl Package {
  /// Versions of exactly 0.0.0 mark crates that are never meant to be published
  pub fn is_placeholder(&self) -> bool {
    is_placeholder(&self.version)
  }
}

pub(crate) fn is_placeholder(version: &semver::Version) -> bool {
  version.major == 0 && version.minor == 0 && version.patch == 0
}

/// The set of members of a Cargo workspace
///
/// Built once per run and read-only afterwards. Member order is the metadata
/// order, which keeps publish ordering deterministic.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
  pub root: PathBuf,
  members: Vec<Package>,
  index: HashMap<String, usize>,
}

impl Workspace {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      members: Vec::new(),
      index: HashMap::new(),
    }
  }

  /// Add a member; a later member with the same name replaces the earlier one in place
  pub fn insert(&mut self, package: Package) {
    match self.index.get(&package.name) {
      Some(&idx) => self.members[idx] = package,
      None => {
        self.index.insert(package.name.clone(), self.members.len());
        self.members.push(package);
      }
    }
  }

  pub fn get(&self, name: &str) -> Option<&Package> {
    self.index.get(name).map(|&idx| &self.members[idx])
  }

  pub fn contains(&self, name: &str) -> bool {
    self.index.contains_key(name)
  }

  /// Members in metadata order
  pub fn packages(&self) -> impl Iterator<Item = &Package> {
    self.members.iter()
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.members.iter().map(|p| p.name.as_str())
  }

  pub fn len(&self) -> usize {
    self.members.len()
  }

  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
  }
}

/// Builds a [`Workspace`] from raw metadata
///
/// `registry` is the registry name matched against each package's `publish`
/// list; file manifests come from `list_files`, one relative path per line.
pub struct WorkspaceLoader<'a> {
  registry: &'a str,
  list_files: Box<dyn FnMut(&Path) -> RailResult<String> + 'a>,
}

impl<'a> WorkspaceLoader<'a> {
  pub fn new(registry: &'a str, list_files: impl FnMut(&Path) -> RailResult<String> + 'a) -> Self {
    Self {
      registry,
      list_files: Box::new(list_files),
    }
  }

  /// Validate and normalize every package of `metadata`
  pub fn load(&mut self, metadata: RawMetadata) -> RailResult<Workspace> {
    let packages = metadata.packages.ok_or_else(|| ValidationError::Metadata {
      reason: "no packages".to_string(),
    })?;
    let root = metadata.workspace_root.ok_or_else(|| ValidationError::Metadata {
      reason: "no workspace root".to_string(),
    })?;

    let mut workspace = Workspace::new(root);
    for raw in packages {
      let package = self.load_package(raw)?;
      tracing::debug!(
        package = %package.name,
        version = %package.version_string,
        publish = package.publish,
        dependencies = package.dependencies.len(),
        files = package.files.len(),
        "loaded package"
      );
      workspace.insert(package);
    }

    Ok(workspace)
  }

  fn load_package(&mut self, raw: RawPackage) -> RailResult<Package> {
    let name = match raw.name {
      Some(name) if !name.trim().is_empty() => name,
      other => {
        return Err(ValidationError::PackageName {
          value: other.unwrap_or_default(),
        }
        .into());
      }
    };
    let version_string = match raw.version {
      Some(version) if !version.trim().is_empty() => version,
      other => {
        return Err(
          ValidationError::PackageVersion {
            package: name,
            value: other.unwrap_or_default(),
          }
          .into(),
        );
      }
    };
    let Some(serde_json::Value::Array(entries)) = raw.dependencies else {
      return Err(ValidationError::Dependencies { package: name }.into());
    };

    let publish = raw
      .publish
      .as_ref()
      .is_none_or(|targets| targets.iter().any(|t| t == self.registry));
    let manifest_dir = raw.manifest_path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut dependencies: HashMap<String, Dependency> = HashMap::new();
    for entry in entries {
      let raw_dep: RawDependency =
        serde_json::from_value(entry).map_err(|_| ValidationError::Dependencies { package: name.clone() })?;
      let dependency = normalize_dependency(&name, publish, &manifest_dir, raw_dep)?;

      let replace = dependencies.get(&dependency.name).is_none_or(Dependency::is_dev);
      if replace {
        dependencies.insert(dependency.name.clone(), dependency);
      }
    }

    let files = (self.list_files)(&raw.manifest_path)?
      .lines()
      .filter(|line| !line.trim().is_empty())
      .map(String::from)
      .collect();

    let version = semver::Version::parse(&version_string).map_err(|_| ValidationError::PackageVersion {
      package: name.clone(),
      value: version_string.clone(),
    })?;

    Ok(Package {
      path: raw.manifest_path,
      name,
      version_string,
      version,
      publish,
      files,
      dependencies,
    })
  }
}

fn normalize_dependency(
  package: &str,
  publish: bool,
  manifest_dir: &Path,
  raw: RawDependency,
) -> RailResult<Dependency> {
  let name = match raw.name {
    Some(name) if !name.trim().is_empty() => name,
    other => {
      return Err(
        ValidationError::DependencyName {
          package: package.to_string(),
          value: other.unwrap_or_default(),
        }
        .into(),
      );
    }
  };
  let kind = DependencyKind::from_raw(raw.kind.as_deref());

  if publish && kind != DependencyKind::Dev && raw.req.trim() == "*" {
    return Err(
      ValidationError::WildcardRequirement {
        package: package.to_string(),
        dependency: name,
        requirement: raw.req,
      }
      .into(),
    );
  }

  let path = raw.path.map(|p| pathdiff::diff_paths(&p, manifest_dir).unwrap_or(p));

  Ok(Dependency {
    name,
    kind,
    requirement: raw.req,
    path,
  })
}

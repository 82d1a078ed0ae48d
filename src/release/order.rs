//! Publish ordering
//!
//! Packages are ordered by iterative layer peeling: each round walks the
//! not-yet-placed packages in workspace order and places every package whose
//! dependencies are all dev dependencies, already placed, or outside the
//! workspace. Ties keep workspace order, so the result is stable and easy to
//! predict from `cargo metadata` output.
//!
//! The resulting order is then validated:
//! - no earlier package may depend (non-dev) on a later one
//! - publishable packages may only depend (non-dev) on members that are
//!   publishable and not versioned `0.0.0`

use crate::core::error::{CycleError, InvalidMemberError, RailResult};
use crate::release::workspace::Workspace;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

/// Compute the publish order of every workspace member
pub fn sort(workspace: &Workspace) -> RailResult<Vec<String>> {
  let order = peel(workspace)?;
  check_back_edges(workspace, &order)?;
  check_members(workspace)?;
  Ok(order)
}

fn peel(workspace: &Workspace) -> RailResult<Vec<String>> {
  let mut remaining: Vec<&str> = workspace.names().collect();
  let mut placed: Vec<String> = Vec::with_capacity(remaining.len());
  let mut placed_set: HashSet<&str> = HashSet::new();

  let rounds = workspace.len();
  for round in 0..rounds {
    if remaining.is_empty() {
      break;
    }

    let before = placed.len();
    let mut next = Vec::with_capacity(remaining.len());
    for name in remaining {
      let Some(package) = workspace.get(name) else {
        continue;
      };
      let ready = package
        .dependencies
        .iter()
        .all(|(dep_name, dep)| dep.is_dev() || placed_set.contains(dep_name.as_str()) || !workspace.contains(dep_name));
      if ready {
        placed_set.insert(name);
        placed.push(name.to_string());
      } else {
        next.push(name);
      }
    }
    remaining = next;

    tracing::trace!(round, placed = placed.len() - before, remaining = remaining.len(), "peeled");
    if placed.len() == before {
      break;
    }
  }

  if !remaining.is_empty() {
    let cycles = find_cycles(workspace, &remaining);
    return Err(
      CycleError::Unresolved {
        packages: remaining.into_iter().map(String::from).collect(),
        cycles,
      }
      .into(),
    );
  }

  Ok(placed)
}

/// Strongly connected components among `unresolved` that actually form a cycle
fn find_cycles(workspace: &Workspace, unresolved: &[&str]) -> Vec<Vec<String>> {
  let mut graph: DiGraph<&str, ()> = DiGraph::new();
  let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
  for &name in unresolved {
    nodes.insert(name, graph.add_node(name));
  }

  for &name in unresolved {
    let Some(package) = workspace.get(name) else {
      continue;
    };
    for (dep_name, dep) in &package.dependencies {
      if dep.is_dev() {
        continue;
      }
      if let Some(&target) = nodes.get(dep_name.as_str()) {
        graph.add_edge(nodes[name], target, ());
      }
    }
  }

  let position: HashMap<&str, usize> = unresolved.iter().enumerate().map(|(i, n)| (*n, i)).collect();
  let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
    .into_iter()
    .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
    .map(|scc| {
      let mut names: Vec<&str> = scc.into_iter().map(|idx| graph[idx]).collect();
      names.sort_by_key(|n| position[n]);
      names.into_iter().map(String::from).collect()
    })
    .collect();
  cycles.sort_by_key(|cycle| position[cycle[0].as_str()]);
  cycles
}

fn check_back_edges(workspace: &Workspace, order: &[String]) -> RailResult<()> {
  for (i, name) in order.iter().enumerate() {
    let Some(package) = workspace.get(name) else {
      continue;
    };
    for later in &order[i + 1..] {
      if let Some(dep) = package.dependencies.get(later)
        && !dep.is_dev()
      {
        return Err(
          CycleError::BackEdge {
            package: package.name.clone(),
            dependency: dep.name.clone(),
          }
          .into(),
        );
      }
    }
  }
  Ok(())
}

fn check_members(workspace: &Workspace) -> RailResult<()> {
  for package in workspace.packages().filter(|p| p.publish) {
    for dep in package.dependencies.values().filter(|d| !d.is_dev()) {
      let Some(member) = workspace.get(&dep.name) else {
        continue;
      };
      if !member.publish {
        return Err(
          InvalidMemberError::Unpublished {
            package: package.name.clone(),
            dependency: dep.name.clone(),
          }
          .into(),
        );
      }
      if member.is_placeholder() {
        return Err(
          InvalidMemberError::PlaceholderVersion {
            package: package.name.clone(),
            dependency: dep.name.clone(),
          }
          .into(),
        );
      }
    }
  }
  Ok(())
}

//! Dependency graph over the component list.
//!
//! Only consulted when dependency enforcement is enabled. Without it the
//! manifest order is the build order and `depends` is metadata only.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::component::ComponentSpec;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DagError {
  /// Dependencies form a cycle through the named component.
  #[error("dependency cycle involving component '{0}'")]
  Cycle(String),
}

/// Components as nodes, with an edge from each dependency to its dependent.
///
/// Dependencies naming components outside the list are external and ignored.
pub struct ComponentGraph {
  graph: DiGraph<String, ()>,
  nodes: HashMap<String, NodeIndex>,
}

impl ComponentGraph {
  pub fn new(components: &[ComponentSpec]) -> Result<Self, DagError> {
    let mut graph = DiGraph::new();
    let mut nodes = HashMap::new();

    for component in components {
      let idx = graph.add_node(component.name.clone());
      nodes.insert(component.name.clone(), idx);
    }

    for component in components {
      let dependent = nodes[&component.name];
      for dep in &component.depends {
        if let Some(&dep_idx) = nodes.get(dep) {
          graph.add_edge(dep_idx, dependent, ());
        }
      }
    }

    toposort(&graph, None).map_err(|cycle| DagError::Cycle(graph[cycle.node_id()].clone()))?;

    Ok(Self { graph, nodes })
  }

  /// Indices into the original list, dependencies first.
  ///
  /// Among components whose dependencies are satisfied, the one listed
  /// earliest goes next, so an already valid list keeps its order.
  pub fn build_order(&self) -> Vec<usize> {
    let mut in_degree: Vec<usize> = self
      .graph
      .node_indices()
      .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
      .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
      .iter()
      .enumerate()
      .filter(|&(_, &deg)| deg == 0)
      .map(|(i, _)| Reverse(i))
      .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(Reverse(i)) = ready.pop() {
      order.push(i);
      for next in self.graph.neighbors_directed(NodeIndex::new(i), Direction::Outgoing) {
        let deg = &mut in_degree[next.index()];
        *deg = deg.saturating_sub(1);
        if *deg == 0 {
          ready.push(Reverse(next.index()));
        }
      }
    }
    order
  }

  /// Declared dependencies of `name` that are themselves in the list.
  pub fn dependencies(&self, name: &str) -> Vec<String> {
    let Some(&idx) = self.nodes.get(name) else {
      return Vec::new();
    };
    let mut deps: Vec<String> = self
      .graph
      .neighbors_directed(idx, Direction::Incoming)
      .map(|dep| self.graph[dep].clone())
      .collect();
    deps.sort();
    deps.dedup();
    deps
  }
}

//! Before/after ordering between addon packages.
//!
//! An edge `A → B` means A runs before B. Packages are nodes in discovery
//! order; the walk in [`AddonGraph::order`] emits each package after all
//! of its predecessors, visiting unconstrained packages in discovery order.

use std::collections::HashSet;

use indexmap::IndexMap;
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::warn;

#[derive(Debug, Default)]
pub struct AddonGraph {
    graph: DiGraph<String, ()>,
    nodes: IndexMap<String, NodeIndex>,
    /// Packages that were added explicitly. Names that only appear in
    /// someone's `before`/`after` list are not emitted.
    registered: HashSet<NodeIndex>,
}

impl AddonGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Register a package with its declared constraints.
    pub fn add_package(&mut self, name: &str, before: &[String], after: &[String]) {
        let idx = self.node(name);
        self.registered.insert(idx);
        for other in before {
            self.add_constraint(name, other);
        }
        for other in after {
            self.add_constraint(other, name);
        }
    }

    /// Require `first` to run before `second`. A constraint that would close
    /// a cycle is dropped.
    pub fn add_constraint(&mut self, first: &str, second: &str) {
        if first == second {
            return;
        }
        let a = self.node(first);
        let b = self.node(second);
        if self.graph.contains_edge(a, b) {
            return;
        }
        if has_path_connecting(&self.graph, b, a, None) {
            warn!(
                before = first,
                after = second,
                "Ignoring addon ordering constraint that would form a cycle"
            );
            return;
        }
        self.graph.add_edge(a, b, ());
    }

    /// Registered package names in dependency order.
    pub fn order(&self) -> Vec<String> {
        let mut emitted = HashSet::new();
        let mut out = Vec::with_capacity(self.registered.len());
        for &idx in self.nodes.values() {
            self.visit(idx, &mut emitted, &mut out);
        }
        out
    }

    fn visit(&self, idx: NodeIndex, emitted: &mut HashSet<NodeIndex>, out: &mut Vec<String>) {
        if !emitted.insert(idx) {
            return;
        }
        let mut predecessors: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        predecessors.sort();
        for pred in predecessors {
            self.visit(pred, emitted, out);
        }
        if self.registered.contains(&idx) {
            out.push(self.graph[idx].clone());
        }
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }
}

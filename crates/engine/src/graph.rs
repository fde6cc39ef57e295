//! Dependency DAG over a batch of related actions.
//!
//! The persisted dependency relation is an ID list on each action record;
//! this graph is the in-memory arena the service builds when a batch of
//! related actions is submitted together, to reject cycles up front and to
//! compute each action's initial readiness.

use std::collections::HashMap;

use corral_action::Action;
use corral_core::ActionId;
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::EngineError;

/// A directed acyclic graph of action dependencies: an edge `A → B` means
/// `B` depends on `A`.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<ActionId, ()>,
    index_map: HashMap<ActionId, NodeIndex>,
}

impl DependencyGraph {
    /// Build a graph from a batch of actions, using the `depends_on` edges
    /// that point inside the batch.
    ///
    /// Returns an error on self-dependencies; dependencies on actions
    /// outside the batch are ignored here (the store resolves them at
    /// promotion time).
    pub fn from_actions(actions: &[Action]) -> Result<Self, EngineError> {
        let mut graph = DiGraph::new();
        let mut index_map = HashMap::new();

        for action in actions {
            let idx = graph.add_node(action.id);
            index_map.insert(action.id, idx);
        }

        for action in actions {
            for &dep in &action.depends_on {
                if dep == action.id {
                    return Err(EngineError::DependencyCycle);
                }
                if let Some(&dep_idx) = index_map.get(&dep) {
                    graph.add_edge(dep_idx, index_map[&action.id], ());
                }
            }
        }

        Ok(Self { graph, index_map })
    }

    /// Returns `true` if the graph contains at least one cycle.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        algo::is_cyclic_directed(&self.graph)
    }

    /// Validate the graph structure: no cycles.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.has_cycle() {
            return Err(EngineError::DependencyCycle);
        }
        Ok(())
    }

    /// Topological sort. Returns an error if a cycle exists.
    pub fn topological_sort(&self) -> Result<Vec<ActionId>, EngineError> {
        let sorted =
            algo::toposort(&self.graph, None).map_err(|_| EngineError::DependencyCycle)?;
        Ok(sorted.into_iter().map(|idx| self.graph[idx]).collect())
    }

    /// Actions with no in-batch dependencies — immediately ready.
    #[must_use]
    pub fn entry_actions(&self) -> Vec<ActionId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .count()
                    == 0
            })
            .map(|idx| self.graph[idx])
            .collect()
    }

    /// The actions that depend on the given one.
    #[must_use]
    pub fn dependents(&self, id: ActionId) -> Vec<ActionId> {
        if let Some(&idx) = self.index_map.get(&id) {
            self.graph
                .neighbors_directed(idx, Direction::Outgoing)
                .map(|i| self.graph[i])
                .collect()
        } else {
            Vec::new()
        }
    }

    /// The actions the given one depends on.
    #[must_use]
    pub fn dependencies(&self, id: ActionId) -> Vec<ActionId> {
        if let Some(&idx) = self.index_map.get(&id) {
            self.graph
                .neighbors_directed(idx, Direction::Incoming)
                .map(|i| self.graph[i])
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Number of actions in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

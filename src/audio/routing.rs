// Audio Routing - Directed acyclic connection graph
//
// Keeps the edges between engine nodes, rejects connections that would
// create a cycle and caches a topological processing order.
//
// Real-time constraints:
// - The order is recomputed only after the topology changed
// - Processing reads the cached order without allocating

use super::backend::NodeHandle;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Directed edge between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Connection {
    pub from: NodeHandle,
    pub to: NodeHandle,
}

/// Node and edge bookkeeping for the render engine
#[derive(Debug, Default)]
pub struct RoutingGraph {
    nodes: BTreeSet<NodeHandle>,
    connections: BTreeSet<Connection>,
    /// Topological order of nodes (recomputed when needed)
    processed_order: Option<Vec<NodeHandle>>,
}

impl RoutingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeHandle) {
        self.nodes.insert(node);
        self.processed_order = None;
    }

    pub fn contains(&self, node: NodeHandle) -> bool {
        self.nodes.contains(&node)
    }

    /// Remove a node and return the connections that still touched it
    pub fn remove_node(&mut self, node: NodeHandle) -> Vec<Connection> {
        let dangling: Vec<Connection> = self
            .connections
            .iter()
            .filter(|c| c.from == node || c.to == node)
            .copied()
            .collect();
        for connection in &dangling {
            self.connections.remove(connection);
        }
        self.nodes.remove(&node);
        self.processed_order = None;
        dangling
    }

    /// Add an edge. Returns `false` when it would create a cycle.
    ///
    /// Adding an existing edge is a no-op.
    pub fn connect(&mut self, from: NodeHandle, to: NodeHandle) -> bool {
        if self.would_create_cycle(from, to) {
            return false;
        }
        if self.connections.insert(Connection { from, to }) {
            self.processed_order = None;
        }
        true
    }

    /// Remove an edge; returns whether it existed
    pub fn disconnect(&mut self, from: NodeHandle, to: NodeHandle) -> bool {
        let removed = self.connections.remove(&Connection { from, to });
        if removed {
            self.processed_order = None;
        }
        removed
    }

    pub fn is_connected(&self, from: NodeHandle, to: NodeHandle) -> bool {
        self.connections.contains(&Connection { from, to })
    }

    /// Nodes feeding into `node`
    pub fn inputs_of(&self, node: NodeHandle) -> impl Iterator<Item = NodeHandle> + '_ {
        self.connections
            .iter()
            .filter(move |c| c.to == node)
            .map(|c| c.from)
    }

    /// Nodes fed by `node`
    pub fn outputs_of(&self, node: NodeHandle) -> impl Iterator<Item = NodeHandle> + '_ {
        self.connections
            .iter()
            .filter(move |c| c.from == node)
            .map(|c| c.to)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Recompute the processing order if the topology changed
    pub fn refresh_order(&mut self) {
        if self.processed_order.is_none() {
            self.processed_order = Some(self.compute_topological_order());
        }
    }

    /// Order computed by the last `refresh_order()`
    pub fn processing_order(&self) -> &[NodeHandle] {
        self.processed_order.as_deref().unwrap_or(&[])
    }

    /// Topological order, recomputed if the topology changed
    pub fn order(&mut self) -> &[NodeHandle] {
        self.refresh_order();
        self.processing_order()
    }

    /// Depth-first search from `to` looking for `from`
    fn would_create_cycle(&self, from: NodeHandle, to: NodeHandle) -> bool {
        let mut visited = HashSet::new();
        self.has_path_dfs(to, from, &mut visited)
    }

    fn has_path_dfs(
        &self,
        current: NodeHandle,
        target: NodeHandle,
        visited: &mut HashSet<NodeHandle>,
    ) -> bool {
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            return false;
        }
        self.outputs_of(current)
            .any(|next| self.has_path_dfs(next, target, visited))
    }

    /// Kahn's algorithm. Edges are acyclic by construction.
    fn compute_topological_order(&self) -> Vec<NodeHandle> {
        let mut in_degree: HashMap<NodeHandle, usize> =
            self.nodes.iter().map(|n| (*n, 0)).collect();
        for connection in &self.connections {
            *in_degree.entry(connection.to).or_insert(0) += 1;
        }

        // BTreeSet iteration keeps the order deterministic
        let mut queue: VecDeque<NodeHandle> = self
            .nodes
            .iter()
            .filter(|n| in_degree.get(*n) == Some(&0))
            .copied()
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for next in self.outputs_of(node) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(next);
                    }
                }
            }
        }
        order
    }
}

//! Static topology
//!
//! Nodes and weighted directed edges supplied at initialization by an
//! external content loader. The field treats this as read-only structure:
//! adjacency for spreading, degrees for hub normalization. Unknown node
//! ids referenced by callers are tolerated silently.

use melvin_core::{NodeId, StartupError};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    /// Edge weight in (0, 1].
    pub weight: f32,
}

#[derive(Debug, Default, Deserialize)]
struct TopologyFile {
    #[serde(default)]
    nodes: Vec<NodeId>,
    #[serde(default)]
    edges: Vec<Edge>,
}

/// Read-only graph structure underneath the activation field.
#[derive(Debug, Default)]
pub struct Topology {
    nodes: HashSet<NodeId>,
    /// source → [(target, weight)]
    adjacency: HashMap<NodeId, Vec<(NodeId, f32)>>,
    /// Undirected degree (in + out), for √degree normalization.
    degrees: HashMap<NodeId, usize>,
}

impl Topology {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from explicit node and edge lists. The node set is the union
    /// of the listed nodes and all edge endpoints.
    pub fn from_edges(nodes: impl IntoIterator<Item = NodeId>, edges: &[Edge]) -> Result<Self, StartupError> {
        let mut topo = Self {
            nodes: nodes.into_iter().collect(),
            ..Default::default()
        };
        for edge in edges {
            if !(edge.weight > 0.0 && edge.weight <= 1.0) {
                return Err(StartupError::TopologyFormat(format!(
                    "edge {} -> {} has weight {} outside (0, 1]",
                    edge.source, edge.target, edge.weight
                )));
            }
            topo.nodes.insert(edge.source);
            topo.nodes.insert(edge.target);
            topo.adjacency
                .entry(edge.source)
                .or_default()
                .push((edge.target, edge.weight));
            *topo.degrees.entry(edge.source).or_insert(0) += 1;
            *topo.degrees.entry(edge.target).or_insert(0) += 1;
        }
        Ok(topo)
    }

    /// Load `{ "nodes": [...], "edges": [{"source", "target", "weight"}] }`
    /// from a JSON file. A missing or malformed file is a startup failure.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| StartupError::TopologyRead {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;
        let file: TopologyFile = serde_json::from_slice(&bytes)
            .map_err(|e| StartupError::TopologyFormat(e.to_string()))?;
        Self::from_edges(file.nodes, &file.edges)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Outgoing neighbors with edge weights; empty for unknown nodes.
    pub fn neighbors(&self, node: NodeId) -> &[(NodeId, f32)] {
        self.adjacency.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Total degree (in + out); 0 for unknown or isolated nodes.
    pub fn degree(&self, node: NodeId) -> usize {
        self.degrees.get(&node).copied().unwrap_or(0)
    }
}

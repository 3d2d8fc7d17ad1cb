//! Sparse activation map
//!
//! Activation lives in a hash map keyed by node id; there is no dense
//! vector over the node space. Every mutation path clamps to [0, A_max]
//! and erases entries that fall below ε, so an entry's presence implies
//! ε ≤ value ≤ A_max. All operations serialize on one RwLock; metrics
//! snapshots never observe torn state.

use crate::metrics;
use crate::topology::Topology;
use melvin_core::events::FieldMetrics;
use melvin_core::NodeId;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct ActivationField {
    topology: Topology,
    activations: RwLock<HashMap<NodeId, f32>>,
    a_max: f32,
    epsilon: f32,
}

impl ActivationField {
    pub fn new(topology: Topology) -> Self {
        Self::with_limits(topology, crate::A_MAX, crate::EPSILON)
    }

    pub fn with_limits(topology: Topology, a_max: f32, epsilon: f32) -> Self {
        Self {
            topology,
            activations: RwLock::new(HashMap::new()),
            a_max,
            epsilon,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn a_max(&self) -> f32 {
        self.a_max
    }

    /// Add Δ to a node's activation, creating the entry if absent, clamped
    /// to [0, A_max]. The source tag is informational only.
    pub fn activate(&self, node: NodeId, delta: f32, source: &str) {
        if !delta.is_finite() {
            tracing::warn!(node, source, "ignoring non-finite activation delta");
            return;
        }
        let mut map = self.write();
        let current = map.get(&node).copied().unwrap_or(0.0);
        let next = (current + delta).clamp(0.0, self.a_max);
        tracing::trace!(node, delta, next, source, "activate");
        if next < self.epsilon {
            map.remove(&node);
        } else {
            map.insert(node, next);
        }
    }

    /// Point lookup; 0 for absent nodes.
    pub fn get_activation(&self, node: NodeId) -> f32 {
        self.read().get(&node).copied().unwrap_or(0.0)
    }

    /// Batch lookup, same order as the input.
    pub fn get_activations(&self, nodes: &[NodeId]) -> Vec<f32> {
        let map = self.read();
        nodes
            .iter()
            .map(|n| map.get(n).copied().unwrap_or(0.0))
            .collect()
    }

    /// All nodes with activation ≥ threshold, strongest first.
    pub fn get_active(&self, threshold: f32) -> Vec<(NodeId, f32)> {
        let map = self.read();
        let mut out: Vec<(NodeId, f32)> = map
            .iter()
            .filter(|(_, a)| **a >= threshold)
            .map(|(n, a)| (*n, *a))
            .collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        out
    }

    pub fn active_count(&self) -> usize {
        self.read().len()
    }

    /// Multiply every activation by (1 − rate); entries falling below ε
    /// are erased. `decay(0.0)` is the identity.
    pub fn decay(&self, rate: f32) {
        let keep = (1.0 - rate).clamp(0.0, 1.0);
        let mut map = self.write();
        map.retain(|_, a| {
            *a *= keep;
            *a >= self.epsilon
        });
    }

    /// Divide each node's activation by √degree (static topology degree),
    /// limiting hub dominance. Degree ≤ 1 nodes are unchanged.
    pub fn normalize_degrees(&self) {
        let mut map = self.write();
        map.retain(|node, a| {
            let degree = self.topology.degree(*node);
            if degree > 1 {
                *a /= (degree as f32).sqrt();
            }
            *a >= self.epsilon
        });
    }

    /// Retain only the k strongest entries; ties broken by node id
    /// ascending so the cut is deterministic. Idempotent once at most k
    /// entries remain. Returns the number of entries discarded.
    pub fn apply_kwta(&self, k: usize) -> usize {
        let mut map = self.write();
        if map.len() <= k {
            return 0;
        }
        let mut entries: Vec<(NodeId, f32)> = map.iter().map(|(n, a)| (*n, *a)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let discarded = entries.len() - k;
        map.clear();
        map.extend(entries.into_iter().take(k));
        tracing::debug!(k, discarded, "k-WTA applied");
        discarded
    }

    /// For each neighbor n with edge weight w, add
    /// `rate · activation(source) · w` to n, clamped to A_max. The source
    /// keeps its own activation.
    pub fn spread(&self, source: NodeId, neighbors: &[(NodeId, f32)], rate: f32) {
        let mut map = self.write();
        let Some(&source_act) = map.get(&source) else {
            return;
        };
        for &(target, weight) in neighbors {
            let delta = rate * source_act * weight;
            if delta < self.epsilon && !map.contains_key(&target) {
                continue;
            }
            let entry = map.entry(target).or_insert(0.0);
            *entry = (*entry + delta).min(self.a_max);
        }
    }

    /// Atomic snapshot of summary metrics over the current map. `conf`
    /// is left 0; the scheduler stitches in the latest answer confidence.
    pub fn get_metrics(&self) -> FieldMetrics {
        let map = self.read();
        metrics::compute(&map, self.topology.node_count())
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<NodeId, f32>> {
        self.activations.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<NodeId, f32>> {
        self.activations.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Edge;

    fn field_with_edges(edges: &[(NodeId, NodeId, f32)]) -> ActivationField {
        let edges: Vec<Edge> = edges
            .iter()
            .map(|&(source, target, weight)| Edge {
                source,
                target,
                weight,
            })
            .collect();
        ActivationField::new(Topology::from_edges([], &edges).unwrap())
    }

    #[test]
    fn test_activate_accumulates_and_clamps() {
        let field = ActivationField::new(Topology::empty());
        field.activate(1, 0.4, "test");
        field.activate(1, 0.4, "test");
        assert!((field.get_activation(1) - 0.8).abs() < 1e-6);
        field.activate(1, 5.0, "test");
        assert!((field.get_activation(1) - 1.0).abs() < 1e-6); // A_max
        assert_eq!(field.get_activation(99), 0.0);
    }

    #[test]
    fn test_sub_epsilon_entries_are_erased() {
        let field = ActivationField::new(Topology::empty());
        field.activate(1, 1e-4, "test");
        assert_eq!(field.active_count(), 0);
        field.activate(2, 0.5, "test");
        field.activate(2, -0.4999, "test");
        assert_eq!(field.active_count(), 0);
    }

    #[test]
    fn test_decay_shrinks_and_prunes() {
        let field = ActivationField::new(Topology::empty());
        field.activate(1, 1.0, "test");
        field.activate(2, 0.002, "test");
        field.decay(0.05);
        assert!((field.get_activation(1) - 0.95).abs() < 1e-6);
        // 0.002 * 0.95 = 0.0019, still ≥ ε
        assert!(field.get_activation(2) > 0.0);
        field.decay(0.5);
        assert_eq!(field.get_activation(2), 0.0); // pruned
    }

    #[test]
    fn test_decay_zero_is_identity() {
        let field = ActivationField::new(Topology::empty());
        field.activate(1, 0.7, "test");
        field.decay(0.0);
        assert!((field.get_activation(1) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_degrees() {
        let field = field_with_edges(&[(1, 2, 0.5), (1, 3, 0.5), (1, 4, 0.5), (1, 5, 0.5)]);
        field.activate(1, 0.8, "test"); // degree 4
        field.activate(2, 0.8, "test"); // degree 1
        field.normalize_degrees();
        assert!((field.get_activation(1) - 0.4).abs() < 1e-6); // 0.8 / √4
        assert!((field.get_activation(2) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_kwta_keeps_top_k_deterministically() {
        let field = ActivationField::new(Topology::empty());
        for n in 0..10 {
            field.activate(n, 0.5, "test"); // all tied
        }
        let discarded = field.apply_kwta(4);
        assert_eq!(discarded, 6);
        // Ties broken by ascending node id: 0..4 survive.
        let survivors: Vec<NodeId> = field.get_active(0.0).iter().map(|(n, _)| *n).collect();
        assert_eq!(survivors, vec![0, 1, 2, 3]);
        // Idempotent below the cap.
        assert_eq!(field.apply_kwta(4), 0);
    }

    #[test]
    fn test_spread_adds_without_draining_source() {
        let field = field_with_edges(&[(7, 8, 0.5), (7, 9, 0.3)]);
        field.activate(7, 1.0, "test");
        let neighbors: Vec<(NodeId, f32)> = field.topology().neighbors(7).to_vec();
        field.spread(7, &neighbors, 0.1);
        assert!((field.get_activation(7) - 1.0).abs() < 1e-6);
        assert!((field.get_activation(8) - 0.05).abs() < 1e-6);
        assert!((field.get_activation(9) - 0.03).abs() < 1e-6);
    }

    #[test]
    fn test_spread_from_inactive_source_is_noop() {
        let field = field_with_edges(&[(7, 8, 0.5)]);
        field.spread(7, &[(8, 0.5)], 0.1);
        assert_eq!(field.active_count(), 0);
    }

    #[test]
    fn test_metrics_on_empty_field() {
        let field = ActivationField::new(Topology::empty());
        let m = field.get_metrics();
        assert_eq!(m.active, 0);
        assert_eq!(m.entropy, 0.0);
        assert_eq!(m.coherence, 0.0);
    }

    #[test]
    fn test_clear() {
        let field = ActivationField::new(Topology::empty());
        field.activate(1, 0.5, "test");
        field.clear();
        assert_eq!(field.active_count(), 0);
    }
}

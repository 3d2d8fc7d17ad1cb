//! Field metrics derivation
//!
//! Computed over one locked snapshot of the activation map so the numbers
//! are mutually consistent. Coherence is the share of total activation
//! mass held by the top 10% of entries (at least one), a single monotone
//! notion of concentration used everywhere in the runtime.

use melvin_core::events::FieldMetrics;
use melvin_core::NodeId;
use std::collections::HashMap;

pub(crate) fn compute(map: &HashMap<NodeId, f32>, total_nodes: usize) -> FieldMetrics {
    let active = map.len();
    if active == 0 {
        return FieldMetrics {
            sparsity: if total_nodes == 0 { 0.0 } else { 1.0 },
            ..Default::default()
        };
    }

    let n = active as f32;
    let sum: f32 = map.values().sum();
    let mean = sum / n;
    let max = map.values().copied().fold(0.0f32, f32::max);
    let var = map.values().map(|a| (a - mean).powi(2)).sum::<f32>() / n;

    // Sparsity against the static node space; the active set itself is
    // the space when no topology was supplied.
    let space = total_nodes.max(active) as f32;
    let sparsity = (1.0 - n / space).clamp(0.0, 1.0);

    // Shannon entropy (base 2) of activations as a probability
    // distribution. Entries are ≥ ε so every p is positive.
    let entropy = if sum > 0.0 {
        map.values()
            .map(|a| {
                let p = a / sum;
                -p * p.log2()
            })
            .sum()
    } else {
        0.0
    };

    let coherence = if sum > 0.0 {
        let mut sorted: Vec<f32> = map.values().copied().collect();
        sorted.sort_by(|a, b| b.total_cmp(a));
        let top = (active as f32 / 10.0).ceil() as usize;
        sorted.iter().take(top.max(1)).sum::<f32>() / sum
    } else {
        0.0
    };

    FieldMetrics {
        active,
        mean,
        max,
        var,
        sparsity,
        entropy,
        coherence,
        conf: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(entries: &[(NodeId, f32)]) -> HashMap<NodeId, f32> {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_uniform_distribution_has_max_entropy() {
        let m = compute(&map_of(&[(1, 0.5), (2, 0.5), (3, 0.5), (4, 0.5)]), 100);
        assert!((m.entropy - 2.0).abs() < 1e-4); // log2(4)
        assert!((m.mean - 0.5).abs() < 1e-6);
        assert!(m.var.abs() < 1e-6);
        assert!((m.sparsity - 0.96).abs() < 1e-6);
    }

    #[test]
    fn test_single_entry_has_zero_entropy_full_coherence() {
        let m = compute(&map_of(&[(1, 0.7)]), 10);
        assert_eq!(m.active, 1);
        assert!(m.entropy.abs() < 1e-6);
        assert!((m.coherence - 1.0).abs() < 1e-6);
        assert!((m.max - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_coherence_is_monotone_in_concentration() {
        // 10 entries, flat.
        let flat: Vec<(NodeId, f32)> = (0..10).map(|n| (n, 0.5)).collect();
        // 10 entries, one dominant.
        let mut peaked = flat.clone();
        peaked[0].1 = 1.0;
        for e in peaked.iter_mut().skip(1) {
            e.1 = 0.05;
        }
        let flat_m = compute(&map_of(&flat), 100);
        let peaked_m = compute(&map_of(&peaked), 100);
        assert!(peaked_m.coherence > flat_m.coherence);
    }

    #[test]
    fn test_sparsity_clamped_without_topology() {
        let m = compute(&map_of(&[(1, 0.5), (2, 0.5)]), 0);
        assert_eq!(m.sparsity, 0.0);
    }
}

//! Arousal controller
//!
//! Three scalar neuromodulator levels in [0, 1], recomputed every tick
//! from the field metrics snapshot and the most recent answer confidence.
//! The update is pure and total: missing inputs fall back to the previous
//! tick's values, and selected drives are written back into the genome
//! bounded by each gene's declared range.

use melvin_core::events::FieldMetrics;
use melvin_core::Genome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ArousalState {
    /// Exploration drive: high field entropy pushes toward exploration.
    pub exploration: f32,
    /// Confidence signal: tracks the latest answer confidence.
    pub confidence: f32,
    /// Focus signal: high when activation is dense (low sparsity).
    pub focus: f32,
}

impl Default for ArousalState {
    fn default() -> Self {
        Self {
            exploration: 0.0,
            confidence: 0.0,
            focus: 0.0,
        }
    }
}

impl ArousalState {
    /// One tick of the update rule. `answer_confidence` is the most
    /// recent `cog/answer` confidence, or `None` to carry the previous
    /// value forward.
    pub fn update(&self, metrics: &FieldMetrics, answer_confidence: Option<f32>) -> Self {
        Self {
            exploration: (metrics.entropy / 5.0).clamp(0.0, 1.0),
            confidence: answer_confidence
                .map(|c| c.clamp(0.0, 1.0))
                .unwrap_or(self.confidence),
            focus: 1.0 - metrics.sparsity.clamp(0.0, 1.0),
        }
    }

    /// Write arousal-driven parameters back into the genome. The genome's
    /// bounded `set` clamps to each gene's declared range.
    pub fn write_back(&self, genome: &Genome) {
        genome.set("temperature", 0.5 + self.exploration);
        genome.set("selection_threshold", 0.1 + 0.3 * self.focus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(entropy: f32, sparsity: f32) -> FieldMetrics {
        FieldMetrics {
            entropy,
            sparsity,
            ..Default::default()
        }
    }

    #[test]
    fn test_update_rule() {
        let prev = ArousalState::default();
        let next = prev.update(&metrics(2.5, 0.8), Some(0.9));
        assert!((next.exploration - 0.5).abs() < 1e-6);
        assert!((next.confidence - 0.9).abs() < 1e-6);
        assert!((next.focus - 0.2).abs() < 1e-5);
    }

    #[test]
    fn test_exploration_saturates() {
        let next = ArousalState::default().update(&metrics(50.0, 0.0), None);
        assert!((next.exploration - 1.0).abs() < 1e-6);
        assert!((next.focus - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_confidence_carries_previous() {
        let prev = ArousalState {
            confidence: 0.42,
            ..Default::default()
        };
        let next = prev.update(&metrics(0.0, 1.0), None);
        assert!((next.confidence - 0.42).abs() < 1e-6);
    }

    #[test]
    fn test_write_back_is_bounded() {
        let genome = Genome::with_defaults();
        let state = ArousalState {
            exploration: 1.0,
            confidence: 0.5,
            focus: 1.0,
        };
        state.write_back(&genome);
        assert!((genome.value("temperature").unwrap() - 1.5).abs() < 1e-6);
        assert!((genome.value("selection_threshold").unwrap() - 0.4).abs() < 1e-6);

        // A gene with a tighter range clamps the write-back.
        genome.define(
            "temperature",
            melvin_core::Gene::new(0.5, 0.1, 1.0, 0.0, 0.0),
        );
        state.write_back(&genome);
        assert!((genome.value("temperature").unwrap() - 1.0).abs() < 1e-6);
    }
}

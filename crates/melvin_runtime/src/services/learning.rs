//! Learning service (every 5 ticks)
//!
//! Runs one bounded random mutation sweep over the genome (critical genes
//! exempt, each gene bounded by its own range) and nudges gene fitness
//! toward the most recent answer confidence at the genome's learning
//! rate. There is no training pipeline; evolution at this level is just a
//! slow random walk kept honest by the fitness signal.

use crate::service::{CognitiveService, ServiceContext};
use async_trait::async_trait;
use melvin_core::events::{topic, Payload};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Mutex;

pub struct LearningService {
    rng: Mutex<StdRng>,
}

impl LearningService {
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    /// Deterministic variant for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for LearningService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CognitiveService for LearningService {
    fn name(&self) -> &'static str {
        crate::budget::LEARNING
    }

    async fn tick(&self, ctx: ServiceContext, _budget_ms: f32) -> anyhow::Result<()> {
        let mutated = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            ctx.genome.mutate(&mut *rng)
        };
        if mutated > 0 {
            tracing::debug!(mutated, generation = ctx.genome.generation(), "genome mutation sweep");
        }

        let confidence = match ctx.bus.get_latest(topic::COG_ANSWER).map(|e| e.payload) {
            Some(Payload::CognitiveAnswer(a)) => a.confidence,
            _ => return Ok(()),
        };
        let lr = ctx.genome.value_or("learning_rate", 0.01);
        for (name, gene) in ctx.genome.snapshot() {
            ctx.genome
                .set_fitness(&name, gene.fitness + lr * (confidence - gene.fitness));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arousal::ArousalState;
    use arc_swap::ArcSwap;
    use melvin_bus::EventBus;
    use melvin_core::events::CognitiveAnswer;
    use melvin_core::Genome;
    use melvin_field::{ActivationField, Topology};
    use std::sync::Arc;

    fn ctx() -> ServiceContext {
        ServiceContext {
            bus: Arc::new(EventBus::default()),
            field: Arc::new(ActivationField::new(Topology::empty())),
            genome: Arc::new(Genome::with_defaults()),
            arousal: Arc::new(ArcSwap::from_pointee(ArousalState::default())),
            tick: 0,
        }
    }

    #[tokio::test]
    async fn test_sweep_advances_generation_and_stays_bounded() {
        let ctx = ctx();
        let svc = LearningService::seeded(9);
        for _ in 0..50 {
            svc.tick(ctx.clone(), 3.0).await.unwrap();
        }
        assert_eq!(ctx.genome.generation(), 50);
        for (name, gene) in ctx.genome.snapshot() {
            assert!(
                gene.min <= gene.value && gene.value <= gene.max,
                "{name} out of bounds"
            );
        }
        // Critical genes untouched by the sweeps.
        assert_eq!(ctx.genome.value("max_active_nodes"), Some(1000.0));
    }

    #[tokio::test]
    async fn test_fitness_tracks_answer_confidence() {
        let ctx = ctx();
        ctx.bus.publish(
            topic::COG_ANSWER,
            Payload::CognitiveAnswer(CognitiveAnswer {
                confidence: 1.0,
                ..Default::default()
            }),
        );
        let svc = LearningService::seeded(9);
        let before = ctx.genome.get("temperature").unwrap().fitness;
        for _ in 0..10 {
            svc.tick(ctx.clone(), 3.0).await.unwrap();
        }
        let after = ctx.genome.get("temperature").unwrap().fitness;
        assert!(after > before);
    }
}

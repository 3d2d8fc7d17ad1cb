//! Working-memory service (every 2 ticks)
//!
//! Maintains a bounded set of slots (node, strength, age) holding the
//! strongest activations. Capacity comes from the `wm_capacity` gene
//! (default 7). Slots age every service tick, their strength decays, and
//! the current context is published on `wm/context`.

use crate::service::{CognitiveService, ServiceContext};
use async_trait::async_trait;
use melvin_core::events::{topic, Payload, WmContext};
use melvin_core::NodeId;
use std::sync::Mutex;

/// Per-service-tick slot strength decay.
const SLOT_DECAY: f32 = 0.95;
/// Slots weaker than this are evicted regardless of capacity.
const MIN_STRENGTH: f32 = 0.05;

#[derive(Debug, Clone, Copy)]
struct Slot {
    node: NodeId,
    strength: f32,
    age_ticks: u64,
}

#[derive(Default)]
pub struct WorkingMemoryService {
    slots: Mutex<Vec<Slot>>,
}

impl WorkingMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current slot view as (node, strength, age) triples.
    pub fn slots(&self) -> Vec<(NodeId, f32, u64)> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.iter().map(|s| (s.node, s.strength, s.age_ticks)).collect()
    }
}

#[async_trait]
impl CognitiveService for WorkingMemoryService {
    fn name(&self) -> &'static str {
        crate::budget::WORKING_MEMORY
    }

    async fn tick(&self, ctx: ServiceContext, _budget_ms: f32) -> anyhow::Result<()> {
        let capacity = ctx.genome.value_or("wm_capacity", 7.0).round().clamp(1.0, 9.0) as usize;
        let threshold = ctx.genome.value_or("selection_threshold", 0.2);
        let candidates = ctx.field.get_active(threshold);

        let context = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());

            for slot in slots.iter_mut() {
                slot.age_ticks += 1;
                slot.strength *= SLOT_DECAY;
            }
            slots.retain(|s| s.strength >= MIN_STRENGTH);

            // Refresh existing slots from the field, admit new candidates.
            for (node, activation) in candidates {
                match slots.iter_mut().find(|s| s.node == node) {
                    Some(slot) => {
                        slot.strength = slot.strength.max(activation);
                        slot.age_ticks = 0;
                    }
                    None => slots.push(Slot {
                        node,
                        strength: activation,
                        age_ticks: 0,
                    }),
                }
            }

            slots.sort_by(|a, b| b.strength.total_cmp(&a.strength).then(a.node.cmp(&b.node)));
            slots.truncate(capacity);

            WmContext {
                node_ids: slots.iter().map(|s| s.node).collect(),
                strengths: slots.iter().map(|s| s.strength).collect(),
            }
        };

        ctx.bus.publish(topic::WM_CONTEXT, Payload::WmContext(context));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arousal::ArousalState;
    use arc_swap::ArcSwap;
    use melvin_bus::EventBus;
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
    async fn test_capacity_is_bounded_by_gene() {
        let ctx = ctx();
        for n in 0..20 {
            ctx.field.activate(n, 0.5 + n as f32 * 0.02, "test");
        }
        let wm = WorkingMemoryService::new();
        wm.tick(ctx.clone(), 1.0).await.unwrap();
        assert_eq!(wm.slots().len(), 7);

        // Strongest candidates won.
        let nodes: Vec<NodeId> = wm.slots().iter().map(|(n, _, _)| *n).collect();
        assert!(nodes.contains(&19));
        assert!(!nodes.contains(&0));
    }

    #[tokio::test]
    async fn test_publishes_context() {
        let ctx = ctx();
        ctx.field.activate(5, 0.8, "test");
        let wm = WorkingMemoryService::new();
        wm.tick(ctx.clone(), 1.0).await.unwrap();
        let latest = ctx.bus.get_latest(topic::WM_CONTEXT).unwrap();
        match latest.payload {
            Payload::WmContext(c) => {
                assert_eq!(c.node_ids, vec![5]);
                assert!((c.strengths[0] - 0.8).abs() < 1e-6);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unrefreshed_slots_age_out() {
        let ctx = ctx();
        ctx.field.activate(5, 0.3, "test");
        let wm = WorkingMemoryService::new();
        wm.tick(ctx.clone(), 1.0).await.unwrap();
        assert_eq!(wm.slots().len(), 1);

        // Remove field support; the slot decays away over service ticks.
        ctx.field.clear();
        for _ in 0..40 {
            wm.tick(ctx.clone(), 1.0).await.unwrap();
        }
        assert!(wm.slots().is_empty());
    }
}

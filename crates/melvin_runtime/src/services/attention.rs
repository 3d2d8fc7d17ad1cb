//! Attention service (every tick)
//!
//! Drains the perceptual topics, injects activation for node ids carried
//! in their payloads, then spreads activation along topology edges from
//! every node above the genome's selection threshold. Spreading here, at
//! the fastest sub-rate, is what turns a point stimulus into a
//! neighborhood of context within a few ticks.

use crate::service::{CognitiveService, ServiceContext};
use async_trait::async_trait;
use melvin_core::events::{topic, Payload};

/// Injection gain for a detected object.
const VISION_GAIN: f32 = 0.3;

pub struct AttentionService;

#[async_trait]
impl CognitiveService for AttentionService {
    fn name(&self) -> &'static str {
        crate::budget::ATTENTION
    }

    async fn tick(&self, ctx: ServiceContext, _budget_ms: f32) -> anyhow::Result<()> {
        // Audio energy modulates this tick's injection gain: a loud
        // environment makes percepts more salient.
        let mut gain = 1.0;
        for event in ctx.bus.poll(topic::AUDIO_EVENTS) {
            if let Payload::AudioFrame(frame) = event.payload {
                gain = (1.0 + frame.energy.clamp(0.0, 1.0)).max(gain);
            }
        }

        for event in ctx.bus.poll(topic::VISION_EVENTS) {
            if let Payload::VisionFrame(frame) = event.payload {
                for id in frame.object_ids {
                    ctx.field.activate(id, VISION_GAIN * gain, "attention/vision");
                }
            }
        }

        // Motor state carries no field references; drained so a chatty
        // motor loop cannot silently fill its buffer.
        let _ = ctx.bus.poll(topic::MOTOR_STATE);

        let threshold = ctx.genome.value_or("selection_threshold", 0.2);
        let rate = ctx.genome.value_or("spread_rate", 0.1);
        if rate > 0.0 {
            for (node, _) in ctx.field.get_active(threshold) {
                let neighbors = ctx.field.topology().neighbors(node).to_vec();
                if !neighbors.is_empty() {
                    ctx.field.spread(node, &neighbors, rate);
                }
            }
        }
        Ok(())
    }
}

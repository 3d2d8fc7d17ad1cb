//! Reflection service (every 10 ticks)
//!
//! Reads the arousal snapshot and publishes a `reflect/command` steering
//! the system between exploration, exploitation, and consolidation. The
//! command is advice to whatever metacognitive clients are listening; the
//! core itself only emits it.

use crate::service::{CognitiveService, ServiceContext};
use async_trait::async_trait;
use melvin_core::events::{topic, Payload, ReflectCommand};

pub const MODE_CONSOLIDATE: u8 = 0;
pub const MODE_EXPLORE: u8 = 1;
pub const MODE_EXPLOIT: u8 = 2;

pub struct ReflectionService;

#[async_trait]
impl CognitiveService for ReflectionService {
    fn name(&self) -> &'static str {
        crate::budget::REFLECTION
    }

    async fn tick(&self, ctx: ServiceContext, _budget_ms: f32) -> anyhow::Result<()> {
        let arousal = ctx.arousal_snapshot();
        let (mode_code, strategy) = if arousal.exploration > 0.6 {
            (MODE_EXPLORE, "broaden search, tolerate weak activations")
        } else if arousal.focus > 0.6 && arousal.confidence > 0.5 {
            (MODE_EXPLOIT, "commit to the dominant coalition")
        } else {
            (MODE_CONSOLIDATE, "decay noise, strengthen the stable core")
        };

        ctx.bus.publish(
            topic::REFLECT_COMMAND,
            Payload::ReflectCommand(ReflectCommand {
                mode_code,
                beta: arousal.exploration,
                theta: arousal.focus,
                strategy: strategy.to_string(),
            }),
        );
        Ok(())
    }
}

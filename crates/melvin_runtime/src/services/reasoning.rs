//! Reasoning service (every 2 ticks)
//!
//! Drains `cog/query`, grounds each query's node ids into the field, and
//! answers with a confidence derived from how concentrated the field is.
//! Answer *content* is deliberately thin (generation quality is out of
//! scope) but the confidence and reasoning chain are real signals the
//! arousal and budget controllers feed on.

use crate::service::{CognitiveService, ServiceContext};
use async_trait::async_trait;
use melvin_core::events::{topic, CognitiveAnswer, Payload};

/// Injection gain for query-grounded nodes.
const QUERY_GAIN: f32 = 0.5;

pub struct ReasoningService;

#[async_trait]
impl CognitiveService for ReasoningService {
    fn name(&self) -> &'static str {
        crate::budget::REASONING
    }

    async fn tick(&self, ctx: ServiceContext, _budget_ms: f32) -> anyhow::Result<()> {
        let queries = ctx.bus.poll(topic::COG_QUERY);
        if queries.is_empty() {
            return Ok(());
        }

        // Working-memory context for the reasoning chain, if any.
        let wm_nodes = match ctx.bus.get_latest(topic::WM_CONTEXT).map(|e| e.payload) {
            Some(Payload::WmContext(c)) => c.node_ids,
            _ => Vec::new(),
        };

        for event in queries {
            let Payload::CognitiveQuery(query) = event.payload else {
                continue;
            };
            for id in &query.node_ids {
                ctx.field.activate(*id, QUERY_GAIN, "reasoning/query");
            }

            // Confidence: concentrated activation answers confidently, a
            // diffuse field does not.
            let metrics = ctx.field.get_metrics();
            let diffusion = (metrics.entropy / 5.0).clamp(0.0, 1.0);
            let confidence = (0.7 * metrics.coherence + 0.3 * (1.0 - diffusion)).clamp(0.0, 1.0);

            let mut chain: Vec<String> = wm_nodes.iter().map(|n| format!("wm:{n}")).collect();
            chain.push(format!("coherence:{:.3}", metrics.coherence));

            ctx.bus.publish(
                topic::COG_ANSWER,
                Payload::CognitiveAnswer(CognitiveAnswer {
                    text: format!(
                        "intent {} resolved against {} active nodes",
                        query.intent_code, metrics.active
                    ),
                    reasoning_chain: chain,
                    confidence,
                }),
            );
        }
        Ok(())
    }
}

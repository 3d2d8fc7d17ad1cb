//! Cognitive service trait
//!
//! A service is a bus subscriber and a field mutator, nothing else. The
//! scheduler fires each registered service at its configured sub-rate with
//! an advisory millisecond budget; services are expected but not required
//! to honor it, and a failing or panicking tick never takes down the loop.

use crate::arousal::ArousalState;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use melvin_bus::EventBus;
use melvin_core::Genome;
use melvin_field::ActivationField;
use std::sync::Arc;

/// Everything a service is allowed to touch. Cloned per invocation.
#[derive(Clone)]
pub struct ServiceContext {
    pub bus: Arc<EventBus>,
    pub field: Arc<ActivationField>,
    pub genome: Arc<Genome>,
    /// Lock-free snapshot of the current arousal drives.
    pub arousal: Arc<ArcSwap<ArousalState>>,
    /// Scheduler tick counter at invocation time.
    pub tick: u64,
}

impl ServiceContext {
    pub fn arousal_snapshot(&self) -> ArousalState {
        **self.arousal.load()
    }
}

#[async_trait]
pub trait CognitiveService: Send + Sync {
    /// Stable name, used for budget lookup and KPI attribution.
    fn name(&self) -> &'static str;

    /// One service tick with its allotted budget in milliseconds.
    async fn tick(&self, ctx: ServiceContext, budget_ms: f32) -> anyhow::Result<()>;
}

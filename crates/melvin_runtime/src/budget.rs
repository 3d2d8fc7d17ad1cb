//! Per-service compute budgets
//!
//! Named millisecond allowances for one 20 ms tick, recomputed from the
//! declared defaults every tick, so adaptation does not accumulate across
//! ticks. Their sum may exceed the tick because services run at different
//! sub-rates. Budgets are advisory: the scheduler measures and records
//! overruns but never preempts.

use melvin_core::config::BudgetConfig;
use std::collections::HashMap;

pub const ATTENTION: &str = "attention";
pub const REASONING: &str = "reasoning";
pub const WORKING_MEMORY: &str = "working_memory";
pub const LEARNING: &str = "learning";
pub const REFLECTION: &str = "reflection";

#[derive(Debug, Clone, Default)]
pub struct Budgets {
    ms: HashMap<String, f32>,
}

impl Budgets {
    /// Adapt this tick's budgets from the declared defaults:
    /// shaky answers buy reasoning time, CPU pressure taxes learning,
    /// and a high-entropy field buys reflection time.
    pub fn allocate(
        defaults: &BudgetConfig,
        confidence: f32,
        cpu_load: f32,
        entropy: f32,
    ) -> Self {
        let mut ms = HashMap::from([
            (ATTENTION.to_string(), defaults.attention_ms),
            (REASONING.to_string(), defaults.reasoning_ms),
            (WORKING_MEMORY.to_string(), defaults.working_memory_ms),
            (LEARNING.to_string(), defaults.learning_ms),
            (REFLECTION.to_string(), defaults.reflection_ms),
        ]);
        if confidence < 0.4 {
            *ms.get_mut(REASONING).unwrap() += 2.0;
        }
        if cpu_load > 0.85 {
            *ms.get_mut(LEARNING).unwrap() -= 1.0;
        }
        if entropy > 3.0 {
            *ms.get_mut(REFLECTION).unwrap() += 0.5;
        }
        for v in ms.values_mut() {
            *v = v.max(0.0);
        }
        Self { ms }
    }

    /// Budget for a named service; 0 for unregistered names.
    pub fn get(&self, service: &str) -> f32 {
        self.ms.get(service).copied().unwrap_or(0.0)
    }

    pub fn total_ms(&self) -> f32 {
        self.ms.values().sum()
    }
}

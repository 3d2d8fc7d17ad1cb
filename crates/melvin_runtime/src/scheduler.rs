//! Master scheduler
//!
//! A soft-real-time 50 Hz loop. Each 20 ms tick runs, strictly in order:
//! metrics snapshot → arousal update → budget allocation → genome
//! write-back → due services → field hygiene → KPI record, then sleeps to
//! the next absolute tick boundary. Service ticks run as spawned tasks so
//! a panic or error in one never unwinds the loop; overruns are measured
//! and recorded, never preempted.

use crate::arousal::ArousalState;
use crate::budget::Budgets;
use crate::kpi::{KpiLogger, KpiRecord};
use crate::service::{CognitiveService, ServiceContext};
use arc_swap::ArcSwap;
use melvin_bus::EventBus;
use melvin_core::config::{BudgetConfig, SchedulerConfig};
use melvin_core::events::{topic, Payload, SafetyEvent};
use melvin_core::{Genome, MelvinConfig};
use melvin_field::ActivationField;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// How many consecutive overruns in one service before a warning.
const OVERRUN_WARN_EVERY: u32 = 25;

struct Registration {
    service: Arc<dyn CognitiveService>,
    period_ticks: u64,
    overruns: u64,
    consecutive_overruns: u32,
}

/// Cheap cloneable handle for requesting a cooperative stop.
#[derive(Clone)]
pub struct SchedulerControl {
    running: Arc<AtomicBool>,
}

impl SchedulerControl {
    /// Request shutdown; the loop exits at its next deadline check.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub struct Scheduler {
    cfg: SchedulerConfig,
    budget_defaults: BudgetConfig,
    bus: Arc<EventBus>,
    field: Arc<ActivationField>,
    genome: Arc<Genome>,
    arousal: Arc<ArcSwap<ArousalState>>,
    services: Vec<Registration>,
    kpi: KpiLogger,
    running: Arc<AtomicBool>,
    tick_counter: u64,
    ticks_run: u64,
    last_tick_at: Option<Instant>,
    fps: f32,
    cpu: f32,
}

impl Scheduler {
    pub fn new(
        config: &MelvinConfig,
        bus: Arc<EventBus>,
        field: Arc<ActivationField>,
        genome: Arc<Genome>,
        kpi: KpiLogger,
    ) -> Self {
        Self {
            cfg: config.scheduler.clone(),
            budget_defaults: config.budgets.clone(),
            bus,
            field,
            genome,
            arousal: Arc::new(ArcSwap::from_pointee(ArousalState::default())),
            services: Vec::new(),
            kpi,
            running: Arc::new(AtomicBool::new(true)),
            tick_counter: 0,
            ticks_run: 0,
            last_tick_at: None,
            fps: 0.0,
            cpu: 0.0,
        }
    }

    /// Register a service at a sub-rate in tick multiples (1 = every
    /// tick). Services fire when the tick counter is divisible by it.
    pub fn register(&mut self, service: Arc<dyn CognitiveService>, period_ticks: u64) {
        self.services.push(Registration {
            service,
            period_ticks: period_ticks.max(1),
            overruns: 0,
            consecutive_overruns: 0,
        });
    }

    /// Register the five built-in services at their standard sub-rates:
    /// attention 1, reasoning 2, working memory 2, learning 5,
    /// reflection 10.
    pub fn register_default_services(&mut self) {
        use crate::services::*;
        self.register(Arc::new(AttentionService), 1);
        self.register(Arc::new(ReasoningService), 2);
        self.register(Arc::new(WorkingMemoryService::new()), 2);
        self.register(Arc::new(LearningService::new()), 5);
        self.register(Arc::new(ReflectionService), 10);
    }

    pub fn control(&self) -> SchedulerControl {
        SchedulerControl {
            running: Arc::clone(&self.running),
        }
    }

    pub fn arousal(&self) -> Arc<ArcSwap<ArousalState>> {
        Arc::clone(&self.arousal)
    }

    /// Strictly monotonic while running.
    pub fn ticks(&self) -> u64 {
        self.ticks_run
    }

    /// Drive the loop until a stop is requested, then drain the KPI
    /// writer. Sleeping targets absolute tick boundaries, so a slow tick
    /// does not shift the schedule.
    pub async fn run(mut self) {
        let period = Duration::from_millis(self.cfg.tick_ms.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        tracing::info!(
            tick_ms = self.cfg.tick_ms,
            services = self.services.len(),
            "scheduler running"
        );
        while self.running.load(Ordering::Acquire) {
            interval.tick().await;
            if !self.running.load(Ordering::Acquire) {
                break;
            }
            self.run_tick().await;
        }
        tracing::info!(ticks = self.ticks_run, "scheduler stopped");
        self.shutdown().await;
    }

    /// Drain helper tasks. `run` calls this on exit; tests driving
    /// `run_tick` directly call it themselves.
    pub async fn shutdown(mut self) {
        self.kpi.shutdown().await;
    }

    /// One full tick, phases 1–7. Public so hosts and tests can drive the
    /// schedule without wall-clock sleeps.
    pub async fn run_tick(&mut self) {
        let tick = self.tick_counter;
        let started = Instant::now();

        // Measured period / fps (I5).
        let nominal_ms = self.cfg.tick_ms.max(1) as f32;
        if let Some(last) = self.last_tick_at {
            let period_ms = (started - last).as_secs_f32() * 1000.0;
            if period_ms > 0.0 {
                let inst_fps = 1000.0 / period_ms;
                self.fps = if self.fps == 0.0 {
                    inst_fps
                } else {
                    0.9 * self.fps + 0.1 * inst_fps
                };
            }
        } else {
            self.fps = 1000.0 / nominal_ms;
        }
        self.last_tick_at = Some(started);

        // Phase 1: snapshot metrics, stitch in latest answer confidence,
        // publish on field/metrics. Bus reads are point-in-time here.
        let answer_confidence = match self.bus.get_latest(topic::COG_ANSWER).map(|e| e.payload) {
            Some(Payload::CognitiveAnswer(a)) => Some(a.confidence),
            _ => None,
        };
        let mut metrics = self.field.get_metrics();
        metrics.conf = answer_confidence.unwrap_or_else(|| self.arousal.load().confidence);
        self.bus
            .publish(topic::FIELD_METRICS, Payload::FieldMetrics(metrics));

        // Phase 2: arousal update.
        let arousal = self.arousal.load().update(&metrics, answer_confidence);
        self.arousal.store(Arc::new(arousal));

        // Phase 3: budget allocation from declared defaults.
        let budgets = Budgets::allocate(
            &self.budget_defaults,
            arousal.confidence,
            self.cpu,
            metrics.entropy,
        );

        // Phase 4: arousal-driven genome write-back.
        arousal.write_back(&self.genome);

        // Phase 5: fire due services.
        let services_fired = self.fire_due_services(tick, &budgets).await;

        // Phase 6: field hygiene.
        let decay_rate = self.genome.value_or("decay_rate", 0.05);
        self.field.decay(decay_rate);
        if self.cfg.normalize_every > 0 && tick % self.cfg.normalize_every == 0 && tick > 0 {
            self.field.normalize_degrees();
        }
        let cap = self.genome.value_or("max_active_nodes", 1000.0).max(1.0) as usize;
        let active = self.field.active_count();
        if active > cap {
            let discarded = self.field.apply_kwta(cap);
            tracing::warn!(active, cap, discarded, "field over budget, k-WTA applied");
            self.bus.publish(
                topic::SAFETY_EVENTS,
                Payload::SafetyEvent(SafetyEvent {
                    event_type: "BACKPRESSURE_KWTA".to_string(),
                    severity: 0.7,
                    details: format!(
                        "active_count {active} exceeded cap {cap}; discarded {discarded} entries"
                    ),
                }),
            );
        }

        // Phase 7: KPI record.
        let busy_ms = started.elapsed().as_secs_f32() * 1000.0;
        self.cpu = (0.9 * self.cpu + 0.1 * (busy_ms / nominal_ms)).clamp(0.0, 1.0);
        let record = KpiRecord {
            t: chrono::Utc::now().timestamp_micros() as f64 / 1e6,
            nodes: metrics.active,
            var: metrics.var,
            sparsity: metrics.sparsity,
            entropy: metrics.entropy,
            coherence: metrics.coherence,
            confidence: arousal.confidence,
            fps: self.fps,
            cpu: self.cpu,
            gpu: 0.0,
            dropped: self.bus.dropped_messages(),
            services: services_fired,
        };
        self.kpi.log(&record);
        if self.cfg.verbose {
            println!(
                "[melvin] tick={} active={} entropy={:.3} coherence={:.3} conf={:.3} \
                 expl={:.2} focus={:.2} budget_ms={:.1} fired={}",
                tick,
                metrics.active,
                metrics.entropy,
                metrics.coherence,
                arousal.confidence,
                arousal.exploration,
                arousal.focus,
                budgets.total_ms(),
                services_fired
            );
        }

        // Phase 8 (sleeping to the next absolute boundary) happens in
        // `run`; the counter only ever moves forward.
        self.tick_counter += 1;
        self.ticks_run += 1;
    }

    async fn fire_due_services(&mut self, tick: u64, budgets: &Budgets) -> usize {
        let mut fired = 0;
        for slot in &mut self.services {
            if tick % slot.period_ticks != 0 {
                continue;
            }
            fired += 1;
            let name = slot.service.name();
            let budget_ms = budgets.get(name);
            let ctx = ServiceContext {
                bus: Arc::clone(&self.bus),
                field: Arc::clone(&self.field),
                genome: Arc::clone(&self.genome),
                arousal: Arc::clone(&self.arousal),
                tick,
            };
            let service = Arc::clone(&slot.service);
            let started = Instant::now();
            // Spawned so a panicking service surfaces as a JoinError
            // instead of unwinding the loop.
            let outcome = tokio::spawn(async move { service.tick(ctx, budget_ms).await }).await;
            let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(service = name, tick, "service tick failed: {e:#}");
                }
                Err(join_err) if join_err.is_panic() => {
                    tracing::error!(service = name, tick, "service tick panicked");
                }
                Err(join_err) => {
                    tracing::warn!(service = name, tick, "service tick cancelled: {join_err}");
                }
            }
            if budget_ms > 0.0 && elapsed_ms > budget_ms {
                slot.overruns += 1;
                slot.consecutive_overruns += 1;
                tracing::debug!(
                    service = name,
                    tick,
                    elapsed_ms,
                    budget_ms,
                    "service exceeded budget"
                );
                if slot.consecutive_overruns % OVERRUN_WARN_EVERY == 0 {
                    tracing::warn!(
                        service = name,
                        consecutive = slot.consecutive_overruns,
                        total = slot.overruns,
                        "service keeps overrunning its budget"
                    );
                }
            } else {
                slot.consecutive_overruns = 0;
            }
        }
        fired
    }
}

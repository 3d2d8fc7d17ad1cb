use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MelvinConfig {
    pub scheduler: SchedulerConfig,
    pub bus: BusConfig,
    pub field: FieldConfig,
    pub budgets: BudgetConfig,
    pub paths: PathConfig,
}

impl MelvinConfig {
    /// Load config from a TOML file, falling back to defaults for missing
    /// fields. After loading, env var overrides are applied.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config: MelvinConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML config")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Try to load from path; if the file doesn't exist, return defaults
    /// with env overrides.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::info!("Config file not found or invalid ({}), using defaults", e);
                let mut cfg = Self::default();
                cfg.apply_env_overrides();
                cfg
            }
        }
    }

    /// Apply environment variable overrides on top of file-based config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MELVIN_TOPOLOGY_PATH") {
            self.paths.topology = Some(v);
        }
        if let Ok(v) = std::env::var("MELVIN_GENOME_PATH") {
            self.paths.genome = Some(v);
        }
        if let Ok(v) = std::env::var("MELVIN_KPI_PATH") {
            self.paths.kpi_log = v;
        }
        if let Ok(v) = std::env::var("MELVIN_TICK_MS") {
            if let Ok(n) = v.parse() {
                self.scheduler.tick_ms = n;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Master tick period in milliseconds (50 Hz).
    pub tick_ms: u64,
    /// Degree normalization cadence, in ticks.
    pub normalize_every: u64,
    /// Per-tick internal-state trace on stdout (MELVIN_VERBOSE).
    pub verbose: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: 20,
            normalize_every: 10,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Per-topic buffer capacity. Overflow drops the oldest event.
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Activation ceiling A_max.
    pub a_max: f32,
    /// Prune threshold ε: entries below this are erased, not stored.
    pub epsilon: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            a_max: 1.0,
            epsilon: 1e-3,
        }
    }
}

/// Declared per-service millisecond budgets for one 20 ms tick. The sum
/// may exceed the tick because services run at different sub-rates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub attention_ms: f32,
    pub reasoning_ms: f32,
    pub working_memory_ms: f32,
    pub learning_ms: f32,
    pub reflection_ms: f32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            attention_ms: 2.0,
            reasoning_ms: 5.0,
            working_memory_ms: 1.0,
            learning_ms: 3.0,
            reflection_ms: 2.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Static topology (JSON). Required by the reference host; the core
    /// runs with an empty topology when absent.
    pub topology: Option<String>,
    /// Evolved genome (binary). Seed defaults are used when absent.
    pub genome: Option<String>,
    pub kpi_log: String,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            topology: None,
            genome: None,
            kpi_log: "melvin_kpi.jsonl".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

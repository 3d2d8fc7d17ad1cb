//! Reference host for the Melvin runtime.
//!
//! Wires bus, field, genome, and scheduler together, runs for a requested
//! duration, and writes the per-tick KPI report. Exit codes: 0 on clean
//! shutdown, 2 on fatal startup error (missing or malformed topology /
//! genome / report path).

use clap::Parser;
use melvin_bus::EventBus;
use melvin_core::{Genome, MelvinConfig};
use melvin_field::{ActivationField, Topology};
use melvin_runtime::{KpiLogger, Scheduler};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// How long to run, in seconds. 0 runs until Ctrl-C.
    #[arg(long, default_value_t = 0)]
    duration: u64,

    /// KPI report path (one JSON record per tick).
    #[arg(long)]
    report: Option<String>,

    /// Path to a TOML config file.
    #[arg(long, default_value = "melvin.toml")]
    config: String,

    /// Static topology JSON (overrides config).
    #[arg(long)]
    topology: Option<String>,

    /// Evolved genome binary (overrides config).
    #[arg(long)]
    genome: Option<String>,
}

fn startup(args: &Args) -> anyhow::Result<(MelvinConfig, Topology, Genome, KpiLogger)> {
    let mut config = MelvinConfig::load_or_default(&args.config);
    if let Some(path) = &args.topology {
        config.paths.topology = Some(path.clone());
    }
    if let Some(path) = &args.genome {
        config.paths.genome = Some(path.clone());
    }
    if let Some(path) = &args.report {
        config.paths.kpi_log = path.clone();
    }
    if std::env::var("MELVIN_VERBOSE").map_or(false, |v| !v.is_empty()) {
        config.scheduler.verbose = true;
    }

    let topology = match &config.paths.topology {
        Some(path) => {
            info!("Loading topology from {path}...");
            Topology::load(path)?
        }
        None => {
            info!("No topology configured, starting with an empty graph");
            Topology::empty()
        }
    };

    let genome = match &config.paths.genome {
        Some(path) => {
            info!("Loading genome from {path}...");
            Genome::load(path)?
        }
        None => Genome::with_defaults(),
    };

    let kpi = KpiLogger::open(&config.paths.kpi_log)?;
    Ok((config, topology, genome, kpi))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    let args = Args::parse();

    info!("Initializing Melvin...");
    let (config, topology, genome, kpi) = match startup(&args) {
        Ok(parts) => parts,
        Err(e) => {
            tracing::error!("Fatal startup error: {e:#}");
            return ExitCode::from(2);
        }
    };

    let bus = Arc::new(EventBus::new(config.bus.capacity));
    let field = Arc::new(ActivationField::with_limits(
        topology,
        config.field.a_max,
        config.field.epsilon,
    ));
    let genome = Arc::new(genome);

    let mut scheduler = Scheduler::new(
        &config,
        Arc::clone(&bus),
        Arc::clone(&field),
        Arc::clone(&genome),
        kpi,
    );
    scheduler.register_default_services();
    let control = scheduler.control();

    // Stop on Ctrl-C or after --duration.
    let stopper = control.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Interrupt received, shutting down");
        stopper.stop();
    });
    if args.duration > 0 {
        let stopper = control.clone();
        let duration = Duration::from_secs(args.duration);
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            stopper.stop();
        });
    }

    info!(
        tick_ms = config.scheduler.tick_ms,
        kpi = %config.paths.kpi_log,
        "Melvin online"
    );
    scheduler.run().await;

    info!(
        dropped = bus.dropped_messages(),
        generation = genome.generation(),
        "Clean shutdown"
    );
    ExitCode::SUCCESS
}

//! Startup error taxonomy
//!
//! Only startup failures are typed errors: a missing or malformed
//! topology/genome file must terminate the host with a non-zero exit code
//! before the scheduler starts. Everything recoverable (back-pressure,
//! budget overruns, KPI write failures) is surfaced through counters and
//! `safety/events`, not through error returns.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read topology file {path}: {source}")]
    TopologyRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed topology: {0}")]
    TopologyFormat(String),

    #[error("failed to read genome file {path}: {source}")]
    GenomeRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed genome: {0}")]
    GenomeFormat(String),

    #[error("failed to open KPI log {path}: {source}")]
    KpiOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

//! KPI logger
//!
//! One JSON object per tick, appended to a text file by a dedicated
//! writer task fed over an unbounded channel; the scheduler's hot path
//! only formats and sends. A failed write logs a warning and drops that
//! record; the tick always completes. No fsync inside the tick.

use melvin_core::StartupError;
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Per-tick record. Numeric fields are written with 6-digit fixed
/// precision; key order is part of the stable format.
#[derive(Debug, Clone, Default)]
pub struct KpiRecord {
    /// Wall-clock seconds (unix epoch).
    pub t: f64,
    pub nodes: usize,
    pub var: f32,
    pub sparsity: f32,
    pub entropy: f32,
    pub coherence: f32,
    pub confidence: f32,
    /// Measured tick rate.
    pub fps: f32,
    pub cpu: f32,
    pub gpu: f32,
    pub dropped: u64,
    /// Services fired this tick.
    pub services: usize,
}

impl KpiRecord {
    fn to_line(&self) -> String {
        format!(
            concat!(
                "{{\"t\":{:.6},\"nodes\":{},\"var\":{:.6},\"sparsity\":{:.6},",
                "\"entropy\":{:.6},\"coherence\":{:.6},\"confidence\":{:.6},",
                "\"fps\":{:.6},\"cpu\":{:.6},\"gpu\":{:.6},\"dropped\":{},\"services\":{}}}"
            ),
            self.t,
            self.nodes,
            self.var,
            self.sparsity,
            self.entropy,
            self.coherence,
            self.confidence,
            self.fps,
            self.cpu,
            self.gpu,
            self.dropped,
            self.services
        )
    }
}

pub struct KpiLogger {
    tx: Option<mpsc::UnboundedSender<String>>,
    writer: Option<JoinHandle<()>>,
}

impl KpiLogger {
    /// Open (append) the log file and spawn the writer task. Failing to
    /// open the file is a startup error; failing to write later is not.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|e| StartupError::KpiOpen {
                path: path.as_ref().display().to_string(),
                source: e,
            })?;
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let writer = tokio::spawn(async move {
            let mut file = std::io::BufWriter::new(file);
            while let Some(line) = rx.recv().await {
                if let Err(e) = writeln!(file, "{line}") {
                    tracing::warn!("KPI write failed, record dropped: {e}");
                }
                let _ = file.flush();
            }
        });
        Ok(Self {
            tx: Some(tx),
            writer: Some(writer),
        })
    }

    /// Best-effort append; never blocks the tick.
    pub fn log(&self, record: &KpiRecord) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(record.to_line());
        }
    }

    /// Close the channel and wait for the writer to drain.
    pub async fn shutdown(&mut self) {
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.await;
        }
    }
}

// ============================================================
// Layer 6 — Summaries and Metrics
// ============================================================
// Append-only CSV logs:
//
//   <output>/train/events.csv   step,loss,acc   one row per batch
//   <output>/valid/events.csv   step,loss,acc   one row per batch
//   <output>/metrics.csv        one row per epoch
//
// Example metrics.csv:
//   epoch,train_loss,valid_loss,train_acc,valid_acc
//   0,1.372100,1.361800,0.281250,0.312500
//   1,1.318400,1.327700,0.406250,0.375000
//
// Nothing in the trainer reads these files back.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

// ─── SummaryWriter ────────────────────────────────────────────────────────────
/// Per-batch scalar stream for one phase (train or valid).
pub struct SummaryWriter {
    file: File,
    path: PathBuf,
    step: usize,
}

impl SummaryWriter {
    /// Open `<dir>/events.csv` for appending, creating `dir` if needed.
    /// Steps continue after the rows already in the file.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path  = dir.join("events.csv");
        let fresh = !path.exists();
        let step  = if fresh {
            0
        } else {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("Cannot read summary stream '{}'", path.display()))?;
            text.lines().skip(1).filter(|l| !l.is_empty()).count()
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open summary stream '{}'", path.display()))?;
        if fresh {
            writeln!(file, "step,loss,acc")?;
        }

        Ok(Self { file, path, step })
    }

    /// Append one batch worth of scalars.
    pub fn add_scalars(&mut self, loss: f64, acc: f64) -> Result<()> {
        writeln!(self.file, "{},{:.6},{:.6}", self.step, loss, acc)?;
        self.step += 1;
        Ok(())
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

// ─── EpochMetrics ─────────────────────────────────────────────────────────────
/// One row of metrics for a completed epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 0-based, matches the checkpoint file name
    pub epoch:      usize,
    pub train_loss: f64,
    pub valid_loss: f64,
    pub train_acc:  f64,
    pub valid_acc:  f64,
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// resumed run keeps appending to the same log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,valid_loss,train_acc,valid_acc")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch, m.train_loss, m.valid_loss, m.train_acc, m.valid_acc,
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records per-epoch training metrics to a CSV file.
//
// Metrics recorded per epoch (train_* and val_* for each):
//   - loss: wlc-weighted ce + mse (activation penalty excluded)
//   - ce:   categorical cross-entropy
//   - mse:  continuous mean-squared-error
//   - comp: unweighted ce + mse
// plus the learning rate used during the epoch.
//
// Output file: <checkpoint_dir>/metrics.csv

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

const HEADER: &str =
    "epoch,train_loss,val_loss,train_ce,val_ce,train_mse,val_mse,train_comp,val_comp,lr";

/// Sample-weighted averages of one pass over a split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PassLosses {
    pub loss: f64,
    pub ce:   f64,
    pub mse:  f64,
    pub comp: f64,
}

/// Running sums weighted by batch row count.
#[derive(Debug, Clone, Default)]
pub struct LossAccumulator {
    sums:    PassLosses,
    samples: usize,
}

impl LossAccumulator {
    pub fn add(&mut self, loss: f64, ce: f64, mse: f64, rows: usize) {
        let w = rows as f64;
        self.sums.loss += loss * w;
        self.sums.ce   += ce * w;
        self.sums.mse  += mse * w;
        self.sums.comp += (ce + mse) * w;
        self.samples   += rows;
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Averages over every sample seen; NaN when nothing was seen.
    pub fn average(&self) -> PassLosses {
        let n = self.samples as f64;
        PassLosses {
            loss: self.sums.loss / n,
            ce:   self.sums.ce / n,
            mse:  self.sums.mse / n,
            comp: self.sums.comp / n,
        }
    }
}

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,
    pub train: PassLosses,
    pub val:   PassLosses,
    pub lr:    f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train: PassLosses, val: PassLosses, lr: f64) -> Self {
        Self { epoch, train, val, lr }
    }

    /// Multi-line human-readable report for the console.
    pub fn report(&self, total_epochs: usize) -> String {
        let tag = format!("Epoch [{}/{}]", self.epoch, total_epochs);
        format!(
            "{tag}, Training Loss: {:.8} | Validation Loss: {:.8}\n\
             {tag}, Training CE Loss: {:.8} | Validation CE Loss: {:.8}\n\
             {tag}, Training MSE Loss: {:.8} | Validation MSE Loss: {:.8}\n\
             {tag}, Training Loss Comp: {:.8} | Validation Loss Comp: {:.8}\n\
             {tag}, Learning Rate: {:e}",
            self.train.loss, self.val.loss,
            self.train.ce, self.val.ce,
            self.train.mse, self.val.mse,
            self.train.comp, self.val.comp,
            self.lr,
        )
    }
}

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row in the CSV.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:e}",
            m.epoch,
            m.train.loss, m.val.loss,
            m.train.ce, m.val.ce,
            m.train.mse, m.val.mse,
            m.train.comp, m.val.comp,
            m.lr,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train.loss,
            m.val.loss,
        );

        Ok(())
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

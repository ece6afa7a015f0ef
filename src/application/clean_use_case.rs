// ============================================================
// Layer 2 — CleanUseCase
// ============================================================
//   Step 1: Restore the trained session     (Layer 6 - infra)
//   Step 2: Load + encode the dirty table   (Layer 4 - data)
//   Step 3: Optionally encode ground truth  (Layer 4 - data)
//   Step 4: Reconstruct and decode          (Layer 5 - ml)
//   Step 5: Write the cleaned CSV           (Layer 4 - data)

use anyhow::{ensure, Result};
use std::path::PathBuf;

use crate::application::session::{StoreChoice, TrainedSession};
use crate::data::loader::{write_table, CsvTableLoader};
use crate::ml::inferencer::{CleanMetrics, Decoders, Inferencer};

#[derive(Debug, Clone)]
pub struct CleanRequest {
    pub checkpoint_dir: String,
    pub dirty_path:     PathBuf,
    /// Clean version of `dirty_path`, row for row; diagnostics only.
    pub truth_path:     Option<PathBuf>,
    pub output_path:    PathBuf,
    /// Defaults to the training batch size.
    pub batch_size:     Option<usize>,
    pub store:          StoreChoice,
}

#[derive(Debug, Clone)]
pub struct CleanReport {
    pub rows_in:  usize,
    pub rows_out: usize,
    pub metrics:  Option<CleanMetrics>,
}

pub struct CleanUseCase {
    request: CleanRequest,
}

impl CleanUseCase {
    pub fn new(request: CleanRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<CleanReport> {
        let req     = &self.request;
        let session = TrainedSession::restore(&req.checkpoint_dir, req.store.clone())?;
        let pre     = &session.preprocessor;

        let dirty    = CsvTableLoader::new(&req.dirty_path).load()?;
        let dirty_ds = pre.transform(&dirty)?;

        let truth_ds = match &req.truth_path {
            Some(path) => {
                let truth = CsvTableLoader::new(path).load()?;
                ensure!(
                    truth.len() == dirty.len(),
                    "ground truth has {} rows, dirty table has {}", truth.len(), dirty.len()
                );
                Some(pre.transform(&truth)?)
            }
            None => None,
        };

        let batch_size = req.batch_size.unwrap_or(session.config.batch_size);
        let inferencer = Inferencer::new(session.model, session.device, batch_size);
        let decoders   = Decoders { scaler: &pre.scaler, encoder: &pre.encoder };
        let outcome    = inferencer.clean(&dirty_ds, truth_ds.as_ref(), &pre.schema(), decoders, &dirty.columns)?;

        if outcome.table.len() < dirty.len() {
            tracing::warn!(
                "{} trailing rows did not fill a batch of {} and were dropped",
                dirty.len() - outcome.table.len(), batch_size,
            );
        }

        write_table(&outcome.table, &req.output_path)?;
        tracing::info!("Wrote cleaned table to '{}'", req.output_path.display());

        Ok(CleanReport {
            rows_in:  dirty.len(),
            rows_out: outcome.table.len(),
            metrics:  outcome.metrics,
        })
    }
}

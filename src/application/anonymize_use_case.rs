// ============================================================
// Layer 2 — AnonymizeUseCase
// ============================================================
// Projects every record through the encoder half only and
// writes the latent vectors, indexed by source row.
//
// With a probe target, a small classifier is fitted on the
// latent vectors to predict that column; its held-out accuracy
// shows how much of the column the embedding still carries.

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::path::PathBuf;

use crate::application::session::{StoreChoice, TrainedSession};
use crate::data::{
    dataset::TabularDataset,
    loader::{write_latent, CsvTableLoader},
    preprocessor::encode_labels,
};
use crate::domain::table::LatentTable;
use crate::ml::{
    inferencer::{accuracy, Inferencer},
    model::{StackedNetConfig, TerminalPolicy},
    objective::ClassificationObjective,
    trainer::{run_training, TrainingOptions},
    TrainBackend,
};

#[derive(Debug, Clone)]
pub struct AnonymizeRequest {
    pub checkpoint_dir: String,
    pub input_path:     PathBuf,
    pub output_path:    PathBuf,
    /// Defaults to the training batch size.
    pub batch_size:     Option<usize>,
    pub store:          StoreChoice,
    /// Column to predict from the latent vectors.
    pub probe_target:   Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub target:    String,
    pub classes:   usize,
    pub eval_rows: usize,
    pub accuracy:  f64,
}

#[derive(Debug, Clone)]
pub struct AnonymizeReport {
    pub rows_in:      usize,
    pub rows_out:     usize,
    pub latent_width: usize,
    pub probe:        Option<ProbeReport>,
}

pub struct AnonymizeUseCase {
    request: AnonymizeRequest,
}

impl AnonymizeUseCase {
    pub fn new(request: AnonymizeRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<AnonymizeReport> {
        let req     = &self.request;
        let session = TrainedSession::restore(&req.checkpoint_dir, req.store.clone())?;

        let table   = CsvTableLoader::new(&req.input_path).load()?;
        let dataset = session.preprocessor.transform(&table)?;

        let batch_size = req.batch_size.unwrap_or(session.config.batch_size);
        let latent_width = session.network.latent_width();
        let inferencer = Inferencer::new(session.model, session.device, batch_size);
        let latent     = inferencer.anonymize(&dataset)?;

        write_latent(&latent, &req.output_path)?;
        tracing::info!("Wrote {} latent rows to '{}'", latent.len(), req.output_path.display());

        let probe = match &req.probe_target {
            Some(target) => {
                // Loaded tables are indexed by row position.
                let column = table.column(target)?;
                let labels: Vec<&str> = latent.index.iter().map(|&i| column[i]).collect();
                let report = probe_latent(target, &latent, &labels, batch_size, session.config.seed)?;
                tracing::info!(
                    "Probe accuracy for '{}' over {} rows: {:.4}",
                    target, report.eval_rows, report.accuracy,
                );
                Some(report)
            }
            None => None,
        };

        Ok(AnonymizeReport {
            rows_in:  table.len(),
            rows_out: latent.len(),
            latent_width,
            probe,
        })
    }
}

/// Fit a one-layer classifier on 80% of the latent rows and score it
/// on the rest.
fn probe_latent(
    target:     &str,
    latent:     &LatentTable,
    labels:     &[&str],
    batch_size: usize,
    seed:       u64,
) -> Result<ProbeReport> {
    let (ids, classes) = encode_labels(labels);

    let mut order: Vec<usize> = (0..latent.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));
    let cut = latent.len() * 4 / 5;
    let (fit_rows, eval_rows) = order.split_at(cut);

    let subset = |rows: &[usize]| -> Result<TabularDataset> {
        TabularDataset::new(
            rows.iter().map(|&r| latent.rows[r].clone()).collect(),
            rows.iter().map(|&r| latent.index[r]).collect(),
        )?
        .with_targets(rows.iter().map(|&r| ids[r]).collect())
    };
    let fit  = subset(fit_rows)?;
    let eval = subset(eval_rows)?;

    let batch_size = batch_size.min(eval.features.len());
    ensure!(batch_size > 0, "too few latent rows to probe");

    let device = Default::default();
    let width  = latent.width();
    let model  = StackedNetConfig::new(vec![width, width])
        .with_head(TerminalPolicy::Classification { classes: classes.len() })
        .init::<TrainBackend>(&device);
    let opts = TrainingOptions {
        epochs:       50,
        batch_size,
        patience:     5,
        shuffle_seed: Some(seed),
        ..Default::default()
    };
    let outcome = run_training(model, &ClassificationObjective, &fit, &eval, &opts, &device, None)?;

    let predictions = Inferencer::new(outcome.best, device, batch_size).classify(&eval)?;
    let targets     = eval.targets.unwrap_or_default();

    Ok(ProbeReport {
        target:    target.to_string(),
        classes:   classes.len(),
        eval_rows: predictions.len(),
        accuracy:  accuracy(&predictions, &targets),
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{tests::{config, write_csv}, TrainUseCase};
    use crate::infra::storage::LocalStore;
    use std::fs;

    #[test]
    fn test_anonymize_writes_truncated_latent_table() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(&dir.path().join("data.csv"));
        let cfg = config(dir.path());
        TrainUseCase::new(cfg.clone(), Box::new(LocalStore::new(&cfg.checkpoint_dir)))
            .execute()
            .unwrap();

        let request = AnonymizeRequest {
            checkpoint_dir: cfg.checkpoint_dir.clone(),
            input_path:     dir.path().join("data.csv"),
            output_path:    dir.path().join("latent.csv"),
            batch_size:     Some(16),
            store:          StoreChoice::local(),
            probe_target:   Some("sex".into()),
        };
        let report = AnonymizeUseCase::new(request).execute().unwrap();

        assert_eq!(report.rows_in, 60);
        assert_eq!(report.rows_out, 48);
        assert_eq!(report.latent_width, 2);
        let probe = report.probe.unwrap();
        assert_eq!(probe.target, "sex");
        assert_eq!(probe.classes, 3);
        assert!((0.0..=1.0).contains(&probe.accuracy));

        let text = fs::read_to_string(dir.path().join("latent.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "index,z0,z1");
        assert_eq!(lines.len(), 49);
        assert!(lines[48].starts_with("47,"));
    }

    #[test]
    fn test_named_artifact_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(&dir.path().join("data.csv"));
        let cfg = config(dir.path());
        TrainUseCase::new(cfg.clone(), Box::new(LocalStore::new(&cfg.checkpoint_dir)))
            .execute()
            .unwrap();

        let request = AnonymizeRequest {
            checkpoint_dir: cfg.checkpoint_dir,
            input_path:     dir.path().join("data.csv"),
            output_path:    dir.path().join("latent.csv"),
            batch_size:     None,
            store:          StoreChoice { name: Some("other".into()), ..StoreChoice::local() },
            probe_target:   None,
        };
        let err = AnonymizeUseCase::new(request).execute().unwrap_err();
        assert!(format!("{err:#}").contains("autoencoder_other.pth"));
    }
}

// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load the CSV table              (Layer 4 - data)
//   Step 2: Split train/validation/test     (Layer 4 - data)
//   Step 3: Fit scaler + one-hot encoder    (Layer 4 - data)
//   Step 4: Encode the three splits         (Layer 4 - data)
//   Step 5: Resolve the network config      (Layer 5 - ml)
//   Step 6: Save side files                 (Layer 6 - infra)
//   Step 7: Run training loop               (Layer 5 - ml)
//   Step 8: Score the best state on test    (Layer 5 - ml)
//   Step 9: Upload the best weights         (Layer 6 - infra)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::{
    loader::CsvTableLoader,
    preprocessor::TabularPreprocessor,
    splitter::{split_table, SplitRatios},
};
use crate::domain::traits::ObjectStore;
use crate::infra::{
    checkpoint::{artifact_name, save_model, CheckpointManager},
    metrics::{MetricsLogger, PassLosses},
    storage::StoreLocation,
};
use crate::ml::{
    loss::LossWeights,
    model::StackedNetConfig,
    objective::ReconstructionObjective,
    trainer::{evaluate, run_training, TrainingOptions},
    TrainBackend,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything needed to reproduce a run. Saved as train_config.json
// so the clean/anonymize passes know the columns, the loss weights
// and the artifact name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:      String,
    pub checkpoint_dir: String,
    pub continuous:     Vec<String>,
    pub categorical:    Vec<String>,
    /// Widths after the input layer; the input width is prepended
    /// once the preprocessor is fitted.
    pub hidden_layers:  Vec<usize>,
    pub batch_norm:     bool,
    pub dropout_enc:    Vec<(usize, f64)>,
    pub dropout_dec:    Vec<(usize, f64)>,
    pub l1_strength:    f64,
    pub l2_strength:    f64,
    pub wlc:            LossWeights,
    pub batch_size:     usize,
    pub epochs:         usize,
    pub patience:       usize,
    pub lr:             f64,
    pub weight_decay:   f64,
    pub lr_step_size:   usize,
    pub lr_gamma:       f64,
    pub split:          SplitRatios,
    pub seed:           u64,
    pub store:          StoreLocation,
    pub name:           Option<String>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:      "data/adult.csv".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            continuous:     Vec::new(),
            categorical:    Vec::new(),
            hidden_layers:  vec![64, 16],
            batch_norm:     false,
            dropout_enc:    Vec::new(),
            dropout_dec:    Vec::new(),
            l1_strength:    0.0,
            l2_strength:    0.0,
            wlc:            LossWeights::default(),
            batch_size:     64,
            epochs:         100,
            patience:       15,
            lr:             1e-3,
            weight_decay:   0.0,
            lr_step_size:   25,
            lr_gamma:       0.1,
            split:          SplitRatios::default(),
            seed:           42,
            store:          StoreLocation::Local,
            name:           None,
        }
    }
}

impl TrainConfig {
    /// Full layer list once the encoded input width is known.
    pub fn network(&self, input_width: usize) -> StackedNetConfig {
        let mut layers = Vec::with_capacity(self.hidden_layers.len() + 1);
        layers.push(input_width);
        layers.extend(&self.hidden_layers);
        StackedNetConfig::new(layers)
            .with_batch_norm(self.batch_norm)
            .with_dropout_enc(self.dropout_enc.clone())
            .with_dropout_dec(self.dropout_dec.clone())
            .with_l1_strength(self.l1_strength)
            .with_l2_strength(self.l2_strength)
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            epochs:        self.epochs,
            batch_size:    self.batch_size,
            patience:      self.patience,
            learning_rate: self.lr,
            weight_decay:  self.weight_decay,
            lr_step_size:  self.lr_step_size,
            lr_gamma:      self.lr_gamma,
            shuffle_seed:  Some(self.seed),
        }
    }

    /// Name of the weights file this run produces.
    pub fn artifact(&self, network: &StackedNetConfig) -> String {
        artifact_name(&network.layers, self.wlc, self.name.as_deref())
    }
}

/// What a finished run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub artifact:      String,
    pub best_val_loss: f64,
    pub epochs_run:    usize,
    pub stopped_early: bool,
    /// Loss of the best state on the held-out split, when it fills a batch.
    pub test:          Option<PassLosses>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
    store:  Box<dyn ObjectStore>,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig, store: Box<dyn ObjectStore>) -> Self {
        Self { config, store }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;

        // ── Step 1: Load the table ────────────────────────────────────────────
        tracing::info!("Loading '{}'", cfg.data_path);
        let table = CsvTableLoader::new(&cfg.data_path).load()?;
        tracing::info!("Loaded {} rows, {} columns", table.len(), table.columns.len());

        // ── Step 2: Train / validation / test split ───────────────────────────
        let splits = split_table(&table, cfg.split, cfg.seed)?;
        tracing::info!(
            "Split: {} train, {} validation, {} test",
            splits.train.len(), splits.val.len(), splits.test.len(),
        );

        // ── Step 3: Fit preprocessing on the training split only ──────────────
        let pre = TabularPreprocessor::fit(&splits.train, &cfg.continuous, &cfg.categorical)
            .context("Cannot fit preprocessing on the training split")?;
        let schema = pre.schema();

        // ── Step 4: Encode all splits ─────────────────────────────────────────
        let train_ds = pre.transform(&splits.train)?;
        let val_ds   = pre.transform(&splits.val)?;
        let test_ds  = pre.transform(&splits.test)?;

        // ── Step 5: Network ───────────────────────────────────────────────────
        let network = cfg.network(schema.feature_width());
        network.validate()?;
        let artifact = cfg.artifact(&network);
        tracing::info!("Network layers {:?}, artifact '{}'", network.layers, artifact);

        // ── Step 6: Side files for inference ──────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt.save_config(cfg)?;
        ckpt.save_network(&network)?;
        ckpt.save_preprocessor(&pre)?;
        let metrics = MetricsLogger::new(ckpt.dir())?;

        // ── Step 7: Training loop (Layer 5) ───────────────────────────────────
        let device    = Default::default();
        let model     = network.init::<TrainBackend>(&device);
        let objective = ReconstructionObjective::new(schema, cfg.wlc);
        let outcome   = run_training(
            model,
            &objective,
            &train_ds,
            &val_ds,
            &cfg.training_options(),
            &device,
            Some(&metrics),
        )?;

        // ── Step 8: Held-out score of the best state ──────────────────────────
        let test = if test_ds.full_batch_rows(cfg.batch_size) > 0 {
            let losses = evaluate(&outcome.best, &objective, &test_ds, cfg.batch_size, &device)?;
            tracing::info!("Test loss of best state: {:.8}", losses.loss);
            Some(losses)
        } else {
            tracing::warn!("Test split has fewer than {} rows; skipping test score", cfg.batch_size);
            None
        };

        // ── Step 9: Persist the best state ────────────────────────────────────
        save_model(&outcome.best, self.store.as_ref(), &artifact)?;

        Ok(TrainReport {
            artifact,
            best_val_loss: outcome.best_loss,
            epochs_run:    outcome.epochs_run(),
            stopped_early: outcome.stopped_early(),
            test,
        })
    }
}

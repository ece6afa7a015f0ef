// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop with validation, best-state tracking, step-decay
// learning rate and patience-based early stopping.
//
// Per epoch:
//   1. train pass    — Autodiff backend, freshly shuffled loader,
//                      AdamW step per batch
//   2. valid pass    — model.valid() on the inner backend, so
//                      dropout/batch-norm run in eval mode and no
//                      gradients are tracked
//   3. early stop    — snapshot model.valid() when
//                      val_loss < best - 0.001
//   4. lr schedule   — advance one step
//
// The snapshot is a detached copy; interrupting between batches
// never leaves it half-written.

use anyhow::{ensure, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{
    batcher::{ordered_loader, shuffled_loader},
    dataset::TabularDataset,
};
use crate::infra::metrics::{EpochMetrics, LossAccumulator, MetricsLogger, PassLosses};
use crate::ml::early_stopping::{EarlyStopping, TrainingState};
use crate::ml::model::StackedNet;
use crate::ml::objective::{BatchLoss, Objective};
use crate::ml::schedule::StepDecay;

/// Optimisation hyper-parameters of one training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOptions {
    pub epochs:        usize,
    pub batch_size:    usize,
    pub patience:      usize,
    pub learning_rate: f64,
    pub weight_decay:  f64,
    pub lr_step_size:  usize,
    pub lr_gamma:      f64,
    /// Shuffle training batches with this seed; `None` keeps file order.
    pub shuffle_seed:  Option<u64>,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            epochs:        100,
            batch_size:    64,
            patience:      15,
            learning_rate: 1e-3,
            weight_decay:  0.0,
            lr_step_size:  25,
            lr_gamma:      0.1,
            shuffle_seed:  Some(42),
        }
    }
}

/// Result of a finished run.
pub struct TrainingOutcome<B: AutodiffBackend> {
    /// Parameters after the last epoch that ran.
    pub last: StackedNet<B>,
    /// Parameters from the epoch with the lowest validation loss.
    pub best: StackedNet<B::InnerBackend>,
    pub best_loss: f64,
    pub history: Vec<EpochMetrics>,
    /// `Stopped` when patience ran out before the epoch budget.
    pub state: TrainingState,
}

impl<B: AutodiffBackend> TrainingOutcome<B> {
    pub fn epochs_run(&self) -> usize {
        self.history.len()
    }

    pub fn stopped_early(&self) -> bool {
        self.state == TrainingState::Stopped
    }
}

pub fn run_training<B, O>(
    model:     StackedNet<B>,
    objective: &O,
    train:     &TabularDataset,
    val:       &TabularDataset,
    opts:      &TrainingOptions,
    device:    &B::Device,
    metrics:   Option<&MetricsLogger>,
) -> Result<TrainingOutcome<B>>
where
    B: AutodiffBackend,
    O: Objective,
{
    ensure!(opts.batch_size > 0, "batch size must be positive");
    ensure!(
        train.full_batch_rows(opts.batch_size) > 0,
        "training split has {} rows, fewer than one batch of {}", train.features.len(), opts.batch_size
    );
    ensure!(
        val.full_batch_rows(opts.batch_size) > 0,
        "validation split has {} rows, fewer than one batch of {}", val.features.len(), opts.batch_size
    );

    tracing::info!(
        "Training for up to {} epochs: {} train rows, {} val rows, {} parameters",
        opts.epochs, train.features.len(), val.features.len(), model.num_params(),
    );

    // ── AdamW optimiser ───────────────────────────────────────────────────────
    let mut optim = AdamWConfig::new()
        .with_weight_decay(opts.weight_decay as f32)
        .init::<B, StackedNet<B>>();
    let mut schedule = StepDecay::new(opts.learning_rate, opts.lr_step_size, opts.lr_gamma);

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let train      = Arc::new(train.clone());
    let val_loader = ordered_loader::<B::InnerBackend>(Arc::new(val.clone()), opts.batch_size, device);

    let mut model    = model;
    let mut stopper  = EarlyStopping::new(opts.patience);
    let mut best     = None;
    let mut history  = Vec::new();
    let mut state    = TrainingState::Running;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=opts.epochs {
        let lr = schedule.current();

        // ── Training phase ────────────────────────────────────────────────────
        // A fresh permutation per epoch, so the dropped remainder varies too.
        let train_loader = match opts.shuffle_seed {
            Some(seed) => shuffled_loader::<B>(
                Arc::clone(&train), opts.batch_size, seed.wrapping_add(epoch as u64), device,
            ),
            None => ordered_loader::<B>(Arc::clone(&train), opts.batch_size, device),
        };
        let mut train_acc = LossAccumulator::default();
        for batch in train_loader.iter() {
            let rows = batch.rows();
            let loss = objective.evaluate(&model, &batch)?;
            record(&mut train_acc, &loss, rows);

            // Gradients are consumed by this step, so the next batch starts clean.
            let grads = loss.optimized.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);
        }
        let train_avg = train_acc.average();

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut val_acc = LossAccumulator::default();
        for batch in val_loader.iter() {
            let rows = batch.rows();
            let loss = objective.evaluate(&model_valid, &batch)?;
            record(&mut val_acc, &loss, rows);
        }
        let val_avg = val_acc.average();

        // ── Best-state tracking ───────────────────────────────────────────────
        state = stopper.observe(val_avg.loss);
        if state == TrainingState::Improved {
            tracing::debug!("Validation loss improved to {:.8}", val_avg.loss);
            best = Some(model_valid);
        }

        schedule.step();

        let m = EpochMetrics::new(epoch, train_avg, val_avg, lr);
        println!("{}", m.report(opts.epochs));
        if let Some(logger) = metrics {
            logger.log(&m)?;
        }
        history.push(m);

        if stopper.is_exhausted() {
            tracing::info!(
                "Early stopping triggered after epoch {}: no improvement for {} epochs",
                epoch, stopper.stagnant_epochs(),
            );
            state = TrainingState::Stopped;
            break;
        }
    }

    let best = best.unwrap_or_else(|| {
        tracing::warn!("Validation loss never improved; keeping last parameters");
        model.valid()
    });

    tracing::info!(
        "Training complete after {} epochs, best validation loss {:.8}",
        history.len(), stopper.best_loss(),
    );

    Ok(TrainingOutcome {
        last: model,
        best,
        best_loss: stopper.best_loss(),
        history,
        state,
    })
}

fn record<B: Backend>(acc: &mut LossAccumulator, loss: &BatchLoss<B>, rows: usize) {
    acc.add(
        scalar(&loss.weighted),
        scalar(&loss.ce),
        scalar(&loss.mse),
        rows,
    );
}

fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f64 {
    t.clone().into_scalar().elem::<f64>()
}

/// Averaged loss of `model` over `data` in eval mode, without updates.
pub fn evaluate<B, O>(
    model:      &StackedNet<B>,
    objective:  &O,
    data:       &TabularDataset,
    batch_size: usize,
    device:     &B::Device,
) -> Result<PassLosses>
where
    B: Backend,
    O: Objective,
{
    let loader  = ordered_loader::<B>(Arc::new(data.clone()), batch_size, device);
    let mut acc = LossAccumulator::default();
    for batch in loader.iter() {
        let rows = batch.rows();
        let loss = objective.evaluate(model, &batch)?;
        record(&mut acc, &loss, rows);
    }
    Ok(acc.average())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{CategoricalGroup, ColumnSchema};
    use crate::ml::loss::LossWeights;
    use crate::ml::model::{StackedNetConfig, TerminalPolicy};
    use crate::ml::objective::{ClassificationObjective, ReconstructionObjective};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec!["A".into(), "B".into()], vec![CategoricalGroup::new("C", 3)])
    }

    fn rows(n: usize) -> TabularDataset {
        let features = (0..n)
            .map(|i| {
                let mut v = vec![(i % 5) as f32 * 0.2 - 0.4, (i % 3) as f32 * 0.5 - 0.5];
                v.extend((0..3).map(|c| if c == i % 3 { 1.0 } else { 0.0 }));
                v
            })
            .collect();
        TabularDataset::new(features, (0..n).collect()).unwrap()
    }

    fn opts(epochs: usize, patience: usize, lr: f64) -> TrainingOptions {
        TrainingOptions {
            epochs,
            batch_size: 4,
            patience,
            learning_rate: lr,
            shuffle_seed: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_frozen_model_stops_exactly_after_patience() {
        // lr = 0 keeps the validation loss constant: epoch 1 improves on
        // +inf, then every epoch is stagnant.
        let device = Default::default();
        let net = StackedNetConfig::new(vec![5, 3]).init::<TestBackend>(&device);
        let objective = ReconstructionObjective::new(schema(), LossWeights::default());

        let outcome = run_training(net, &objective, &rows(16), &rows(8), &opts(10, 2, 0.0), &device, None)
            .unwrap();

        assert_eq!(outcome.epochs_run(), 3);
        assert!(outcome.stopped_early());
        assert!((outcome.best_loss - outcome.history[0].val.loss).abs() < 1e-12);
    }

    #[test]
    fn test_epoch_budget_bounds_run() {
        let device = Default::default();
        let net = StackedNetConfig::new(vec![5, 4, 3]).init::<TestBackend>(&device);
        let objective = ReconstructionObjective::new(schema(), LossWeights::default());

        let outcome = run_training(net, &objective, &rows(16), &rows(8), &opts(3, 10, 1e-2), &device, None)
            .unwrap();

        assert_eq!(outcome.epochs_run(), 3);
        assert!(!outcome.stopped_early());
        assert!(outcome.best_loss.is_finite());
    }

    #[test]
    fn test_training_reduces_loss() {
        let device = Default::default();
        let net = StackedNetConfig::new(vec![5, 8, 4]).init::<TestBackend>(&device);
        let objective = ReconstructionObjective::new(schema(), LossWeights::default());

        let outcome = run_training(net, &objective, &rows(32), &rows(16), &opts(40, 40, 1e-2), &device, None)
            .unwrap();

        let first = outcome.history.first().unwrap().val.loss;
        assert!(outcome.best_loss < first);
    }

    #[test]
    fn test_best_snapshot_matches_best_loss() {
        let device = Default::default();
        let net = StackedNetConfig::new(vec![5, 4]).init::<TestBackend>(&device);
        let objective = ReconstructionObjective::new(schema(), LossWeights::default());

        let outcome = run_training(net, &objective, &rows(16), &rows(8), &opts(5, 5, 1e-2), &device, None)
            .unwrap();

        let again = evaluate(&outcome.best, &objective, &rows(8), 4, &device).unwrap();
        assert!((again.loss - outcome.best_loss).abs() < 1e-4);
    }

    #[test]
    fn test_weighted_loss_differs_from_component_sum() {
        let device = Default::default();
        let net = StackedNetConfig::new(vec![5, 3]).init::<TestBackend>(&device);
        let objective = ReconstructionObjective::new(schema(), LossWeights::new(3.0, 0.5));

        let outcome = run_training(net, &objective, &rows(8), &rows(8), &opts(1, 1, 0.0), &device, None)
            .unwrap();
        let m = &outcome.history[0].train;
        assert!((m.loss - (3.0 * m.ce + 0.5 * m.mse)).abs() < 1e-4);
        assert!((m.loss - m.comp).abs() > 1e-3);
    }

    #[test]
    fn test_activation_penalty_not_in_monitored_loss() {
        let device = Default::default();
        let net = StackedNetConfig::new(vec![5, 4, 3])
            .with_l1_strength(1.0)
            .with_l2_strength(1.0)
            .init::<TestBackend>(&device);
        let objective = ReconstructionObjective::new(schema(), LossWeights::new(2.0, 0.5));

        let outcome = run_training(net, &objective, &rows(16), &rows(8), &opts(2, 5, 1e-2), &device, None)
            .unwrap();
        for m in &outcome.history {
            assert!((m.val.loss - (2.0 * m.val.ce + 0.5 * m.val.mse)).abs() < 1e-4);
            assert!((m.train.loss - (2.0 * m.train.ce + 0.5 * m.train.mse)).abs() < 1e-4);
        }
        assert!(outcome.history.iter().any(|m| (m.val.loss - outcome.best_loss).abs() < 1e-12));
    }

    #[test]
    fn test_classifier_trains_on_targets() {
        let device = Default::default();
        let net = StackedNetConfig::new(vec![5, 4])
            .with_head(TerminalPolicy::Classification { classes: 3 })
            .init::<TestBackend>(&device);
        let targets: Vec<usize> = (0..16).map(|i| i % 3).collect();
        let train = rows(16).with_targets(targets.clone()).unwrap();
        let val   = rows(16).with_targets(targets).unwrap();

        let outcome = run_training(net, &ClassificationObjective, &train, &val, &opts(2, 5, 1e-2), &device, None)
            .unwrap();
        assert_eq!(outcome.history[0].train.mse, 0.0);
    }

    #[test]
    fn test_too_few_rows_rejected() {
        let device = Default::default();
        let net = StackedNetConfig::new(vec![5, 3]).init::<TestBackend>(&device);
        let objective = ReconstructionObjective::new(schema(), LossWeights::default());
        assert!(run_training(net, &objective, &rows(16), &rows(3), &opts(1, 1, 1e-3), &device, None).is_err());
    }
}

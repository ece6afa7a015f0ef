// ============================================================
// Layer 5 — Training Objectives
// ============================================================
// An objective turns one batch into the scalar that gets
// back-propagated plus the component terms that get reported.
// The same objective runs on the autodiff backend (training)
// and on the inner backend (validation), so it is generic over
// the backend at the method level.

use anyhow::{anyhow, Result};
use burn::{nn::loss::CrossEntropyLossConfig, prelude::*};

use crate::data::batcher::TabularBatch;
use crate::domain::schema::ColumnSchema;
use crate::ml::loss::{compute_loss, LossWeights};
use crate::ml::model::{NetOutput, StackedNet};

/// Loss terms of one batch, each of shape [1].
pub struct BatchLoss<B: Backend> {
    /// What the optimizer minimises: `weighted` plus the activation penalty.
    pub optimized: Tensor<B, 1>,
    /// Weighted data terms only; reported and used for early stopping.
    pub weighted:  Tensor<B, 1>,
    pub ce:        Tensor<B, 1>,
    pub mse:       Tensor<B, 1>,
}

pub trait Objective {
    fn evaluate<B: Backend>(&self, model: &StackedNet<B>, batch: &TabularBatch<B>) -> Result<BatchLoss<B>>;
}

/// Reconstruct the input: `wlc.ce * CE + wlc.mse * MSE + penalty`.
#[derive(Debug, Clone)]
pub struct ReconstructionObjective {
    pub schema:  ColumnSchema,
    pub weights: LossWeights,
}

impl ReconstructionObjective {
    pub fn new(schema: ColumnSchema, weights: LossWeights) -> Self {
        Self { schema, weights }
    }
}

impl Objective for ReconstructionObjective {
    fn evaluate<B: Backend>(&self, model: &StackedNet<B>, batch: &TabularBatch<B>) -> Result<BatchLoss<B>> {
        let NetOutput { output, penalty } = model.forward(batch.features.clone());
        let (ce, mse) = compute_loss(batch.features.clone(), output, &self.schema);
        let weighted = self.weights.combine(ce.clone(), mse.clone());
        Ok(BatchLoss { optimized: weighted.clone() + penalty, weighted, ce, mse })
    }
}

/// Predict the batch targets: `CE(logits, targets) + penalty`; MSE is zero.
#[derive(Debug, Clone, Default)]
pub struct ClassificationObjective;

impl Objective for ClassificationObjective {
    fn evaluate<B: Backend>(&self, model: &StackedNet<B>, batch: &TabularBatch<B>) -> Result<BatchLoss<B>> {
        let targets = batch
            .targets
            .clone()
            .ok_or_else(|| anyhow!("classification batch has no targets"))?;
        let NetOutput { output, penalty } = model.forward(batch.features.clone());
        let device = output.device();
        let ce = CrossEntropyLossConfig::new().init(&device).forward(output, targets);
        Ok(BatchLoss {
            optimized: ce.clone() + penalty,
            weighted:  ce.clone(),
            ce,
            mse: Tensor::zeros([1], &device),
        })
    }
}

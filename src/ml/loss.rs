// ============================================================
// Layer 5 — Composite Loss
// ============================================================
// Splits a reconstructed feature block along the column schema:
//
//   [0, n_con)               → MSE against the input, mean over
//                              every element of the slice
//   one slice per cat group  → cross-entropy of the raw scores
//                              against argmax(input group),
//                              mean over the batch
//
// Per-group cross-entropies are SUMMED across categorical columns,
// so a table with k categorical columns contributes k CE terms.
// An empty column group yields an exact zero tensor of shape [1].

use burn::{
    nn::loss::{CrossEntropyLossConfig, MseLoss, Reduction},
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::domain::schema::ColumnSchema;

/// Weighted-loss coefficients: `(ce_weight, mse_weight)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossWeights {
    pub ce:  f64,
    pub mse: f64,
}

impl LossWeights {
    pub fn new(ce: f64, mse: f64) -> Self {
        Self { ce, mse }
    }

    /// `ce_weight * ce + mse_weight * mse`
    pub fn combine<B: Backend>(&self, ce: Tensor<B, 1>, mse: Tensor<B, 1>) -> Tensor<B, 1> {
        ce.mul_scalar(self.ce) + mse.mul_scalar(self.mse)
    }
}

impl Default for LossWeights {
    fn default() -> Self {
        Self { ce: 1.0, mse: 1.0 }
    }
}

impl std::fmt::Display for LossWeights {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.ce, self.mse)
    }
}

/// Returns `(ce_loss, mse_loss)`, each of shape [1].
///
/// `input` and `output` must both be `[batch, schema.feature_width()]`;
/// a narrower tensor panics at the first slice.
pub fn compute_loss<B: Backend>(
    input:  Tensor<B, 2>,
    output: Tensor<B, 2>,
    schema: &ColumnSchema,
) -> (Tensor<B, 1>, Tensor<B, 1>) {
    let device      = output.device();
    let [batch, _]  = output.dims();
    let n_con       = schema.continuous_count();

    let mse = if n_con == 0 {
        Tensor::zeros([1], &device)
    } else {
        MseLoss::new().forward(
            output.clone().slice([0..batch, 0..n_con]),
            input.clone().slice([0..batch, 0..n_con]),
            Reduction::Mean,
        )
    };

    let ranges = schema.group_ranges();
    let ce = if ranges.is_empty() {
        Tensor::zeros([1], &device)
    } else {
        let ce_loss = CrossEntropyLossConfig::new().init(&device);
        ranges.into_iter().fold(Tensor::zeros([1], &device), |acc, range| {
            let logits  = output.clone().slice([0..batch, range.clone()]);
            let targets = input.clone().slice([0..batch, range]).argmax(1).reshape([batch]);
            acc + ce_loss.forward(logits, targets)
        })
    };

    (ce, mse)
}

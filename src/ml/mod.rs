// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All tensor code lives here. The data layer only builds
// batches; the application layer only calls into this layer.
//
//   model.rs          — stacked linear blocks with a terminal
//                       policy (reconstruction or classification)
//                       • optional batch norm on encoder blocks
//                       • per-layer dropout
//                       • L1/L2 activation penalty returned with
//                         the output
//
//   loss.rs           — CE over each categorical group + MSE
//                       over the continuous block, wlc weighting
//
//   decode.rs         — arg-max reassembly of categorical groups
//
//   objective.rs      — what one training batch optimises
//
//   early_stopping.rs — patience controller (0.001 margin)
//   schedule.rs       — step-decay learning rate
//
//   trainer.rs        — epoch loop: AdamW, validation, best
//                       snapshot, early stop
//
//   inferencer.rs     — clean / anonymize / classify passes
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

use burn::backend::Autodiff;

/// Backend for eval-mode passes (validation, clean, anonymize).
#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray<f32>;
#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

/// Backend for training: the inference backend plus autodiff.
pub type TrainBackend = Autodiff<InferBackend>;

/// Stacked linear network and its config
pub mod model;

/// Composite CE + MSE loss
pub mod loss;

/// Arg-max decoding of network output
pub mod decode;

/// Training objectives (reconstruction / classification)
pub mod objective;

/// Patience-based early stopping
pub mod early_stopping;

/// Step-decay learning-rate schedule
pub mod schedule;

/// Full training loop with validation and early stopping
pub mod trainer;

/// Inference engine — clean, anonymize, classify
pub mod inferencer;

// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal: train, clean or anonymize.
//
// Rules for this layer:
//   - No tensor code here (that's Layer 5)
//   - No argument parsing here (that's Layer 1)
//   - No direct file formats or HTTP (that's Layer 4 and 6)
//   - Only workflow coordination

// The training workflow
pub mod train_use_case;

// Restoring a finished run for inference
pub mod session;

// Reconstruct dirty records into a cleaned table
pub mod clean_use_case;

// Encode records into latent vectors
pub mod anonymize_use_case;

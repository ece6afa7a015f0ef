// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing tabular records and
// the collaborators around the network.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O or network calls
//   - Only plain structs, enums, and traits

/// Continuous / categorical layout of a feature vector
pub mod schema;

/// Text tables and latent tables with stable row indices
pub mod table;

/// Collaborator traits: scaler, encoder, object store
pub mod traits;

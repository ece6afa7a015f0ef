// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a raw CSV file to tensor batches:
//
//   CSV file
//       │
//       ▼
//   CsvTableLoader      → Table (text cells + source row index)
//       │
//       ▼
//   split_table         → train / val / test tables
//       │
//       ▼
//   TabularPreprocessor → fitted scaler + one-hot encoder
//       │
//       ▼
//   TabularDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   TabularBatcher      → Burn Batcher, fed by a DataLoader

/// Reads and writes CSV tables
pub mod loader;

/// Seeded train/validation/test split
pub mod splitter;

/// StandardScaler + OneHotEncoder and the feature layout
pub mod preprocessor;

/// Implements Burn's Dataset trait for encoded rows
pub mod dataset;

/// Burn Batcher for encoded rows and the DataLoaders built on it
pub mod batcher;

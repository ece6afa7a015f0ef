// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Shuffles rows with a seeded RNG and splits them into three
// tables. Source row indices travel with the rows, so every
// split can be traced back to the original file.
//
// Split ratio: 70% training, 15% validation, 15% test (configurable)

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::table::Table;

/// Fractions of the rows assigned to each split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitRatios {
    pub train: f64,
    pub val:   f64,
    pub test:  f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self { train: 0.7, val: 0.15, test: 0.15 }
    }
}

/// The three splits of one table.
#[derive(Debug, Clone)]
pub struct Splits {
    pub train: Table,
    pub val:   Table,
    pub test:  Table,
}

/// Shuffle `table` with `seed` and split it into (train, val, test).
///
/// The test split receives whatever remains after rounding the
/// train and validation sizes, so no row is ever lost.
pub fn split_table(table: &Table, ratios: SplitRatios, seed: u64) -> Result<Splits> {
    let sum = ratios.train + ratios.val + ratios.test;
    ensure!(
        (sum - 1.0).abs() < 1e-6,
        "split ratios must sum to 1.0, got {sum}"
    );
    ensure!(
        ratios.train >= 0.0 && ratios.val >= 0.0 && ratios.test >= 0.0,
        "split ratios must be non-negative"
    );

    let mut positions: Vec<usize> = (0..table.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    positions.shuffle(&mut rng);

    let total     = positions.len();
    let train_end = ((total as f64) * ratios.train).round() as usize;
    let train_end = train_end.min(total);
    let val_end   = (train_end + ((total as f64) * ratios.val).round() as usize).min(total);

    tracing::debug!(
        "Dataset split: {} training, {} validation, {} test",
        train_end,
        val_end - train_end,
        total - val_end,
    );

    Ok(Splits {
        train: table.take_rows(&positions[..train_end]),
        val:   table.take_rows(&positions[train_end..val_end]),
        test:  table.take_rows(&positions[val_end..]),
    })
}

// ============================================================
// Layer 3 — Column Schema
// ============================================================
// Describes how a flat feature vector is laid out:
//
//   [ c_0 .. c_{n-1} | g_0 (w_0 wide) | g_1 (w_1 wide) | ... ]
//     continuous         one one-hot group per categorical column
//
// Invariant: feature_width() == continuous_count() + Σ w_i, and this
// equals the network's input/output width.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// One categorical column and the width of its one-hot group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoricalGroup {
    pub name:  String,
    pub width: usize,
}

impl CategoricalGroup {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self { name: name.into(), width }
    }
}

/// Ordered continuous and categorical column layout of a feature vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub continuous:  Vec<String>,
    pub categorical: Vec<CategoricalGroup>,
}

impl ColumnSchema {
    pub fn new(continuous: Vec<String>, categorical: Vec<CategoricalGroup>) -> Self {
        Self { continuous, categorical }
    }

    pub fn continuous_count(&self) -> usize {
        self.continuous.len()
    }

    pub fn group_widths(&self) -> Vec<usize> {
        self.categorical.iter().map(|g| g.width).collect()
    }

    pub fn categorical_width(&self) -> usize {
        self.categorical.iter().map(|g| g.width).sum()
    }

    /// Total tensor width = continuous columns + all one-hot groups.
    pub fn feature_width(&self) -> usize {
        self.continuous_count() + self.categorical_width()
    }

    pub fn categorical_names(&self) -> Vec<String> {
        self.categorical.iter().map(|g| g.name.clone()).collect()
    }

    /// Column range of every categorical group inside the full feature vector.
    pub fn group_ranges(&self) -> Vec<Range<usize>> {
        let mut offset = self.continuous_count();
        self.categorical
            .iter()
            .map(|g| {
                let range = offset..offset + g.width;
                offset += g.width;
                range
            })
            .collect()
    }
}

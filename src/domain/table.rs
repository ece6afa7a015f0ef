// ============================================================
// Layer 3 — Tables
// ============================================================
// Plain row-major containers passed between the data layer and
// the inference pipelines. Every table carries the source row
// index of each row so truncation to full batches stays traceable.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// A text table with named columns and a stable row index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub index:   Vec<usize>,
    pub rows:    Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, index: Vec<usize>, rows: Vec<Vec<String>>) -> Result<Self> {
        if index.len() != rows.len() {
            bail!("index has {} entries but table has {} rows", index.len(), rows.len());
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            bail!(
                "row {} has {} cells, expected {}",
                bad, rows[bad].len(), columns.len()
            );
        }
        Ok(Self { columns, index, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let Some(pos) = self.column_position(name) else {
            bail!("column '{name}' not found");
        };
        Ok(self.rows.iter().map(|r| r[pos].as_str()).collect())
    }

    /// Keep only the rows at the given positions (not source indices), in that order.
    pub fn take_rows(&self, positions: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            index:   positions.iter().map(|&p| self.index[p]).collect(),
            rows:    positions.iter().map(|&p| self.rows[p].clone()).collect(),
        }
    }
}

/// Dense numeric rows, e.g. the encoder's latent vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentTable {
    pub index: Vec<usize>,
    pub rows:  Vec<Vec<f32>>,
}

impl LatentTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }
}

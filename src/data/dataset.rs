use anyhow::{ensure, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One encoded record: its feature vector, source row index,
/// and optional class target (classification head only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularRow {
    pub features: Vec<f32>,
    pub index:    usize,
    pub target:   Option<usize>,
}

/// Encoded records held in memory, in source order.
#[derive(Debug, Clone)]
pub struct TabularDataset {
    pub features: Vec<Vec<f32>>,
    pub index:    Vec<usize>,
    pub targets:  Option<Vec<usize>>,
}

impl TabularDataset {
    pub fn new(features: Vec<Vec<f32>>, index: Vec<usize>) -> Result<Self> {
        ensure!(
            features.len() == index.len(),
            "{} feature rows but {} index entries", features.len(), index.len()
        );
        if let Some(first) = features.first() {
            ensure!(
                features.iter().all(|r| r.len() == first.len()),
                "feature rows have differing widths"
            );
        }
        Ok(Self { features, index, targets: None })
    }

    pub fn with_targets(mut self, targets: Vec<usize>) -> Result<Self> {
        ensure!(
            targets.len() == self.features.len(),
            "{} targets for {} rows", targets.len(), self.features.len()
        );
        self.targets = Some(targets);
        Ok(self)
    }

    pub fn width(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Rows that survive batching when partial batches are dropped.
    pub fn full_batch_rows(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            return 0;
        }
        (self.features.len() / batch_size) * batch_size
    }
}

impl Dataset<TabularRow> for TabularDataset {
    fn get(&self, index: usize) -> Option<TabularRow> {
        let features = self.features.get(index)?.clone();
        Some(TabularRow {
            features,
            index:  self.index[index],
            target: self.targets.as_ref().map(|t| t[index]),
        })
    }

    fn len(&self) -> usize {
        self.features.len()
    }
}

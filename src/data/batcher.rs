// ============================================================
// Layer 4 — Tabular Batcher
// ============================================================
// Implements Burn's Batcher trait to stack encoded rows into
// tensor batches, plus the DataLoader builders every pass uses.
//
//   Input:  N TabularRows, each with W features
//   Output: TabularBatch with features [N, W] and the N source
//           row indices in batch order
//
// Trailing partial batches are always dropped: the dataset is
// cut to (rows / batch_size) * batch_size with PartialDataset
// before it reaches the loader. For training the cut happens
// after a seeded ShuffledDataset, so each epoch drops a
// different remainder.

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::transform::{PartialDataset, ShuffledDataset},
    },
    prelude::*,
};
use std::sync::Arc;

use crate::data::dataset::{TabularDataset, TabularRow};

/// Loader yielding full batches only.
pub type TabularLoader<B> = Arc<dyn DataLoader<TabularBatch<B>>>;

// ─── TabularBatch ─────────────────────────────────────────────────────────────
/// A batch of records ready for the forward pass.
#[derive(Debug, Clone)]
pub struct TabularBatch<B: Backend> {
    /// Feature block — shape: [batch_size, feature_width]
    pub features: Tensor<B, 2>,

    /// Source row index of each batch row
    pub indices: Vec<usize>,

    /// Class targets — shape: [batch_size]; only for classification
    pub targets: Option<Tensor<B, 1, Int>>,
}

impl<B: Backend> TabularBatch<B> {
    pub fn rows(&self) -> usize {
        self.indices.len()
    }
}

// ─── TabularBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct TabularBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> TabularBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

// The DataLoader calls .batch(items) with each mini-batch of rows.
impl<B: Backend> Batcher<TabularRow, TabularBatch<B>> for TabularBatcher<B> {
    fn batch(&self, items: Vec<TabularRow>) -> TabularBatch<B> {
        let batch_size = items.len();
        let width      = items.first().map_or(0, |r| r.features.len());

        let flat: Vec<f32> = items
            .iter()
            .flat_map(|r| r.features.iter().copied())
            .collect();
        let features = Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
            .reshape([batch_size, width]);

        let indices = items.iter().map(|r| r.index).collect();

        let targets = if items.iter().all(|r| r.target.is_some()) && batch_size > 0 {
            let t: Vec<i32> = items.iter().filter_map(|r| r.target).map(|t| t as i32).collect();
            Some(Tensor::<B, 1, Int>::from_ints(t.as_slice(), &self.device))
        } else {
            None
        };

        TabularBatch { features, indices, targets }
    }
}

// ─── Loaders ──────────────────────────────────────────────────────────────────

/// Full batches of `dataset` in stored order.
pub fn ordered_loader<B: Backend>(
    dataset:    Arc<TabularDataset>,
    batch_size: usize,
    device:     &B::Device,
) -> TabularLoader<B> {
    let kept = dataset.full_batch_rows(batch_size);
    DataLoaderBuilder::new(TabularBatcher::<B>::new(device.clone()))
        .batch_size(batch_size.max(1))
        .build(PartialDataset::<_, TabularRow>::new(dataset, 0, kept))
}

/// Full batches of a `seed`-determined permutation of `dataset`.
pub fn shuffled_loader<B: Backend>(
    dataset:    Arc<TabularDataset>,
    batch_size: usize,
    seed:       u64,
    device:     &B::Device,
) -> TabularLoader<B> {
    let kept     = dataset.full_batch_rows(batch_size);
    let shuffled = ShuffledDataset::<_, TabularRow>::with_seed(dataset, seed);
    DataLoaderBuilder::new(TabularBatcher::<B>::new(device.clone()))
        .batch_size(batch_size.max(1))
        .build(PartialDataset::<_, TabularRow>::new(shuffled, 0, kept))
}

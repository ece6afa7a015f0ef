// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Eval-mode passes over a trained network. Nothing here tracks
// gradients: the model lives on a plain (non-autodiff) backend.
//
//   clean      — forward → arg-max reassembly → inverse transforms
//                → rounded, original-column-order table
//   anonymize  — encoder only → latent rows in input order
//   classify   — classification head → predicted class per row
//
// Every pass drops the trailing partial batch, so outputs cover
// exactly (rows / batch_size) * batch_size rows, indexed by the
// source indices of the rows that were kept.

use anyhow::{ensure, Result};
use burn::prelude::*;
use std::sync::Arc;

use crate::data::{
    batcher::{ordered_loader, TabularLoader},
    dataset::TabularDataset,
};
use crate::domain::{
    schema::ColumnSchema,
    table::{LatentTable, Table},
    traits::{CategoryEncoder, Scaler},
};
use crate::ml::decode::{argmax_groups, decode_batch, tensor_rows};
use crate::ml::model::StackedNet;

/// Running diagnostics of a clean pass against ground truth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CleanMetrics {
    /// Mean over batches of the per-batch mean absolute error.
    pub mae:     f64,
    /// Mean over batches of the per-batch mean squared error.
    pub mse:     f64,
    pub batches: usize,
}

#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub table:   Table,
    /// Present only when ground truth was supplied.
    pub metrics: Option<CleanMetrics>,
}

/// Fitted collaborators needed to turn decoded rows back into text.
pub struct Decoders<'a> {
    pub scaler:  &'a dyn Scaler,
    pub encoder: &'a dyn CategoryEncoder,
}

pub struct Inferencer<B: Backend> {
    model:      StackedNet<B>,
    device:     B::Device,
    batch_size: usize,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: StackedNet<B>, device: B::Device, batch_size: usize) -> Self {
        Self { model, device, batch_size: batch_size.max(1) }
    }

    pub fn model(&self) -> &StackedNet<B> {
        &self.model
    }

    fn loader(&self, data: &TabularDataset) -> TabularLoader<B> {
        ordered_loader::<B>(Arc::new(data.clone()), self.batch_size, &self.device)
    }

    // ── Clean ─────────────────────────────────────────────────────────────────

    /// Reconstruct `dirty` and decode it to a text table whose columns
    /// follow `columns` (the source table's order).
    ///
    /// With `truth`, per-batch MAE/MSE between decoded output and the
    /// encoded ground truth are averaged and reported; the returned
    /// table is the same either way.
    pub fn clean(
        &self,
        dirty:    &TabularDataset,
        truth:    Option<&TabularDataset>,
        schema:   &ColumnSchema,
        decoders: Decoders<'_>,
        columns:  &[String],
    ) -> Result<CleanOutcome> {
        if let Some(t) = truth {
            ensure!(
                t.features.len() == dirty.features.len(),
                "ground truth has {} rows, dirty data has {}", t.features.len(), dirty.features.len()
            );
        }

        let mut decoded: Vec<Vec<f32>> = Vec::with_capacity(dirty.full_batch_rows(self.batch_size));
        let mut index:   Vec<usize>    = Vec::with_capacity(decoded.capacity());
        let (mut mae_sum, mut mse_sum, mut batches) = (0.0, 0.0, 0);

        // Both loaders walk rows in stored order, so batch b of the
        // truth lines up with batch b of the dirty data.
        let dirty_loader = self.loader(dirty);
        let truth_loader = truth.map(|t| self.loader(t));
        let mut truth_iter = truth_loader.as_ref().map(|l| l.iter());

        for batch in dirty_loader.iter() {
            let output = self.model.forward(batch.features).output;
            let rows   = decode_batch(output, schema)?;

            if let Some(truth_batch) = truth_iter.as_mut().and_then(|it| it.next()) {
                let expected   = tensor_rows(truth_batch.features)?;
                let (mae, mse) = batch_errors(&rows, expected.iter());
                mae_sum += mae;
                mse_sum += mse;
                batches += 1;
            }

            decoded.extend(rows);
            index.extend(batch.indices);
        }

        let metrics = truth.map(|_| {
            let n = batches.max(1) as f64;
            let m = CleanMetrics { mae: mae_sum / n, mse: mse_sum / n, batches };
            tracing::info!("Clean diagnostics over {} batches: MAE {:.8}, MSE {:.8}", batches, m.mae, m.mse);
            m
        });

        let table = reassemble(&decoded, index, schema, &decoders, columns)?;
        tracing::info!("Cleaned {} rows", table.len());
        Ok(CleanOutcome { table, metrics })
    }

    // ── Anonymize ─────────────────────────────────────────────────────────────

    /// Latent representation of every row that fills a full batch.
    pub fn anonymize(&self, data: &TabularDataset) -> Result<LatentTable> {
        let mut rows  = Vec::with_capacity(data.full_batch_rows(self.batch_size));
        let mut index = Vec::with_capacity(rows.capacity());
        for batch in self.loader(data).iter() {
            let latent = self.model.encode(batch.features).output;
            rows.extend(tensor_rows(latent)?);
            index.extend(batch.indices);
        }
        tracing::info!("Anonymized {} of {} rows", rows.len(), data.features.len());
        Ok(LatentTable { index, rows })
    }

    // ── Classify ──────────────────────────────────────────────────────────────

    /// Arg-max class of every row that fills a full batch.
    pub fn classify(&self, data: &TabularDataset) -> Result<Vec<usize>> {
        let mut predictions = Vec::with_capacity(data.full_batch_rows(self.batch_size));
        for batch in self.loader(data).iter() {
            let logits = self.model.forward(batch.features).output;
            for row in tensor_rows(logits)? {
                predictions.push(argmax_groups(&row, &[row.len()])[0]);
            }
        }
        Ok(predictions)
    }
}

/// Share of positions where `predictions` and `targets` agree.
/// Compares the common prefix; NaN when it is empty.
pub fn accuracy(predictions: &[usize], targets: &[usize]) -> f64 {
    let n = predictions.len().min(targets.len());
    let hits = predictions.iter().zip(targets).filter(|(p, t)| p == t).count();
    hits as f64 / n as f64
}

fn batch_errors<'a>(decoded: &[Vec<f32>], truth: impl Iterator<Item = &'a Vec<f32>>) -> (f64, f64) {
    let (mut abs, mut sq, mut n) = (0.0f64, 0.0f64, 0usize);
    for (d, t) in decoded.iter().zip(truth) {
        for (&a, &b) in d.iter().zip(t) {
            let diff = (a - b) as f64;
            abs += diff.abs();
            sq  += diff * diff;
            n   += 1;
        }
    }
    let n = n.max(1) as f64;
    (abs / n, sq / n)
}

/// Inverse-transform decoded rows and lay them out in `columns` order.
/// Columns outside the schema come back empty.
fn reassemble(
    decoded:  &[Vec<f32>],
    index:    Vec<usize>,
    schema:   &ColumnSchema,
    decoders: &Decoders<'_>,
    columns:  &[String],
) -> Result<Table> {
    let n_con = schema.continuous_count();

    let continuous = if n_con > 0 {
        let block: Vec<Vec<f32>> = decoded.iter().map(|r| r[..n_con].to_vec()).collect();
        decoders.scaler.inverse_transform(&block)?
    } else {
        vec![Vec::new(); decoded.len()]
    };
    let labels = if schema.categorical.is_empty() {
        vec![Vec::new(); decoded.len()]
    } else {
        let block: Vec<Vec<f32>> = decoded.iter().map(|r| r[n_con..].to_vec()).collect();
        decoders.encoder.inverse_transform(&block)?
    };

    let categorical = schema.categorical_names();
    let rows = continuous
        .iter()
        .zip(&labels)
        .map(|(con, cat)| {
            columns
                .iter()
                .map(|col| {
                    if let Some(c) = schema.continuous.iter().position(|n| n == col) {
                        round_cell(con[c])
                    } else if let Some(c) = categorical.iter().position(|n| n == col) {
                        cat[c].clone()
                    } else {
                        String::new()
                    }
                })
                .collect()
        })
        .collect();

    Table::new(columns.to_vec(), index, rows)
}

/// Nearest integer, without a negative zero.
fn round_cell(value: f64) -> String {
    let r = value.round();
    if r == 0.0 {
        "0".to_string()
    } else {
        format!("{r:.0}")
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::preprocessor::TabularPreprocessor;
    use crate::domain::schema::CategoricalGroup;
    use crate::ml::model::{StackedNetConfig, TerminalPolicy};
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec!["A".into(), "B".into()], vec![CategoricalGroup::new("C", 3)])
    }

    fn dataset(n: usize) -> TabularDataset {
        let features = (0..n)
            .map(|i| {
                let mut v = vec![i as f32 * 0.1, -(i as f32) * 0.2];
                v.extend((0..3).map(|c| if c == i % 3 { 1.0 } else { 0.0 }));
                v
            })
            .collect();
        TabularDataset::new(features, (10..10 + n).collect()).unwrap()
    }

    fn inferencer(layers: Vec<usize>, batch_size: usize) -> Inferencer<TestBackend> {
        let device = Default::default();
        let model  = StackedNetConfig::new(layers).init::<TestBackend>(&device);
        Inferencer::new(model, device, batch_size)
    }

    fn source_table() -> Table {
        Table::new(
            vec!["B".into(), "id".into(), "C".into(), "A".into()],
            vec![0, 1, 2, 3, 4],
            vec![
                vec!["10".into(), "a".into(), "x".into(), "1".into()],
                vec!["20".into(), "b".into(), "y".into(), "2".into()],
                vec!["30".into(), "c".into(), "z".into(), "3".into()],
                vec!["40".into(), "d".into(), "x".into(), "4".into()],
                vec!["50".into(), "e".into(), "y".into(), "5".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_anonymize_keeps_order_and_width() {
        let latent = inferencer(vec![5, 3], 2).anonymize(&dataset(4)).unwrap();
        assert_eq!(latent.len(), 4);
        assert_eq!(latent.width(), 3);
        assert_eq!(latent.index, vec![10, 11, 12, 13]);
    }

    #[test]
    fn test_anonymize_truncates_to_full_batches() {
        let latent = inferencer(vec![5, 4, 2], 4).anonymize(&dataset(10)).unwrap();
        assert_eq!(latent.len(), 8);
        assert_eq!(latent.index, (10..18).collect::<Vec<_>>());
    }

    #[test]
    fn test_anonymize_matches_encoder_rows() {
        let inf = inferencer(vec![5, 3], 2);
        let ds  = dataset(2);
        let latent = inf.anonymize(&ds).unwrap();

        let flat: Vec<f32> = ds.features.concat();
        let x = Tensor::<TestBackend, 1>::from_floats(flat.as_slice(), &Default::default()).reshape([2, 5]);
        let direct = tensor_rows(inf.model().encode(x).output).unwrap();
        assert_eq!(latent.rows, direct);
    }

    #[test]
    fn test_clean_outputs_known_labels_in_column_order() {
        let source = source_table();
        let pre = TabularPreprocessor::fit(&source, &["A".into(), "B".into()], &["C".into()]).unwrap();
        let ds  = pre.transform(&source).unwrap();
        let inf = inferencer(vec![5, 4, 3], 2);

        let decoders = Decoders { scaler: &pre.scaler, encoder: &pre.encoder };
        let outcome = inf.clean(&ds, None, &pre.schema(), decoders, &source.columns).unwrap();

        assert!(outcome.metrics.is_none());
        assert_eq!(outcome.table.columns, source.columns);
        assert_eq!(outcome.table.index, vec![0, 1, 2, 3]);
        for row in &outcome.table.rows {
            assert!(["x", "y", "z"].contains(&row[2].as_str()));
            assert_eq!(row[1], "");
            assert!(row[0].parse::<i64>().is_ok());
            assert!(row[3].parse::<i64>().is_ok());
        }
    }

    #[test]
    fn test_clean_with_truth_reports_metrics_without_changing_table() {
        let source = source_table();
        let pre = TabularPreprocessor::fit(&source, &["A".into(), "B".into()], &["C".into()]).unwrap();
        let ds  = pre.transform(&source).unwrap();
        let inf = inferencer(vec![5, 3], 2);
        let schema = pre.schema();

        let plain = inf
            .clean(&ds, None, &schema, Decoders { scaler: &pre.scaler, encoder: &pre.encoder }, &source.columns)
            .unwrap();
        let diag = inf
            .clean(&ds, Some(&ds), &schema, Decoders { scaler: &pre.scaler, encoder: &pre.encoder }, &source.columns)
            .unwrap();

        assert_eq!(plain.table, diag.table);
        let m = diag.metrics.unwrap();
        assert_eq!(m.batches, 2);
        assert!(m.mae >= 0.0 && m.mse >= 0.0);
    }

    #[test]
    fn test_reencoding_cleaned_output_is_stable() {
        let source = source_table();
        let pre = TabularPreprocessor::fit(&source, &["A".into(), "B".into()], &["C".into()]).unwrap();
        let schema = pre.schema();
        let inf = inferencer(vec![5, 4, 3], 2);

        let decoders = Decoders { scaler: &pre.scaler, encoder: &pre.encoder };
        let out = inf
            .clean(&pre.transform(&source).unwrap(), None, &schema, decoders, &source.columns)
            .unwrap();

        let again = pre.transform(&out.table).unwrap();
        let block: Vec<Vec<f32>> = again
            .features
            .iter()
            .map(|r| r[..schema.continuous_count()].to_vec())
            .collect();
        let restored = pre.scaler.inverse_transform(&block).unwrap();

        assert_eq!(restored.len(), out.table.len());
        for (row, values) in out.table.rows.iter().zip(&restored) {
            for (c, name) in schema.continuous.iter().enumerate() {
                let col = out.table.column_position(name).unwrap();
                assert_eq!(round_cell(values[c]), row[col]);
            }
        }
    }

    #[test]
    fn test_clean_rejects_mismatched_truth() {
        let source = source_table();
        let pre = TabularPreprocessor::fit(&source, &["A".into()], &["C".into()]).unwrap();
        let ds  = pre.transform(&source).unwrap();
        let short = pre.transform(&source.take_rows(&[0, 1])).unwrap();
        let inf = inferencer(vec![4, 2], 2);
        let decoders = Decoders { scaler: &pre.scaler, encoder: &pre.encoder };
        assert!(inf.clean(&ds, Some(&short), &pre.schema(), decoders, &source.columns).is_err());
    }

    #[test]
    fn test_clean_continuous_only() {
        let source = source_table();
        let pre = TabularPreprocessor::fit(&source, &["A".into(), "B".into()], &[]).unwrap();
        let ds  = pre.transform(&source).unwrap();
        let inf = inferencer(vec![2, 1], 5);
        let decoders = Decoders { scaler: &pre.scaler, encoder: &pre.encoder };
        let out = inf.clean(&ds, None, &pre.schema(), decoders, &source.columns).unwrap();
        assert_eq!(out.table.len(), 5);
        assert!(out.table.rows.iter().all(|r| r[2].is_empty()));
    }

    #[test]
    fn test_round_cell() {
        assert_eq!(round_cell(2.4), "2");
        assert_eq!(round_cell(2.6), "3");
        assert_eq!(round_cell(-0.3), "0");
        assert_eq!(round_cell(-1.7), "-2");
    }

    #[test]
    fn test_batch_errors() {
        let decoded = vec![vec![1.0, 0.0], vec![0.0, 0.0]];
        let truth   = [vec![0.0, 0.0], vec![0.0, 2.0]];
        let (mae, mse) = batch_errors(&decoded, truth.iter());
        assert!((mae - 0.75).abs() < 1e-9);
        assert!((mse - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_classify_and_accuracy() {
        let device = Default::default();
        let model = StackedNetConfig::new(vec![5, 4])
            .with_head(TerminalPolicy::Classification { classes: 3 })
            .init::<TestBackend>(&device);
        let inf = Inferencer::new(model, device, 2);
        let preds = inf.classify(&dataset(5)).unwrap();
        assert_eq!(preds.len(), 4);
        assert!(preds.iter().all(|&p| p < 3));

        assert_eq!(accuracy(&[0, 1, 2, 1], &[0, 1, 1, 1]), 0.75);
    }
}

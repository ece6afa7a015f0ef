// ============================================================
// Layer 4 — Tabular Preprocessor
// ============================================================
// Turns text tables into feature vectors and back:
//
//   continuous columns  → StandardScaler  → z-scores
//   categorical columns → OneHotEncoder   → one-hot groups
//
// Feature layout is always [continuous..., group_0..., group_1...],
// matching the ColumnSchema handed to the loss and the decoder.
//
// The fitted state is serialisable so the clean/anonymize passes
// can reuse exactly the transforms seen during training.

use anyhow::{bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::data::dataset::TabularDataset;
use crate::domain::{
    schema::{CategoricalGroup, ColumnSchema},
    table::Table,
    traits::{CategoryEncoder, Scaler},
};

// ─── StandardScaler ───────────────────────────────────────────────────────────
/// Per-column z-score scaling. Constant columns keep a unit scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean:  Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit on `columns[c][row]` values.
    pub fn fit(columns: &[Vec<f64>]) -> Self {
        let mut mean  = Vec::with_capacity(columns.len());
        let mut scale = Vec::with_capacity(columns.len());
        for values in columns {
            let n = values.len().max(1) as f64;
            let m = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let s = var.sqrt();
            mean.push(m);
            scale.push(if s > f64::EPSILON { s } else { 1.0 });
        }
        Self { mean, scale }
    }

    pub fn transform_value(&self, column: usize, value: f64) -> f32 {
        ((value - self.mean[column]) / self.scale[column]) as f32
    }
}

impl Scaler for StandardScaler {
    fn inverse_transform(&self, block: &[Vec<f32>]) -> Result<Vec<Vec<f64>>> {
        block
            .iter()
            .map(|row| {
                ensure!(
                    row.len() == self.mean.len(),
                    "scaler expects {} columns, got {}", self.mean.len(), row.len()
                );
                Ok(row
                    .iter()
                    .enumerate()
                    .map(|(c, &v)| v as f64 * self.scale[c] + self.mean[c])
                    .collect())
            })
            .collect()
    }
}

// ─── OneHotEncoder ────────────────────────────────────────────────────────────
/// One sorted category set per categorical column.
/// Values never seen during fitting encode to an all-zero group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub columns:    Vec<String>,
    pub categories: Vec<Vec<String>>,
}

impl OneHotEncoder {
    pub fn fit(columns: Vec<String>, values: &[Vec<&str>]) -> Self {
        let categories = values
            .iter()
            .map(|col| {
                let mut cats: Vec<String> = col.iter().map(|v| v.to_string()).collect();
                cats.sort();
                cats.dedup();
                cats
            })
            .collect();
        Self { columns, categories }
    }

    /// Append the one-hot group of `value` for column `column` to `out`.
    pub fn encode_into(&self, column: usize, value: &str, out: &mut Vec<f32>) {
        let cats = &self.categories[column];
        let hit  = cats.binary_search_by(|c| c.as_str().cmp(value)).ok();
        out.extend((0..cats.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
    }
}

impl CategoryEncoder for OneHotEncoder {
    fn inverse_transform(&self, one_hot: &[Vec<f32>]) -> Result<Vec<Vec<String>>> {
        let width: usize = self.group_widths().iter().sum();
        one_hot
            .iter()
            .map(|row| {
                ensure!(row.len() == width, "encoder expects {width} columns, got {}", row.len());
                let mut offset = 0;
                let mut labels = Vec::with_capacity(self.categories.len());
                for cats in &self.categories {
                    let group = &row[offset..offset + cats.len()];
                    labels.push(cats[first_argmax(group)].clone());
                    offset += cats.len();
                }
                Ok(labels)
            })
            .collect()
    }

    fn group_widths(&self) -> Vec<usize> {
        self.categories.iter().map(Vec::len).collect()
    }
}

/// Index of the largest value; ties resolve to the lowest index.
fn first_argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

// ─── TabularPreprocessor ──────────────────────────────────────────────────────
/// Fitted scaler + encoder pair for one column selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabularPreprocessor {
    pub continuous: Vec<String>,
    pub scaler:     StandardScaler,
    pub encoder:    OneHotEncoder,
}

impl TabularPreprocessor {
    /// Fit on the training split only.
    pub fn fit(table: &Table, continuous: &[String], categorical: &[String]) -> Result<Self> {
        let numeric = continuous
            .iter()
            .map(|name| parse_column(table, name))
            .collect::<Result<Vec<_>>>()?;
        let labels = categorical
            .iter()
            .map(|name| table.column(name))
            .collect::<Result<Vec<_>>>()?;

        let pre = Self {
            continuous: continuous.to_vec(),
            scaler:     StandardScaler::fit(&numeric),
            encoder:    OneHotEncoder::fit(categorical.to_vec(), &labels),
        };
        tracing::info!(
            "Fitted preprocessor: {} continuous, {} categorical, feature width {}",
            continuous.len(),
            categorical.len(),
            pre.schema().feature_width(),
        );
        Ok(pre)
    }

    pub fn schema(&self) -> ColumnSchema {
        let groups = self
            .encoder
            .columns
            .iter()
            .zip(&self.encoder.categories)
            .map(|(name, cats)| CategoricalGroup::new(name.clone(), cats.len()))
            .collect();
        ColumnSchema::new(self.continuous.clone(), groups)
    }

    /// Encode every row of `table`, keeping its source index.
    pub fn transform(&self, table: &Table) -> Result<TabularDataset> {
        let con_pos = positions(table, &self.continuous)?;
        let cat_pos = positions(table, &self.encoder.columns)?;
        let width   = self.schema().feature_width();

        let mut features = Vec::with_capacity(table.len());
        for (row_no, row) in table.rows.iter().enumerate() {
            let mut v = Vec::with_capacity(width);
            for (c, &pos) in con_pos.iter().enumerate() {
                let value: f64 = row[pos].parse().with_context(|| {
                    format!(
                        "row {}: '{}' in column '{}' is not numeric",
                        table.index[row_no], row[pos], self.continuous[c]
                    )
                })?;
                v.push(self.scaler.transform_value(c, value));
            }
            for (c, &pos) in cat_pos.iter().enumerate() {
                self.encoder.encode_into(c, &row[pos], &mut v);
            }
            features.push(v);
        }
        TabularDataset::new(features, table.index.clone())
    }
}

/// Map labels of a target column to class ids using sorted class names.
pub fn encode_labels(values: &[&str]) -> (Vec<usize>, Vec<String>) {
    let mut classes: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    classes.sort();
    classes.dedup();
    let ids = values
        .iter()
        .map(|v| classes.binary_search_by(|c| c.as_str().cmp(v)).unwrap_or(0))
        .collect();
    (ids, classes)
}

fn parse_column(table: &Table, name: &str) -> Result<Vec<f64>> {
    table
        .column(name)?
        .into_iter()
        .map(|v| {
            v.parse::<f64>()
                .with_context(|| format!("'{v}' in column '{name}' is not numeric"))
        })
        .collect()
}

fn positions(table: &Table, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|n| match table.column_position(n) {
            Some(p) => Ok(p),
            None => bail!("column '{n}' not found in table"),
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(
            vec!["age".into(), "sex".into(), "hours".into()],
            vec![0, 1, 2, 3],
            vec![
                vec!["20".into(), "Male".into(),   "40".into()],
                vec!["30".into(), "Female".into(), "40".into()],
                vec!["40".into(), "Male".into(),   "40".into()],
                vec!["50".into(), "Other".into(),  "40".into()],
            ],
        )
        .unwrap()
    }

    fn fitted() -> TabularPreprocessor {
        TabularPreprocessor::fit(&table(), &["age".into(), "hours".into()], &["sex".into()]).unwrap()
    }

    #[test]
    fn test_schema_widths() {
        let schema = fitted().schema();
        assert_eq!(schema.continuous_count(), 2);
        assert_eq!(schema.group_widths(), vec![3]);
        assert_eq!(schema.feature_width(), 5);
    }

    #[test]
    fn test_transform_layout_continuous_then_one_hot() {
        let ds = fitted().transform(&table()).unwrap();
        // categories sorted: Female, Male, Other
        assert_eq!(&ds.features[1][2..], &[1.0, 0.0, 0.0]);
        assert_eq!(&ds.features[3][2..], &[0.0, 0.0, 1.0]);
        // constant column scales to zero
        assert_eq!(ds.features[0][1], 0.0);
    }

    #[test]
    fn test_scaler_round_trip() {
        let pre = fitted();
        let ds  = pre.transform(&table()).unwrap();
        let block: Vec<Vec<f32>> = ds.features.iter().map(|r| r[..2].to_vec()).collect();
        let back = pre.scaler.inverse_transform(&block).unwrap();
        assert!((back[2][0] - 40.0).abs() < 1e-4);
        assert!((back[2][1] - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_category_is_all_zero() {
        let pre = fitted();
        let mut out = Vec::new();
        pre.encoder.encode_into(0, "Unknown", &mut out);
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_encoder_inverse_picks_argmax() {
        let labels = fitted()
            .encoder
            .inverse_transform(&[vec![0.1, 0.7, 0.2], vec![0.5, 0.5, 0.0]])
            .unwrap();
        assert_eq!(labels, vec![vec!["Male".to_string()], vec!["Female".to_string()]]);
    }

    #[test]
    fn test_non_numeric_continuous_rejected() {
        let mut t = table();
        t.rows[0][0] = "abc".into();
        assert!(fitted().transform(&t).is_err());
    }

    #[test]
    fn test_encode_labels_sorted() {
        let (ids, classes) = encode_labels(&[">50K", "<=50K", ">50K"]);
        assert_eq!(classes, vec!["<=50K", ">50K"]);
        assert_eq!(ids, vec![1, 0, 1]);
    }
}

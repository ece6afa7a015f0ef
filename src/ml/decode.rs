// ============================================================
// Layer 5 — Arg-max Reassembly
// ============================================================
// Converts raw network output rows back into the encoded layout
// the preprocessing collaborators understand:
//
//   [ continuous (kept as-is) | one-hot per categorical group ]
//
// Each categorical group's raw scores collapse to the one-hot of
// their arg-max. Ties resolve to the lowest index.

use anyhow::{anyhow, Result};
use burn::prelude::*;

use crate::domain::schema::ColumnSchema;

/// Arg-max position inside every group of `scores`.
pub fn argmax_groups(scores: &[f32], widths: &[usize]) -> Vec<usize> {
    let mut offset = 0;
    widths
        .iter()
        .map(|&w| {
            let group = &scores[offset..offset + w];
            offset += w;
            let mut best = 0;
            for (i, &v) in group.iter().enumerate() {
                if v > group[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// Expand class indices into concatenated one-hot groups.
pub fn one_hot_groups(indices: &[usize], widths: &[usize]) -> Vec<f32> {
    let mut out = Vec::with_capacity(widths.iter().sum());
    for (&idx, &w) in indices.iter().zip(widths) {
        out.extend((0..w).map(|i| if i == idx { 1.0 } else { 0.0 }));
    }
    out
}

/// Decode one output row: continuous slice untouched, categorical
/// slice replaced by the one-hot of each group's arg-max.
pub fn decode_row(row: &[f32], schema: &ColumnSchema) -> Vec<f32> {
    let n_con  = schema.continuous_count();
    let widths = schema.group_widths();
    let mut out = row[..n_con].to_vec();
    out.extend(one_hot_groups(&argmax_groups(&row[n_con..], &widths), &widths));
    out
}

/// Copy a `[rows, cols]` tensor to host rows.
pub fn tensor_rows<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<Vec<f32>>> {
    let [_, cols] = tensor.dims();
    let flat: Vec<f32> = tensor
        .into_data()
        .convert::<f32>()
        .to_vec()
        .map_err(|e| anyhow!("cannot read tensor data: {e:?}"))?;
    if cols == 0 {
        return Ok(Vec::new());
    }
    Ok(flat.chunks(cols).map(<[f32]>::to_vec).collect())
}

/// Decode a whole output batch.
pub fn decode_batch<B: Backend>(output: Tensor<B, 2>, schema: &ColumnSchema) -> Result<Vec<Vec<f32>>> {
    Ok(tensor_rows(output)?
        .iter()
        .map(|row| decode_row(row, schema))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::CategoricalGroup;
    use burn::backend::NdArray;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(
            vec!["A".into()],
            vec![CategoricalGroup::new("C", 3), CategoricalGroup::new("D", 2)],
        )
    }

    #[test]
    fn test_argmax_per_group() {
        assert_eq!(argmax_groups(&[0.1, 3.0, -1.0, 0.0, 0.2], &[3, 2]), vec![1, 1]);
    }

    #[test]
    fn test_argmax_tie_picks_lowest_index() {
        assert_eq!(argmax_groups(&[0.5, 0.5, 0.1], &[3]), vec![0]);
    }

    #[test]
    fn test_decode_row_keeps_continuous() {
        let decoded = decode_row(&[0.37, -2.0, 4.0, 1.0, 0.9, 1.1], &schema());
        assert_eq!(decoded, vec![0.37, 0.0, 1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_decode_without_categorical_is_identity() {
        let s = ColumnSchema::new(vec!["A".into(), "B".into()], vec![]);
        assert_eq!(decode_row(&[1.5, -0.5], &s), vec![1.5, -0.5]);
    }

    #[test]
    fn test_decode_batch_from_tensor() {
        let t = Tensor::<NdArray<f32>, 1>::from_floats(
            [1.0f32, 0.0, 0.0, 5.0, 2.0, 3.0, 2.0, 9.0, 0.0, 1.0, 0.0, 0.0].as_slice(),
            &Default::default(),
        )
        .reshape([2, 6]);
        let rows = decode_batch(t, &schema()).unwrap();
        assert_eq!(rows[0], vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0]);
        assert_eq!(rows[1], vec![2.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }
}

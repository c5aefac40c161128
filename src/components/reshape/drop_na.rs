use log::info;
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};

use crate::{
    components::dataset::{DroppedRows, FlatDataset},
    errors::{RasterCanvasError, Result},
};

/// Which rows count as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropHow {
    /// Every value of the row is non-finite.
    #[default]
    All,
    /// Any value of the row is non-finite.
    Any,
}

fn kept_rows(flat: &FlatDataset, how: DropHow) -> Vec<usize> {
    flat.values()
        .rows()
        .into_iter()
        .enumerate()
        .filter(|(_, row)| match how {
            DropHow::All => row.iter().any(|value| value.is_finite()),
            DropHow::Any => row.iter().all(|value| value.is_finite()),
        })
        .map(|(idx, _)| idx)
        .collect()
}

fn keep_rows(flat: &FlatDataset, kept: &[usize]) -> FlatDataset {
    let dropped = match flat.dropped() {
        Some(dropped) => DroppedRows {
            shape_before_drop_na_rows: dropped.shape_before_drop_na_rows,
            retained: kept.iter().map(|idx| dropped.retained[*idx]).collect(),
        },
        None => DroppedRows {
            shape_before_drop_na_rows: flat.num_rows(),
            retained: kept.to_vec(),
        },
    };
    info!(
        "Dropped {} of {} rows",
        flat.num_rows() - kept.len(),
        flat.num_rows()
    );
    FlatDataset {
        flat: flat.values().select(Axis(0), kept),
        dropped: Some(dropped),
        ..flat.clone()
    }
}

/// Removes rows with missing values, recording where the kept rows came from.
pub fn drop_na_rows(flat: &FlatDataset, how: DropHow) -> FlatDataset {
    keep_rows(flat, &kept_rows(flat, how))
}

/// [drop_na_rows] with row aligned vectors sliced by the same rows.
pub fn drop_na_rows_with(
    flat: &FlatDataset,
    how: DropHow,
    aligned: &[&Array1<f64>],
) -> Result<(FlatDataset, Vec<Array1<f64>>)> {
    if let Some(vector) = aligned.iter().find(|vector| vector.len() != flat.num_rows()) {
        return Err(RasterCanvasError::ShapeMismatch(format!(
            "vector of length {} does not align with {} rows",
            vector.len(),
            flat.num_rows()
        )));
    }
    let kept = kept_rows(flat, how);
    let sliced = aligned
        .iter()
        .map(|vector| vector.select(Axis(0), &kept))
        .collect();
    Ok((keep_rows(flat, &kept), sliced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        dataset::tests::dataset,
        reshape::flatten::{flatten, inverse_flatten},
    };
    use ndarray::{array, Array2};

    /// Flat dataset of shape (6, 3) with rows 2 and 4 all NaN.
    fn with_gaps() -> FlatDataset {
        let flat = flatten(&dataset(&["a", "b", "c"], 2, 3)).unwrap();
        let mut values = flat.values().clone();
        for row in [2, 4] {
            values.row_mut(row).fill(f64::NAN);
        }
        values[[1, 0]] = f64::NAN;
        flat.with_values(values, flat.layer_order().to_vec()).unwrap()
    }

    #[test_log::test]
    fn drop_and_restore() {
        let flat = with_gaps();
        let dropped = drop_na_rows(&flat, DropHow::All);
        assert_eq!(dropped.values().shape(), &[4, 3]);
        let record = dropped.dropped().unwrap();
        assert_eq!(record.shape_before_drop_na_rows, 6);
        assert_eq!(record.retained, vec![0, 1, 3, 5]);

        let restored = inverse_flatten(&dropped).unwrap();
        let original = inverse_flatten(&flat).unwrap();
        for (layer, source) in restored.layers().iter().zip(original.layers()) {
            let (values, source) = (layer.values(), source.values());
            assert_eq!(values.shape(), &[2, 3]);
            for cell in 0..6 {
                let (row, col) = (cell / 3, cell % 3);
                let value = values[[row, col]];
                if [2, 4].contains(&cell) {
                    assert!(value.is_nan());
                } else {
                    assert_eq!(value.to_bits(), source[[row, col]].to_bits());
                }
            }
        }
    }

    #[test]
    fn any_policy_and_repeated_drops() {
        let flat = with_gaps();
        let any = drop_na_rows(&flat, DropHow::Any);
        assert_eq!(any.dropped().unwrap().retained, vec![0, 3, 5]);

        let all = drop_na_rows(&flat, DropHow::All);
        let then_any = drop_na_rows(&all, DropHow::Any);
        assert_eq!(then_any.dropped(), any.dropped());
        assert_eq!(inverse_flatten(&then_any).unwrap().len(), 3);
    }

    #[test]
    fn aligned_vectors() {
        let flat = with_gaps();
        let y = Array1::from_iter((0..6).map(|idx| idx as f64));
        let (dropped, sliced) = drop_na_rows_with(&flat, DropHow::All, &[&y]).unwrap();
        assert_eq!(dropped.num_rows(), 4);
        assert_eq!(sliced[0], array![0., 1., 3., 5.]);

        let short = Array1::zeros(5);
        assert!(matches!(
            drop_na_rows_with(&flat, DropHow::All, &[&short]),
            Err(RasterCanvasError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn nothing_to_drop() {
        let flat = flatten(&dataset(&["a"], 2, 2)).unwrap();
        let dropped = drop_na_rows(&flat, DropHow::All);
        assert_eq!(dropped.values(), flat.values());
        assert_eq!(dropped.dropped().unwrap().retained, vec![0, 1, 2, 3]);
        assert_eq!(drop_na_rows(&dropped, DropHow::All).values(), &Array2::from_shape_fn((4, 1), |(row, _)| row as f64));
    }
}

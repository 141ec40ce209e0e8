//! Centered Log-Ratio (CLR) transformation of wide count tables.

use crate::error::{RddError, Result};
use crate::normalize::proportions::WideTable;
use nalgebra::DMatrix;
use rayon::prelude::*;

/// Apply the CLR transformation row by row.
///
/// For row i: CLR(x_ij) = ln(x_ij + offset) - mean_j(ln(x_ij + offset))
///
/// Each row of the result sums to zero. Every shifted value must be positive.
/// Unassigned matches take no part.
pub fn clr(wide: &WideTable, offset: f64) -> Result<WideTable> {
    let (n_rows, n_cols) = wide.data.shape();
    if n_rows == 0 || n_cols == 0 {
        return Err(RddError::EmptyResult(
            "Cannot apply CLR to an empty table".to_string(),
        ));
    }

    if let Some(v) = wide.data.iter().find(|&&v| v + offset <= 0.0) {
        return Err(RddError::InvalidParameter(format!(
            "CLR requires positive values after the offset; found {} with offset {}",
            v, offset
        )));
    }

    let rows: Vec<Vec<f64>> = (0..n_rows)
        .into_par_iter()
        .map(|i| {
            let logs: Vec<f64> = wide.data.row(i).iter().map(|v| (v + offset).ln()).collect();
            let mean = logs.iter().sum::<f64>() / n_cols as f64;
            logs.into_iter().map(|l| l - mean).collect()
        })
        .collect();

    let data = DMatrix::from_fn(n_rows, n_cols, |i, j| rows[i][j]);
    Ok(WideTable {
        data,
        unassigned: vec![0.0; n_rows],
        ..wide.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn wide(data: DMatrix<f64>, types: &[&str]) -> WideTable {
        let n = data.nrows();
        WideTable {
            filenames: (0..n).map(|i| format!("f{}", i + 1)).collect(),
            reference_types: types.iter().map(|t| t.to_string()).collect(),
            groups: vec![None; n],
            data,
            unassigned: vec![0.0; n],
            level: 1,
        }
    }

    #[test]
    fn test_clr_two_types() {
        let table = wide(DMatrix::from_row_slice(1, 2, &[10.0, 0.0]), &["TypeA", "TypeB"]);
        let result = clr(&table, 1.0).unwrap();

        let mean = (11.0_f64.ln() + 1.0_f64.ln()) / 2.0;
        assert_relative_eq!(result.data[(0, 0)], 11.0_f64.ln() - mean, epsilon = 1e-12);
        assert_relative_eq!(result.data[(0, 1)], 1.0_f64.ln() - mean, epsilon = 1e-12);
        assert_relative_eq!(result.data[(0, 0)], -result.data[(0, 1)], epsilon = 1e-12);
    }

    #[test]
    fn test_clr_rows_sum_to_zero() {
        let table = wide(
            DMatrix::from_row_slice(3, 3, &[
                10.0, 20.0, 5.0,
                0.0, 0.0, 0.0,
                1.0, 40.0, 3.0,
            ]),
            &["A", "B", "C"],
        );
        let result = clr(&table, 0.5).unwrap();
        for sum in result.row_sums() {
            assert_relative_eq!(sum, 0.0, epsilon = 1e-10);
        }
        // an all-zero row maps to all zeros
        for v in result.row(1) {
            assert_relative_eq!(v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_clr_rejects_non_positive() {
        let table = wide(DMatrix::from_row_slice(1, 2, &[1.0, 0.0]), &["A", "B"]);
        assert!(clr(&table, 0.0).is_err());
    }
}

//! Principal component analysis of wide count tables.

use crate::error::{RddError, Result};
use crate::normalize::WideTable;
use crate::pipeline::RddCounts;
use nalgebra::DMatrix;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// PCA scores and variance summary.
#[derive(Debug, Clone, Serialize)]
pub struct PcaResult {
    /// Row identifiers, in the order of the input table.
    pub filenames: Vec<String>,
    /// Group of each row.
    pub groups: Vec<Option<String>>,
    /// Projected coordinates (rows x components).
    #[serde(skip)]
    pub scores: DMatrix<f64>,
    /// Feature weights (reference types x components).
    #[serde(skip)]
    pub loadings: DMatrix<f64>,
    /// Reference types, matching the rows of `loadings`.
    pub reference_types: Vec<String>,
    /// Share of total variance captured by each component.
    pub explained_variance_ratio: Vec<f64>,
}

impl PcaResult {
    pub fn n_components(&self) -> usize {
        self.scores.ncols()
    }

    /// Component labels `PC1`, `PC2`, ...
    pub fn component_names(&self) -> Vec<String> {
        (1..=self.n_components()).map(|i| format!("PC{}", i)).collect()
    }

    /// Write scores as TSV: `filename`, `group`, `PC1`...
    pub fn write_scores<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        let mut header = vec!["filename".to_string(), "group".to_string()];
        header.extend(self.component_names());
        csv_writer.write_record(&header)?;
        for (i, filename) in self.filenames.iter().enumerate() {
            let mut record = vec![filename.clone(), self.groups[i].clone().unwrap_or_default()];
            record.extend(self.scores.row(i).iter().map(|v| v.to_string()));
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.write_scores(BufWriter::new(file))
    }
}

/// Center each column and divide by its population standard deviation.
///
/// Columns with zero variance are centered only.
pub fn standardize(data: &DMatrix<f64>) -> DMatrix<f64> {
    let n = data.nrows() as f64;
    let mut scaled = data.clone();
    for j in 0..data.ncols() {
        let mean = data.column(j).sum() / n;
        let var = data.column(j).iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = var.sqrt();
        for v in scaled.column_mut(j).iter_mut() {
            *v -= mean;
            if std > 0.0 {
                *v /= std;
            }
        }
    }
    scaled
}

/// Run PCA on the rows of a wide table.
///
/// Columns are standardized first. Component signs are fixed so the
/// largest-magnitude loading of each component is positive.
pub fn pca(wide: &WideTable, n_components: usize) -> Result<PcaResult> {
    let (n_rows, n_cols) = wide.data.shape();
    if n_rows < 2 {
        return Err(RddError::EmptyResult(format!(
            "PCA needs at least 2 samples, got {}",
            n_rows
        )));
    }
    let max_components = n_rows.min(n_cols);
    if n_components == 0 || n_components > max_components {
        return Err(RddError::InvalidParameter(format!(
            "n_components must be between 1 and {}, got {}",
            max_components, n_components
        )));
    }

    let x = standardize(&wide.data);
    let svd = x.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| RddError::InvalidParameter("SVD did not converge".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| RddError::InvalidParameter("SVD did not converge".to_string()))?;
    let singular = svd.singular_values;

    let mut order: Vec<usize> = (0..singular.len()).collect();
    order.sort_by(|&a, &b| singular[b].total_cmp(&singular[a]));

    let total: f64 = singular.iter().map(|s| s * s).sum();
    let mut scores = DMatrix::zeros(n_rows, n_components);
    let mut loadings = DMatrix::zeros(n_cols, n_components);
    let mut explained_variance_ratio = Vec::with_capacity(n_components);

    for (k, &c) in order.iter().take(n_components).enumerate() {
        let loading = v_t.row(c).transpose();
        let pivot = loading
            .iter()
            .copied()
            .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };

        loadings.set_column(k, &(loading * sign));
        scores.set_column(k, &(u.column(c) * (singular[c] * sign)));
        explained_variance_ratio.push(if total > 0.0 {
            singular[c] * singular[c] / total
        } else {
            0.0
        });
    }

    Ok(PcaResult {
        filenames: wide.filenames.clone(),
        groups: wide.groups.clone(),
        scores,
        loadings,
        reference_types: wide.reference_types.clone(),
        explained_variance_ratio,
    })
}

/// PCA of the counts at one level, on CLR values when `clr_offset` is given
/// and on raw counts otherwise.
pub fn perform_pca(
    rdd: &RddCounts,
    level: usize,
    n_components: usize,
    clr_offset: Option<f64>,
) -> Result<PcaResult> {
    let wide = match clr_offset {
        Some(offset) => rdd.clr(level, offset)?,
        None => rdd.wide(level)?,
    };
    pca(&wide, n_components)
}

//! Wide (filename x reference type) views of the count table.

use crate::counts::CountTable;
use crate::error::{RddError, Result};
use nalgebra::DMatrix;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One row per filename, one column per reference type at a single level.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    /// Row identifiers, sorted.
    pub filenames: Vec<String>,
    /// Column identifiers, sorted.
    pub reference_types: Vec<String>,
    /// Group of each row, carried from the count table.
    pub groups: Vec<Option<String>>,
    /// Values (filenames x reference types).
    pub data: DMatrix<f64>,
    /// Per-row value of matches with no category at this level. Counted in
    /// the row total but not a column.
    pub unassigned: Vec<f64>,
    /// Ontology level the table was taken from.
    pub level: usize,
}

impl WideTable {
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.data.ncols()
    }

    /// Value for a filename and reference type, if both exist.
    pub fn value(&self, filename: &str, reference_type: &str) -> Option<f64> {
        let row = self.filenames.iter().position(|f| f == filename)?;
        let col = self.reference_types.iter().position(|t| t == reference_type)?;
        Some(self.data[(row, col)])
    }

    /// Values of one row.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.data.row(row).iter().copied().collect()
    }

    /// Sum of the reference type columns of each row.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_rows()).map(|i| self.data.row(i).sum()).collect()
    }

    /// Row sums including unassigned matches.
    pub fn totals(&self) -> Vec<f64> {
        self.row_sums()
            .into_iter()
            .zip(&self.unassigned)
            .map(|(sum, rest)| sum + rest)
            .collect()
    }

    /// Write as tab-separated text: `filename`, `group`, then one column per type.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        let mut header = vec!["filename".to_string(), "group".to_string()];
        header.extend(self.reference_types.iter().cloned());
        csv_writer.write_record(&header)?;

        for (i, filename) in self.filenames.iter().enumerate() {
            let mut record = vec![
                filename.clone(),
                self.groups[i].clone().unwrap_or_default(),
            ];
            record.extend(self.data.row(i).iter().map(|v| v.to_string()));
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.to_writer(BufWriter::new(file))
    }
}

/// Pivot one level of the count table into a wide table.
///
/// Missing (filename, type) cells are zero. Rows with a null reference type
/// have no column; their counts go to [`WideTable::unassigned`].
pub fn to_wide(counts: &CountTable, level: usize) -> Result<WideTable> {
    let rows: Vec<_> = counts.at_level(level).collect();
    if rows.is_empty() {
        return Err(RddError::EmptyResult(format!(
            "No counts at level {}",
            level
        )));
    }

    let filenames: Vec<String> = rows
        .iter()
        .map(|r| r.filename.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let reference_types: Vec<String> = rows
        .iter()
        .filter_map(|r| r.reference_type.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let row_index: HashMap<&str, usize> = filenames
        .iter()
        .enumerate()
        .map(|(i, f)| (f.as_str(), i))
        .collect();
    let col_index: HashMap<&str, usize> = reference_types
        .iter()
        .enumerate()
        .map(|(j, t)| (t.as_str(), j))
        .collect();

    let mut data = DMatrix::zeros(filenames.len(), reference_types.len());
    let mut unassigned = vec![0.0; filenames.len()];
    let mut groups: Vec<Option<String>> = vec![None; filenames.len()];
    for row in rows {
        let i = row_index[row.filename.as_str()];
        if groups[i].is_none() {
            groups[i] = row.group.clone();
        }
        match row.reference_type.as_deref() {
            Some(t) => data[(i, col_index[t])] += row.count as f64,
            None => unassigned[i] += row.count as f64,
        }
    }

    Ok(WideTable {
        filenames,
        reference_types,
        groups,
        data,
        unassigned,
        level,
    })
}

/// Divide each row by its total, unassigned matches included. Rows with a
/// zero total are left unchanged.
pub fn to_proportions(wide: &WideTable) -> WideTable {
    let mut data = wide.data.clone();
    let mut unassigned = wide.unassigned.clone();
    for (i, total) in wide.totals().into_iter().enumerate() {
        if total > 0.0 {
            data.row_mut(i).unscale_mut(total);
            unassigned[i] /= total;
        }
    }
    WideTable {
        data,
        unassigned,
        ..wide.clone()
    }
}

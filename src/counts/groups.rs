//! Label-only changes to an existing count table: applying a filename -> group
//! mapping and switching the active grouping column.

use crate::counts::table::CountTable;
use crate::data::{strip_spectral_extension, SampleMetadata, Table, FILENAME_COLUMN};
use crate::error::{RddError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// A filename -> group label mapping, deduplicated by filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMapping {
    /// Pairs in file order; the first label of a filename wins.
    labels: Vec<(String, String)>,
}

impl GroupMapping {
    /// Read the mapping from two columns of a table.
    ///
    /// Fails with a configuration error if either column is absent.
    pub fn from_table(table: &Table, key_column: &str, value_column: &str) -> Result<Self> {
        let (Some(key), Some(value)) = (
            table.column_index(key_column),
            table.column_index(value_column),
        ) else {
            return Err(RddError::Config(format!(
                "Group mapping must contain the columns '{}' and '{}' (found: {})",
                key_column,
                value_column,
                table.columns().join(", ")
            )));
        };

        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        for row in 0..table.n_rows() {
            let (Some(filename), Some(label)) = (table.get(row, key), table.get(row, value)) else {
                continue;
            };
            let filename = strip_spectral_extension(filename);
            if seen.insert(filename.clone()) {
                labels.push((filename, label.to_string()));
            }
        }
        Ok(Self { labels })
    }

    /// Load a mapping file keyed by `filename`.
    pub fn load(path: &Path, value_column: &str) -> Result<Self> {
        Self::from_table(&Table::from_path(path)?, FILENAME_COLUMN, value_column)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    fn as_map(&self) -> HashMap<String, String> {
        self.labels.iter().cloned().collect()
    }
}

/// Apply a group mapping to the count table and the sample metadata.
///
/// Rows whose filename has a mapped label get that label; all other rows keep
/// their group. Counts, levels and reference types are untouched. The new
/// labels are written into the active grouping column of `samples`.
pub fn update_groups(counts: &mut CountTable, samples: &mut SampleMetadata, mapping: &GroupMapping) {
    counts.overwrite_groups(&mapping.as_map());
    for (filename, label) in mapping.labels() {
        samples.assign_group(filename, label);
    }
}

/// Re-resolve every row's group from the active grouping column of `samples`.
pub fn rejoin_groups(counts: &mut CountTable, samples: &SampleMetadata) {
    counts.attach_groups(samples);
}

/// Make `column` the active grouping column and re-join it into the counts.
///
/// Returns the switched sample metadata; the input metadata is not modified.
pub fn switch_group_column(
    counts: &mut CountTable,
    samples: &SampleMetadata,
    column: &str,
) -> Result<SampleMetadata> {
    let switched = samples.with_group_column(column)?;
    rejoin_groups(counts, &switched);
    Ok(switched)
}

//! Experimental sample metadata with a switchable active grouping column.

use crate::data::table::{
    load_metadata, strip_spectral_extension, MetadataKind, Table, FILENAME_COLUMN,
};
use crate::error::{RddError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Default name of the grouping column.
pub const GROUP_COLUMN: &str = "group";

/// Sample metadata keyed by normalized filename.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMetadata {
    /// Filenames in order of first appearance.
    filenames: Vec<String>,
    /// Column names, excluding `filename`.
    column_names: Vec<String>,
    /// filename -> column -> value. Missing cells are absent.
    data: HashMap<String, HashMap<String, String>>,
    /// The column that currently defines `group`.
    group_column: String,
}

impl SampleMetadata {
    /// Create empty metadata with a single grouping column.
    pub fn new(group_column: &str) -> Self {
        Self {
            filenames: Vec::new(),
            column_names: vec![group_column.to_string()],
            data: HashMap::new(),
            group_column: group_column.to_string(),
        }
    }

    /// Build from a loaded table, using `group_column` as the active grouping.
    ///
    /// Rows repeating an earlier filename are ignored.
    pub fn from_table(table: &Table, group_column: &str) -> Result<Self> {
        let filename_col = table.require_column(FILENAME_COLUMN)?;
        if !table.has_column(group_column) {
            return Err(RddError::Config(format!(
                "Grouping column '{}' not found in sample metadata",
                group_column
            )));
        }

        let column_names: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| c.as_str() != FILENAME_COLUMN)
            .cloned()
            .collect();

        let mut filenames = Vec::new();
        let mut data = HashMap::new();
        for row in 0..table.n_rows() {
            let Some(filename) = table.get(row, filename_col).map(strip_spectral_extension) else {
                continue;
            };
            if data.contains_key(&filename) {
                continue;
            }
            let values: HashMap<String, String> = table
                .columns()
                .iter()
                .enumerate()
                .filter(|(col, _)| *col != filename_col)
                .filter_map(|(col, name)| table.get(row, col).map(|v| (name.clone(), v.to_string())))
                .collect();
            filenames.push(filename.clone());
            data.insert(filename, values);
        }

        Ok(Self {
            filenames,
            column_names,
            data,
            group_column: group_column.to_string(),
        })
    }

    /// Load sample metadata from a CSV/TSV/TXT file.
    pub fn load(path: &Path, group_column: &str) -> Result<Self> {
        let table = load_metadata(Some(path), MetadataKind::Sample)?;
        Self::from_table(&table, group_column)
    }

    /// Build from (filename, group) pairs, e.g. derived from the network itself.
    pub fn from_assignments<I>(assignments: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut meta = Self::new(GROUP_COLUMN);
        for (filename, group) in assignments {
            if !meta.has_sample(&filename) {
                meta.assign_group(&filename, &group);
            }
        }
        meta
    }

    /// Return a copy whose active grouping column is `column`.
    ///
    /// Only the designation changes; no values are recomputed.
    pub fn with_group_column(&self, column: &str) -> Result<Self> {
        if !self.has_column(column) {
            return Err(RddError::Config(format!(
                "Column '{}' not found in sample metadata",
                column
            )));
        }
        let mut switched = self.clone();
        switched.group_column = column.to_string();
        Ok(switched)
    }

    /// Keep only samples whose active group is one of `groups`.
    pub fn filter_groups(&self, groups: &[String]) -> Self {
        let wanted: HashSet<&str> = groups.iter().map(String::as_str).collect();
        let filenames: Vec<String> = self
            .filenames
            .iter()
            .filter(|f| self.group_of(f).is_some_and(|g| wanted.contains(g)))
            .cloned()
            .collect();
        let data = filenames
            .iter()
            .filter_map(|f| self.data.get(f).map(|v| (f.clone(), v.clone())))
            .collect();
        Self {
            filenames,
            column_names: self.column_names.clone(),
            data,
            group_column: self.group_column.clone(),
        }
    }

    /// Set the active group label of a sample, adding the sample if needed.
    pub fn assign_group(&mut self, filename: &str, group: &str) {
        if !self.data.contains_key(filename) {
            self.filenames.push(filename.to_string());
        }
        self.data
            .entry(filename.to_string())
            .or_default()
            .insert(self.group_column.clone(), group.to_string());
    }

    /// Active grouping column name.
    pub fn group_column(&self) -> &str {
        &self.group_column
    }

    /// Active group label of a sample.
    pub fn group_of(&self, filename: &str) -> Option<&str> {
        self.get(filename, &self.group_column)
    }

    /// Distinct labels of the active grouping column, sorted.
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self
            .filenames
            .iter()
            .filter_map(|f| self.group_of(f).map(String::from))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        groups.sort();
        groups
    }

    /// Get a value for a specific sample and column.
    pub fn get(&self, filename: &str, column: &str) -> Option<&str> {
        self.data
            .get(filename)
            .and_then(|m| m.get(column))
            .map(String::as_str)
    }

    /// Filenames in order.
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    /// Column names other than `filename`.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn n_samples(&self) -> usize {
        self.filenames.len()
    }

    pub fn has_sample(&self, filename: &str) -> bool {
        self.data.contains_key(filename)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

impl Default for SampleMetadata {
    fn default() -> Self {
        Self::new(GROUP_COLUMN)
    }
}

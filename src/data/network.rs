//! Molecular-network clustering output: one record per cluster with group
//! membership counts and the files contributing spectra to it.

use crate::data::table::{strip_spectral_extension, Table};
use crate::error::{RddError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Multi-valued column listing contributing files.
pub const SOURCE_FILES_COLUMN: &str = "UniqueFileSources";
/// Comma-separated list of the groups a cluster was observed in.
pub const DEFAULT_GROUPS_COLUMN: &str = "DefaultGroups";
/// Cluster identifier column.
pub const CLUSTER_INDEX_COLUMN: &str = "cluster index";
/// Separator inside the source files column.
pub const SOURCE_FILE_DELIMITER: char = '|';

fn group_column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^G\d+$").expect("group column pattern is valid"))
}

/// One network cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRecord {
    pub id: String,
    /// Membership count per group, aligned with [`Network::group_columns`].
    pub memberships: Vec<f64>,
    /// Labels from the `DefaultGroups` column, if present.
    pub default_groups: Vec<String>,
    /// Contributing filenames with spectral extensions removed. Repeats are kept.
    pub source_files: Vec<String>,
}

/// A loaded clustering table.
#[derive(Debug, Clone)]
pub struct Network {
    group_columns: Vec<String>,
    clusters: Vec<ClusterRecord>,
}

impl Network {
    /// Build from a table, treating every `G<N>` column as a group-membership column.
    pub fn from_table(table: &Table) -> Result<Self> {
        let group_columns: Vec<String> = table
            .columns()
            .iter()
            .filter(|c| group_column_pattern().is_match(c))
            .cloned()
            .collect();
        Self::from_table_with_groups(table, &group_columns)
    }

    /// Build from a table with an explicit list of group-membership columns.
    pub fn from_table_with_groups(table: &Table, group_columns: &[String]) -> Result<Self> {
        let files_col = table.require_column(SOURCE_FILES_COLUMN).map_err(|_| {
            RddError::Config(format!(
                "Network table is missing the '{}' column",
                SOURCE_FILES_COLUMN
            ))
        })?;
        let group_idx: Vec<usize> = group_columns
            .iter()
            .map(|c| table.require_column(c))
            .collect::<Result<_>>()?;
        let id_col = table.column_index(CLUSTER_INDEX_COLUMN);
        let default_col = table.column_index(DEFAULT_GROUPS_COLUMN);

        let clusters = (0..table.n_rows())
            .map(|row| ClusterRecord {
                id: id_col
                    .and_then(|c| table.get(row, c))
                    .map(String::from)
                    .unwrap_or_else(|| row.to_string()),
                memberships: group_idx
                    .iter()
                    .map(|&c| {
                        table
                            .get(row, c)
                            .and_then(|v| v.parse::<f64>().ok())
                            .unwrap_or(0.0)
                    })
                    .collect(),
                default_groups: default_col
                    .and_then(|c| table.get(row, c))
                    .map(split_default_groups)
                    .unwrap_or_default(),
                source_files: table
                    .get(row, files_col)
                    .map(split_source_files)
                    .unwrap_or_default(),
            })
            .collect();

        Ok(Self {
            group_columns: group_columns.to_vec(),
            clusters,
        })
    }

    /// Load a clustering table from a CSV/TSV file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_table(&Table::from_path(path)?)
    }

    /// Group-membership column names.
    pub fn group_columns(&self) -> &[String] {
        &self.group_columns
    }

    pub fn clusters(&self) -> &[ClusterRecord] {
        &self.clusters
    }

    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Position of a group-membership column.
    pub fn group_index(&self, group: &str) -> Option<usize> {
        self.group_columns.iter().position(|g| g == group)
    }

    /// (filename, group) pairs from clusters attributed to exactly one group.
    ///
    /// When `groups` is given only those labels are used.
    pub fn default_group_assignments(&self, groups: Option<&[String]>) -> Vec<(String, String)> {
        self.clusters
            .iter()
            .filter(|c| c.default_groups.len() == 1)
            .filter(|c| groups.map_or(true, |g| g.contains(&c.default_groups[0])))
            .flat_map(|c| {
                let group = c.default_groups[0].clone();
                c.source_files
                    .iter()
                    .map(move |f| (f.clone(), group.clone()))
            })
            .collect()
    }
}

fn split_source_files(value: &str) -> Vec<String> {
    value
        .split(SOURCE_FILE_DELIMITER)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(strip_spectral_extension)
        .collect()
}

fn split_default_groups(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(String::from)
        .collect()
}

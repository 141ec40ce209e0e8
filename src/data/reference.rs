//! Reference ontology metadata: one row per reference file with ordered
//! ontology levels, from most general to most specific.

use crate::data::table::{
    load_metadata, strip_spectral_extension, MetadataKind, Table, FILENAME_COLUMN,
};
use crate::error::{RddError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

/// Column holding the reference's own descriptive name.
pub const SAMPLE_NAME_COLUMN: &str = "sample_name";

/// Accepted names for the simple/complex categorical column, in lookup order.
pub const SAMPLE_TYPE_COLUMNS: [&str; 2] = ["sample_type", "simple_complex"];

/// Restriction on which reference rows participate in counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleTypeFilter {
    /// Every reference file.
    #[default]
    All,
    /// Single-ingredient references.
    Simple,
    /// Multi-ingredient references.
    Complex,
}

impl SampleTypeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleTypeFilter::All => "all",
            SampleTypeFilter::Simple => "simple",
            SampleTypeFilter::Complex => "complex",
        }
    }
}

impl fmt::Display for SampleTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleTypeFilter {
    type Err = RddError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(SampleTypeFilter::All),
            "simple" => Ok(SampleTypeFilter::Simple),
            "complex" => Ok(SampleTypeFilter::Complex),
            other => Err(RddError::InvalidParameter(format!(
                "Unknown sample type '{}': expected all, simple or complex",
                other
            ))),
        }
    }
}

/// One reference file and its ontology path.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceFile {
    pub filename: String,
    pub sample_name: Option<String>,
    pub sample_type: Option<String>,
    /// Category per ontology level; index 0 is level 1.
    pub ontology: Vec<Option<String>>,
}

impl ReferenceFile {
    /// Category at a 1-based ontology level.
    pub fn category(&self, level: usize) -> Option<&str> {
        if level == 0 {
            return None;
        }
        self.ontology.get(level - 1).and_then(|c| c.as_deref())
    }
}

/// Reference ontology table keyed by normalized filename.
#[derive(Debug, Clone)]
pub struct ReferenceMetadata {
    ontology_columns: Vec<String>,
    files: Vec<ReferenceFile>,
    index: HashMap<String, usize>,
    /// Reference files removed by a sample-type filter. They are still
    /// reference files and never count as samples.
    excluded: HashSet<String>,
}

impl ReferenceMetadata {
    /// Build from a loaded table.
    ///
    /// When `ontology_columns` is `None`, the `sample_type_group<N>` columns are
    /// used in numeric order. A custom list must only name columns present in
    /// the table.
    pub fn from_table(table: &Table, ontology_columns: Option<&[String]>) -> Result<Self> {
        let filename_col = table.require_column(FILENAME_COLUMN)?;

        let ontology_columns = match ontology_columns {
            Some(custom) => {
                let missing: Vec<&str> = custom
                    .iter()
                    .filter(|c| !table.has_column(c))
                    .map(String::as_str)
                    .collect();
                if !missing.is_empty() {
                    return Err(RddError::Config(format!(
                        "Ontology columns not found in reference metadata: {}",
                        missing.join(", ")
                    )));
                }
                custom.to_vec()
            }
            None => default_ontology_columns(table.columns()),
        };
        let ontology_idx: Vec<usize> = ontology_columns
            .iter()
            .map(|c| table.require_column(c))
            .collect::<Result<_>>()?;

        let name_col = table.column_index(SAMPLE_NAME_COLUMN);
        let type_col = SAMPLE_TYPE_COLUMNS
            .iter()
            .find_map(|c| table.column_index(c));

        let mut files = Vec::with_capacity(table.n_rows());
        let mut index = HashMap::new();
        for row in 0..table.n_rows() {
            let Some(filename) = table.get(row, filename_col) else {
                continue;
            };
            let file = ReferenceFile {
                filename: strip_spectral_extension(filename),
                sample_name: name_col.and_then(|c| table.get(row, c)).map(String::from),
                sample_type: type_col.and_then(|c| table.get(row, c)).map(String::from),
                ontology: ontology_idx
                    .iter()
                    .map(|&c| table.get(row, c).map(String::from))
                    .collect(),
            };
            index.entry(file.filename.clone()).or_insert(files.len());
            files.push(file);
        }

        Ok(Self {
            ontology_columns,
            files,
            index,
            excluded: HashSet::new(),
        })
    }

    /// Load from a file, or the bundled foodomics ontology when `path` is `None`.
    pub fn load(path: Option<&Path>, ontology_columns: Option<&[String]>) -> Result<Self> {
        let table = load_metadata(path, MetadataKind::Reference)?;
        Self::from_table(&table, ontology_columns)
    }

    /// The bundled reference ontology.
    pub fn bundled() -> Result<Self> {
        Self::load(None, None)
    }

    /// Restrict to simple or complex references.
    ///
    /// Filtered-out files are no longer matched, but
    /// [`ReferenceMetadata::is_reference_file`] still recognizes them.
    pub fn filter_sample_type(&self, filter: SampleTypeFilter) -> Result<Self> {
        if filter == SampleTypeFilter::All {
            return Ok(self.clone());
        }
        if self.files.iter().all(|f| f.sample_type.is_none()) {
            return Err(RddError::Config(format!(
                "Reference metadata has no {} column; cannot filter on '{}'",
                SAMPLE_TYPE_COLUMNS.join("/"),
                filter
            )));
        }
        let (files, dropped): (Vec<ReferenceFile>, Vec<ReferenceFile>) =
            self.files.iter().cloned().partition(|f| {
                f.sample_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(filter.as_str()))
            });
        let mut excluded = self.excluded.clone();
        excluded.extend(dropped.into_iter().map(|f| f.filename));
        Ok(Self::from_files(self.ontology_columns.clone(), files, excluded))
    }

    fn from_files(
        ontology_columns: Vec<String>,
        files: Vec<ReferenceFile>,
        mut excluded: HashSet<String>,
    ) -> Self {
        let mut index = HashMap::new();
        for (i, f) in files.iter().enumerate() {
            index.entry(f.filename.clone()).or_insert(i);
        }
        excluded.retain(|f| !index.contains_key(f));
        Self {
            ontology_columns,
            files,
            index,
            excluded,
        }
    }

    /// Ontology column names, level 1 first.
    pub fn ontology_columns(&self) -> &[String] {
        &self.ontology_columns
    }

    /// Number of ontology levels available.
    pub fn n_levels(&self) -> usize {
        self.ontology_columns.len()
    }

    /// Clamp a requested depth to the available number of ontology levels.
    pub fn effective_levels(&self, requested: usize) -> usize {
        requested.min(self.n_levels())
    }

    /// Number of reference files.
    pub fn n_files(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[ReferenceFile] {
        &self.files
    }

    /// Look up a reference by normalized filename.
    pub fn get(&self, filename: &str) -> Option<&ReferenceFile> {
        self.index.get(filename).map(|&i| &self.files[i])
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.index.contains_key(filename)
    }

    /// True for any reference file, including those removed by
    /// [`ReferenceMetadata::filter_sample_type`].
    pub fn is_reference_file(&self, filename: &str) -> bool {
        self.contains(filename) || self.excluded.contains(filename)
    }

    /// Map each category at `level + 1` to its parent category at `level`.
    ///
    /// The first reference seen for a child category decides its parent.
    pub fn parent_map(&self, level: usize) -> HashMap<String, String> {
        let mut parents = HashMap::new();
        for file in &self.files {
            if let (Some(parent), Some(child)) = (file.category(level), file.category(level + 1)) {
                parents
                    .entry(child.to_string())
                    .or_insert_with(|| parent.to_string());
            }
        }
        parents
    }
}

fn ontology_column_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^sample_type_group(\d+)$").expect("ontology column pattern is valid")
    })
}

/// `sample_type_group<N>` columns sorted by N.
fn default_ontology_columns(columns: &[String]) -> Vec<String> {
    let pattern = ontology_column_pattern();
    let mut numbered: Vec<(usize, String)> = columns
        .iter()
        .filter_map(|c| {
            let caps = pattern.captures(c)?;
            let n = caps[1].parse::<usize>().ok()?;
            Some((n, c.clone()))
        })
        .collect();
    numbered.sort();
    numbered.into_iter().map(|(_, c)| c).collect()
}

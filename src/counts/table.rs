//! Long-form RDD count table: one row per (filename, reference_type, level).

use crate::data::SampleMetadata;
use crate::error::{RddError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Reference type used for level-0 rows (total matches per file).
pub const FILE_COUNT_TYPE: &str = "file_count";

/// Header of the TSV form, in [`CountRow`] field order.
pub const COUNT_COLUMNS: [&str; 5] = ["filename", "reference_type", "count", "level", "group"];

/// One row of the count table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CountRow {
    pub filename: String,
    /// Category at `level`; `None` when the reference has no value there.
    pub reference_type: Option<String>,
    pub count: u64,
    pub level: usize,
    /// Label from the active grouping column; `None` when unresolved.
    pub group: Option<String>,
}

/// The canonical long-form count table.
///
/// Counts, levels and reference types are fixed at construction. Only the
/// `group` column can change afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountTable {
    rows: Vec<CountRow>,
}

impl CountTable {
    pub fn new(rows: Vec<CountRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CountRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Deepest level present in the table.
    pub fn max_level(&self) -> usize {
        self.rows.iter().map(|r| r.level).max().unwrap_or(0)
    }

    /// Rows at one level.
    pub fn at_level(&self, level: usize) -> impl Iterator<Item = &CountRow> + '_ {
        self.rows.iter().filter(move |r| r.level == level)
    }

    /// Distinct filenames, sorted.
    pub fn filenames(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.filename.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct reference types at a level, sorted, with `None` first.
    pub fn reference_types(&self, level: usize) -> Vec<Option<String>> {
        self.at_level(level)
            .map(|r| r.reference_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sum of counts for a filename at a level.
    pub fn total(&self, filename: &str, level: usize) -> u64 {
        self.at_level(level)
            .filter(|r| r.filename == filename)
            .map(|r| r.count)
            .sum()
    }

    /// Sum of counts per reference type at a level.
    pub fn totals_by_type(&self, level: usize) -> HashMap<Option<String>, u64> {
        let mut totals = HashMap::new();
        for row in self.at_level(level) {
            *totals.entry(row.reference_type.clone()).or_insert(0) += row.count;
        }
        totals
    }

    /// Restrict to one level and optionally to chosen reference types.
    ///
    /// With `top_n`, only the `top_n` reference types with the highest total
    /// count are kept (ties broken by name). `reference_types` is applied first.
    pub fn filter_counts(
        &self,
        level: usize,
        reference_types: Option<&[String]>,
        top_n: Option<usize>,
    ) -> CountTable {
        let wanted: Option<BTreeSet<&str>> =
            reference_types.map(|types| types.iter().map(String::as_str).collect());
        let mut rows: Vec<CountRow> = self
            .at_level(level)
            .filter(|r| match (&wanted, r.reference_type.as_deref()) {
                (None, _) => true,
                (Some(w), Some(t)) => w.contains(t),
                (Some(_), None) => false,
            })
            .cloned()
            .collect();

        if let Some(n) = top_n {
            let mut totals: HashMap<Option<String>, u64> = HashMap::new();
            for row in &rows {
                *totals.entry(row.reference_type.clone()).or_insert(0) += row.count;
            }
            let mut ranked: Vec<(Option<String>, u64)> = totals.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let keep: BTreeSet<Option<String>> =
                ranked.into_iter().take(n).map(|(t, _)| t).collect();
            rows.retain(|r| keep.contains(&r.reference_type));
        }

        CountTable::new(rows)
    }

    /// Resolve every row's group through the active grouping column.
    pub(crate) fn attach_groups(&mut self, samples: &SampleMetadata) {
        for row in &mut self.rows {
            row.group = samples.group_of(&row.filename).map(String::from);
        }
    }

    /// Overwrite the group of rows whose filename appears in `mapping`.
    pub(crate) fn overwrite_groups(&mut self, mapping: &HashMap<String, String>) {
        for row in &mut self.rows {
            if let Some(group) = mapping.get(&row.filename) {
                row.group = Some(group.clone());
            }
        }
    }

    /// Rename group labels; labels absent from `names` are kept.
    pub fn rename_groups(&mut self, names: &HashMap<String, String>) {
        for row in &mut self.rows {
            if let Some(new) = row.group.as_ref().and_then(|g| names.get(g)) {
                row.group = Some(new.clone());
            }
        }
    }

    /// Read a count table previously written with [`CountTable::to_tsv`].
    ///
    /// A header without rows is an empty table.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        if let Some(missing) = COUNT_COLUMNS.iter().find(|c| !headers.iter().any(|h| h == **c)) {
            return Err(RddError::MissingColumn(missing.to_string()));
        }
        let rows = csv_reader
            .deserialize()
            .collect::<std::result::Result<Vec<CountRow>, _>>()?;
        Ok(Self::new(rows))
    }

    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Write as tab-separated text with a header row.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(writer);
        csv_writer.write_record(COUNT_COLUMNS)?;
        for row in &self.rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.to_writer(BufWriter::new(file))
    }
}

//! Delimited tabular input: delimiter inference, loading and identifier normalization.

use crate::error::{RddError, Result};
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::OnceLock;

/// Name of the identifier column shared by every metadata table.
pub const FILENAME_COLUMN: &str = "filename";

/// Reference ontology bundled with the crate (foodomics-style, six levels).
const DEFAULT_REFERENCE_METADATA: &str =
    include_str!("../../data/foodomics_reference_metadata.tsv");

/// Which metadata table is being loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// Reference ontology table (falls back to the bundled table).
    Reference,
    /// Experimental sample metadata (no bundled default).
    Sample,
}

/// An in-memory delimited table with a header row.
///
/// All cells are stored as trimmed strings; an empty cell is a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table from a header and rows.
    ///
    /// Short rows are padded with missing values and long rows are truncated
    /// to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if columns.is_empty() {
            return Err(RddError::EmptyResult("table has no columns".to_string()));
        }
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row.iter_mut().for_each(|cell| *cell = cell.trim().to_string());
                row
            })
            .collect();
        let columns = columns.into_iter().map(|c| c.trim().to_string()).collect();
        Ok(Self { columns, rows })
    }

    /// Read a table from any reader using the given delimiter.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let columns: Vec<String> = csv_reader.headers()?.iter().map(String::from).collect();
        if columns.iter().all(|c| c.is_empty()) {
            return Err(RddError::EmptyResult("table has no header".to_string()));
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            if record.iter().all(|cell| cell.is_empty()) {
                continue;
            }
            rows.push(record.iter().map(String::from).collect());
        }
        Self::new(columns, rows)
    }

    /// Parse a table held in memory. Comma is the default delimiter.
    pub fn parse(text: &str, delimiter: Option<u8>) -> Result<Self> {
        Self::from_reader(text.as_bytes(), delimiter.unwrap_or(b','))
    }

    /// Load a table from a `.csv`, `.tsv` or `.txt` file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let delimiter = delimiter_for(path)?;
        if !path.is_file() {
            return Err(RddError::NotFound(path.display().to_string()));
        }
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), delimiter)
    }

    /// Write the table with the given delimiter.
    pub fn to_writer<W: Write>(&self, writer: W, delimiter: u8) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);
        csv_writer.write_record(&self.columns)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows.
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Position of a column in the header.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Position of a column, failing with `MissingColumn` if absent.
    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| RddError::MissingColumn(column.to_string()))
    }

    /// Cell value, `None` when missing.
    pub fn get(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// All values of a named column, `None` for missing cells.
    pub fn column(&self, column: &str) -> Result<Vec<Option<&str>>> {
        let col = self.require_column(column)?;
        Ok((0..self.n_rows()).map(|row| self.get(row, col)).collect())
    }

    /// Rows as slices of cells.
    pub fn rows(&self) -> impl Iterator<Item = &[String]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Strip spectral file extensions from every value of a column.
    pub fn normalize_filenames(&mut self, column: &str) -> Result<()> {
        let col = self.require_column(column)?;
        for row in &mut self.rows {
            row[col] = strip_spectral_extension(&row[col]);
        }
        Ok(())
    }
}

/// Infer the delimiter from a file extension.
///
/// `.csv` is comma separated, `.tsv` and `.txt` are tab separated. Anything
/// else fails with a format error.
pub fn delimiter_for(path: &Path) -> Result<u8> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("csv") => Ok(b','),
        Some("tsv") | Some("txt") => Ok(b'\t'),
        _ => Err(RddError::Format {
            path: path.display().to_string(),
        }),
    }
}

fn spectral_extension() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\.(mzml|mzxml|mgf)$").expect("spectral extension pattern is valid")
    })
}

/// Remove a trailing `.mzML`, `.mzXML` or `.mgf` extension (any case).
pub fn strip_spectral_extension(filename: &str) -> String {
    spectral_extension().replace(filename.trim(), "").into_owned()
}

/// Load a metadata table from a path, or the bundled reference table when no
/// path is given.
///
/// Whitespace is stripped from every cell and the `filename` column is
/// normalized so identifiers match the clustering output.
pub fn load_metadata(path: Option<&Path>, kind: MetadataKind) -> Result<Table> {
    let mut table = match (path, kind) {
        (Some(path), _) => Table::from_path(path)?,
        (None, MetadataKind::Reference) => Table::parse(DEFAULT_REFERENCE_METADATA, Some(b'\t'))?,
        (None, MetadataKind::Sample) => {
            return Err(RddError::Config(
                "sample metadata has no bundled default; a path is required".to_string(),
            ))
        }
    };
    table.normalize_filenames(FILENAME_COLUMN)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_strip_spectral_extension() {
        assert_eq!(strip_spectral_extension("file.mzML"), "file");
        assert_eq!(strip_spectral_extension("file.mzXML"), "file");
        assert_eq!(strip_spectral_extension("file.MGF"), "file");
        assert_eq!(strip_spectral_extension("file.mzml"), "file");
        assert_eq!(strip_spectral_extension("file.txt"), "file.txt");
        assert_eq!(strip_spectral_extension(" sample.mzML "), "sample");
    }

    #[test]
    fn test_delimiter_inference() {
        assert_eq!(delimiter_for(Path::new("a.csv")).unwrap(), b',');
        assert_eq!(delimiter_for(Path::new("a.TSV")).unwrap(), b'\t');
        assert_eq!(delimiter_for(Path::new("a.txt")).unwrap(), b'\t');
        assert!(matches!(
            delimiter_for(Path::new("a.xyz")),
            Err(RddError::Format { .. })
        ));
    }

    #[test]
    fn test_load_bundled_reference() {
        let table = load_metadata(None, MetadataKind::Reference).unwrap();
        assert!(table.has_column("filename"));
        assert!(table.has_column("sample_type_group6"));
        assert!(table.n_rows() > 0);
        for name in table.column("filename").unwrap().into_iter().flatten() {
            assert!(!name.to_lowercase().ends_with(".mzml"));
        }
    }

    #[test]
    fn test_invalid_format() {
        let mut file = Builder::new().suffix(".xyz").tempfile().unwrap();
        writeln!(file, "data").unwrap();
        let err = load_metadata(Some(file.path()), MetadataKind::Reference).unwrap_err();
        assert!(matches!(err, RddError::Format { .. }));
    }

    #[test]
    fn test_file_not_found() {
        let err = load_metadata(Some(Path::new("/nonexistent/file.csv")), MetadataKind::Sample)
            .unwrap_err();
        assert!(matches!(err, RddError::NotFound(_)));
    }

    #[test]
    fn test_sample_metadata_requires_path() {
        let err = load_metadata(None, MetadataKind::Sample).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_load_trims_and_normalizes() {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "filename, group ").unwrap();
        writeln!(file, " s1.mzML ,  control").unwrap();
        writeln!(file, "s2.mzXML,treatment").unwrap();
        file.flush().unwrap();

        let table = load_metadata(Some(file.path()), MetadataKind::Sample).unwrap();
        assert_eq!(table.columns(), &["filename", "group"]);
        assert_eq!(
            table.column("filename").unwrap(),
            vec![Some("s1"), Some("s2")]
        );
        assert_eq!(table.column("group").unwrap(), vec![Some("control"), Some("treatment")]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = Table::parse("a\tb\tc\n1\t2\n", Some(b'\t')).unwrap();
        assert_eq!(table.get(0, 1), Some("2"));
        assert_eq!(table.get(0, 2), None);
    }

    #[test]
    fn test_missing_column() {
        let table = Table::parse("a,b\n1,2\n", None).unwrap();
        assert!(matches!(
            table.require_column("filename"),
            Err(RddError::MissingColumn(_))
        ));
    }
}

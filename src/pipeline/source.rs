//! Retrieval of already-fetched network tables by task identifier.

use crate::data::Table;
use crate::error::{RddError, Result};
use std::path::PathBuf;

/// Supplies the clustering table of a remote network job.
///
/// Implementations own the transport; the engine only sees the table.
pub trait NetworkSource {
    fn fetch(&self, task_id: &str) -> Result<Table>;
}

impl<F> NetworkSource for F
where
    F: Fn(&str) -> Result<Table>,
{
    fn fetch(&self, task_id: &str) -> Result<Table> {
        self(task_id)
    }
}

/// Reads `<task_id>.tsv` or `<task_id>.csv` from a local directory of
/// previously downloaded network tables.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }
}

impl NetworkSource for DirectorySource {
    fn fetch(&self, task_id: &str) -> Result<Table> {
        if task_id.is_empty() || task_id.contains(['/', '\\']) {
            return Err(RddError::InvalidParameter(format!(
                "Invalid task id '{}'",
                task_id
            )));
        }
        for ext in ["tsv", "csv"] {
            let path = self.dir.join(format!("{}.{}", task_id, ext));
            if path.is_file() {
                return Table::from_path(&path);
            }
        }
        Err(RddError::NotFound(format!(
            "No network table for task '{}' in {}",
            task_id,
            self.dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_directory_source() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("abc.tsv"),
            "G1\tUniqueFileSources\n1\ta.mzML|b.mzML\n",
        )
        .unwrap();
        let source = DirectorySource::new(dir.path());
        let table = source.fetch("abc").unwrap();
        assert_eq!(table.n_rows(), 1);
        assert!(matches!(source.fetch("missing"), Err(RddError::NotFound(_))));
        assert!(source.fetch("../abc").is_err());
    }

    #[test]
    fn test_closure_source() {
        let source = |task_id: &str| Table::parse(&format!("filename\n{}\n", task_id), None);
        let table = source.fetch("xyz").unwrap();
        assert_eq!(table.get(0, 0), Some("xyz"));
    }
}

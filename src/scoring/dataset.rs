//! In-memory tabular dataset with an explicit column schema.

use std::collections::HashMap;
use std::path::Path;

use super::error::{PipelineError, PipelineResult};

/// Ordered column names with O(1) lookup by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl DatasetSchema {
    pub fn new(columns: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            // First occurrence wins for duplicated header names
            index.entry(name.clone()).or_insert(i);
        }
        Self { columns, index }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Rows of raw string cells under a schema.
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: DatasetSchema,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset from already-split cells.
    ///
    /// Every row must have one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self {
            schema: DatasetSchema::new(columns),
            rows,
        }
    }

    /// Read a whole CSV file. An empty body is valid; a missing header is not.
    pub fn read_csv(path: &Path) -> PipelineResult<Self> {
        let to_error = |source| PipelineError::DatasetRead {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(to_error)?;
        let columns: Vec<String> = reader
            .headers()
            .map_err(to_error)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        if columns.is_empty() {
            return Err(PipelineError::MissingHeader {
                path: path.to_path_buf(),
            });
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(to_error)?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        tracing::debug!(
            "[dataset] loaded {} rows x {} columns from {}",
            rows.len(),
            columns.len(),
            path.display()
        );

        Ok(Self::new(columns, rows))
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of one column, in row order.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &str>> {
        let position = self.schema.position(name)?;
        Some(self.rows.iter().map(move |row| row[position].as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_read_csv_with_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.csv");
        fs::write(&path, "id, f1 ,f2\n1,0.2,3\n2,0.9,4\n").unwrap();

        let dataset = Dataset::read_csv(&path).unwrap();
        assert_eq!(dataset.schema().columns(), ["id", "f1", "f2"]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.schema().position("f1"), Some(1));
        let ids: Vec<&str> = dataset.column("id").unwrap().collect();
        assert_eq!(ids, ["1", "2"]);
        assert!(dataset.column("missing").is_none());
    }

    #[test]
    fn test_header_only_is_empty_dataset() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.csv");
        fs::write(&path, "id,f1\n").unwrap();

        let dataset = Dataset::read_csv(&path).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.schema().len(), 2);
    }

    #[test]
    fn test_empty_file_has_no_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.csv");
        fs::write(&path, "").unwrap();

        assert!(matches!(
            Dataset::read_csv(&path),
            Err(PipelineError::MissingHeader { .. })
        ));
    }

    #[test]
    fn test_ragged_rows_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.csv");
        fs::write(&path, "id,f1\n1,0.2\n2\n").unwrap();

        assert!(matches!(
            Dataset::read_csv(&path),
            Err(PipelineError::DatasetRead { .. })
        ));
    }

    #[test]
    fn test_duplicate_header_resolves_to_first() {
        let schema = DatasetSchema::new(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(schema.position("a"), Some(0));
        assert!(schema.contains("b"));
    }
}

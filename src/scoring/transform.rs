//! Feature extraction from a raw dataset.

use super::dataset::Dataset;
use super::error::{PipelineError, PipelineResult};
use crate::config::DataConfig;

/// Dense row-major matrix of model inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }
}

/// Deterministic mapping from a dataset to the matrix a classifier expects.
///
/// Implementations must not reorder or rename columns to suit a model; the
/// pipeline compares the output columns against the classifier and fails
/// on any difference.
pub trait FeatureTransformer: Send + Sync {
    fn transform(&self, dataset: &Dataset, data: &DataConfig) -> PipelineResult<FeatureMatrix>;
}

/// Uses every column except the id and target columns as a numeric feature.
///
/// Empty cells become `NaN`; any other unparseable cell is an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct NumericFeatureTransformer;

impl FeatureTransformer for NumericFeatureTransformer {
    fn transform(&self, dataset: &Dataset, data: &DataConfig) -> PipelineResult<FeatureMatrix> {
        let selected: Vec<(usize, &String)> = dataset
            .schema()
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, name)| **name != data.id_col && **name != data.target_col)
            .collect();

        let mut rows = Vec::with_capacity(dataset.len());
        for (row_index, row) in dataset.rows().iter().enumerate() {
            let mut values = Vec::with_capacity(selected.len());
            for &(position, name) in &selected {
                values.push(parse_cell(&row[position], name, row_index)?);
            }
            rows.push(values);
        }

        let columns = selected.into_iter().map(|(_, name)| name.clone()).collect();
        Ok(FeatureMatrix::new(columns, rows))
    }
}

fn parse_cell(raw: &str, column: &str, row: usize) -> PipelineResult<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(f64::NAN);
    }

    // `inf` and `NaN` parse but are not usable feature values
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(PipelineError::Transform {
            column: column.to_string(),
            row,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(columns: &[&str], rows: &[&[&str]]) -> Dataset {
        Dataset::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_excludes_id_and_target_columns() {
        let data = DataConfig::default();
        let ds = dataset(
            &["id", "f1", "label", "f2"],
            &[&["1", "0.2", "1", "3"], &["2", "0.9", "0", "-1.5"]],
        );

        let matrix = NumericFeatureTransformer.transform(&ds, &data).unwrap();
        assert_eq!(matrix.columns(), ["f1", "f2"]);
        assert_eq!(matrix.rows(), [vec![0.2, 3.0], vec![0.9, -1.5]]);
    }

    #[test]
    fn test_empty_cell_becomes_nan() {
        let ds = dataset(&["f1"], &[&[" "]]);
        let matrix = NumericFeatureTransformer
            .transform(&ds, &DataConfig::default())
            .unwrap();
        assert!(matrix.rows()[0][0].is_nan());
    }

    #[test]
    fn test_non_numeric_cell_names_column_and_row() {
        let ds = dataset(&["id", "f1"], &[&["1", "0.5"], &["2", "abc"]]);
        let err = NumericFeatureTransformer
            .transform(&ds, &DataConfig::default())
            .unwrap_err();

        match err {
            PipelineError::Transform { column, row, value } => {
                assert_eq!(column, "f1");
                assert_eq!(row, 1);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_finite_tokens_are_rejected() {
        for token in ["inf", "-inf", "NaN", "infinity"] {
            let ds = dataset(&["f1"], &[&["0.5"], &[token]]);
            let err = NumericFeatureTransformer
                .transform(&ds, &DataConfig::default())
                .unwrap_err();
            assert!(
                matches!(err, PipelineError::Transform { row: 1, ref value, .. } if value == token),
                "{token}: {err}"
            );
        }
    }

    #[test]
    fn test_is_deterministic() {
        let ds = dataset(&["id", "f1", "f2"], &[&["1", "1e-3", "2"]]);
        let data = DataConfig::default();
        assert_eq!(
            NumericFeatureTransformer.transform(&ds, &data).unwrap(),
            NumericFeatureTransformer.transform(&ds, &data).unwrap()
        );
    }
}

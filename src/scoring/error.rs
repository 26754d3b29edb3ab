use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a scoring run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cannot read dataset {path}: {source}")]
    DatasetRead {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Dataset {path} has no header row")]
    MissingHeader { path: PathBuf },

    #[error("Column '{column}' row {row}: cannot parse '{value}' as a finite number")]
    Transform {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Model artifact not found at {path}")]
    ModelMissing { path: PathBuf },

    #[error("Model artifact {path} is unusable: {reason}")]
    ModelCorrupt { path: PathBuf, reason: String },

    #[error("Feature columns {actual:?} do not match the model's expected {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Classifier returned {actual} probabilities for {expected} rows")]
    PredictionCount { expected: usize, actual: usize },

    #[error("Failed to encode {artifact}: {reason}")]
    Encode {
        artifact: &'static str,
        reason: String,
    },

    #[error("Failed to write artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;

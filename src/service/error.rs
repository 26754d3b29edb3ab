//! Error types for per-run processing.

use std::path::PathBuf;
use thiserror::Error;

use crate::scoring::{PipelineError, ScoreSummary};

/// The uploaded file is not readable as tabular data.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Cannot parse {path} as CSV: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} has no header row")]
    MissingHeader { path: PathBuf },
}

/// The validated file could not be copied to the staged path.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Cannot stage {from} as {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure after the settle delay.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Staging(#[from] StageError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Scoring task did not complete: {0}")]
    Worker(String),
}

/// Stage at which a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    Validation,
    Staging,
    Pipeline,
    Worker,
}

impl RunError {
    pub fn kind(&self) -> RunErrorKind {
        match self {
            RunError::Validation(_) => RunErrorKind::Validation,
            RunError::Staging(_) => RunErrorKind::Staging,
            RunError::Pipeline(_) => RunErrorKind::Pipeline,
            RunError::Worker(_) => RunErrorKind::Worker,
        }
    }
}

/// How a single processing request ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The file was gone before or right after the settle delay.
    Vanished,
    /// Header check failed; nothing was staged or scored.
    Rejected(ValidationError),
    /// Staging or scoring failed; prior artifacts are untouched.
    Failed(RunError),
    Completed(ScoreSummary),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_variant() {
        let err: RunError = ValidationError::MissingHeader {
            path: PathBuf::from("input/test.csv"),
        }
        .into();
        assert_eq!(err.kind(), RunErrorKind::Validation);
        assert_eq!(err.to_string(), "input/test.csv has no header row");

        let err: RunError = PipelineError::ModelMissing {
            path: PathBuf::from("models/model.json"),
        }
        .into();
        assert_eq!(err.kind(), RunErrorKind::Pipeline);

        assert_eq!(RunError::Worker("panic".into()).kind(), RunErrorKind::Worker);
    }
}

//! Per-file processing: settle, validate, stage, score.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::NamedTempFile;

use super::error::{RunError, RunOutcome, StageError, ValidationError};
use crate::config::Settings;
use crate::scoring::{ScoreSummary, Scorer};

/// Runs one arrival through the full processing sequence.
///
/// Every failure is caught here; [`ProcessingService::handle`] always
/// returns to the caller with an outcome.
pub struct ProcessingService {
    staged_path: PathBuf,
    settle_delay: Duration,
    scorer: Arc<dyn Scorer>,
}

impl ProcessingService {
    pub fn new(settings: &Settings, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            staged_path: settings.staged_path(),
            settle_delay: settings.watch.settle_delay(),
            scorer,
        }
    }

    /// Override the grace period before the file is read.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }

    /// Process `path` and log the result.
    pub async fn handle(&self, path: &Path) -> RunOutcome {
        if !path.exists() {
            crate::log_event!("service", "vanished", "{}", path.display());
            return RunOutcome::Vanished;
        }

        // Let the uploader finish writing
        tokio::time::sleep(self.settle_delay).await;

        if !path.exists() {
            crate::log_event!("service", "vanished", "{} (during settle delay)", path.display());
            return RunOutcome::Vanished;
        }

        crate::log_event!("service", "processing", "{}", path.display());
        let outcome = match self.process(path).await {
            Ok(summary) => RunOutcome::Completed(summary),
            // Deleted between the check and the open
            Err(RunError::Validation(_)) if !path.exists() => RunOutcome::Vanished,
            Err(RunError::Validation(e)) => RunOutcome::Rejected(e),
            Err(e) => RunOutcome::Failed(e),
        };

        match &outcome {
            RunOutcome::Completed(summary) => crate::log_event!(
                "service",
                "completed",
                "{} rows, {} positive",
                summary.rows,
                summary.positives
            ),
            RunOutcome::Rejected(e) => {
                tracing::error!("[service] rejected {}: {e}", path.display());
            }
            RunOutcome::Failed(e) => {
                tracing::error!(
                    "[service] {:?} failure for {}: {e}",
                    e.kind(),
                    path.display()
                );
            }
            RunOutcome::Vanished => {
                crate::log_event!("service", "vanished", "{}", path.display());
            }
        }

        outcome
    }

    /// Validate, stage and score on the blocking pool.
    async fn process(&self, path: &Path) -> Result<ScoreSummary, RunError> {
        let scorer = Arc::clone(&self.scorer);
        let upload = path.to_path_buf();
        let staged = self.staged_path.clone();

        tokio::task::spawn_blocking(move || -> Result<ScoreSummary, RunError> {
            validate_header(&upload)?;
            stage(&upload, &staged)?;
            crate::debug_event!("service", "staged", "{}", staged.display());
            Ok(scorer.score(&staged)?)
        })
        .await
        .map_err(|e| RunError::Worker(e.to_string()))?
    }
}

/// Parse the header and at most one record.
///
/// A header-only file is valid and scores to an empty prediction table.
pub fn validate_header(path: &Path) -> Result<(), ValidationError> {
    let to_error = |source| ValidationError::Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(to_error)?;
    if reader.headers().map_err(to_error)?.is_empty() {
        return Err(ValidationError::MissingHeader {
            path: path.to_path_buf(),
        });
    }

    if let Some(record) = reader.records().next() {
        record.map_err(to_error)?;
    }

    Ok(())
}

/// Copy the raw bytes of `from` over `to`.
///
/// The copy lands in a temp file next to `to` and is renamed into place, so
/// readers of `to` never observe a partial file.
pub fn stage(from: &Path, to: &Path) -> Result<(), StageError> {
    if from == to {
        return Ok(());
    }

    let to_error = |source| StageError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let bytes = std::fs::read(from).map_err(to_error)?;
    let dir = to.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(to_error)?;
    tmp.write_all(&bytes).map_err(to_error)?;
    tmp.as_file().sync_all().map_err(to_error)?;
    tmp.persist(to).map_err(|e| to_error(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_header_accepts_header_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.csv");
        std::fs::write(&path, "id,f1\n").unwrap();

        assert!(validate_header(&path).is_ok());
    }

    #[test]
    fn test_validate_header_rejects_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.csv");
        std::fs::write(&path, "").unwrap();

        assert!(matches!(
            validate_header(&path),
            Err(ValidationError::MissingHeader { .. })
        ));
    }

    #[test]
    fn test_validate_header_rejects_ragged_first_row() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.csv");
        std::fs::write(&path, "id,f1\n1,0.2,extra\n").unwrap();

        assert!(matches!(
            validate_header(&path),
            Err(ValidationError::Unreadable { .. })
        ));
    }

    #[test]
    fn test_validate_header_reads_only_first_row() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.csv");
        // Second row is ragged but never read
        std::fs::write(&path, "id,f1\n1,0.2\n2,0.3,extra\n").unwrap();

        assert!(validate_header(&path).is_ok());
    }

    #[test]
    fn test_stage_overwrites_previous_copy() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("test.csv");
        let to = temp_dir.path().join("test.staged.csv");
        std::fs::write(&to, "old").unwrap();
        std::fs::write(&from, "id,f1\n1,0.2\n").unwrap();

        stage(&from, &to).unwrap();
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "id,f1\n1,0.2\n");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    }
}

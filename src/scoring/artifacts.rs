//! Prediction and diagnostic artifacts.
//!
//! Everything is encoded in memory first. [`ScoringArtifacts::commit`] then
//! writes every file to a temp file in the output directory and renames them
//! only once all writes have succeeded.

use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tempfile::NamedTempFile;

use super::classifier::FeatureImportance;
use super::error::{PipelineError, PipelineResult};

/// File name of the feature-importance document.
pub const FEATURE_IMPORTANCES_FILE: &str = "feature_importances.json";

/// File name of the score-density image.
pub const DENSITY_PLOT_FILE: &str = "scores_density.png";

/// Identifier of a scored row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordId {
    /// Value from the configured id column.
    Column(String),
    /// 0-based row position, used when the id column is absent.
    Position(usize),
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Column(value) => f.write_str(value),
            RecordId::Position(index) => write!(f, "{index}"),
        }
    }
}

/// One output row.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub id: RecordId,
    pub label: u8,
    pub score: f64,
}

/// Inclusive threshold: a probability equal to the threshold is positive.
pub fn label_for(probability: f64, threshold: f64) -> u8 {
    u8::from(probability >= threshold)
}

/// Encode predictions as CSV with header `[id_header, label_header]`.
pub fn encode_predictions(
    records: &[PredictionRecord],
    id_header: &str,
    label_header: &str,
) -> PipelineResult<Vec<u8>> {
    let encode_error = |e: &dyn std::fmt::Display| PipelineError::Encode {
        artifact: "predictions",
        reason: e.to_string(),
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([id_header, label_header])
        .map_err(|e| encode_error(&e))?;
    for record in records {
        writer
            .write_record([record.id.to_string(), record.label.to_string()])
            .map_err(|e| encode_error(&e))?;
    }
    writer.into_inner().map_err(|e| encode_error(&e))
}

/// Encode importances as a pretty JSON object, keeping the given order.
pub fn encode_importances(importances: &[FeatureImportance]) -> PipelineResult<Vec<u8>> {
    let ordered: IndexMap<&str, f64> = importances
        .iter()
        .map(|f| (f.name.as_str(), f.importance))
        .collect();

    serde_json::to_vec_pretty(&ordered).map_err(|e| PipelineError::Encode {
        artifact: "feature importances",
        reason: e.to_string(),
    })
}

/// Fully encoded outputs of one run.
#[derive(Debug, Clone)]
pub struct ScoringArtifacts {
    pub predictions_file: String,
    pub predictions: Vec<u8>,
    pub importances: Option<Vec<u8>>,
    pub density_plot: Option<Vec<u8>>,
}

impl ScoringArtifacts {
    /// Write every artifact into `output_dir`, returning the written paths.
    ///
    /// All temp files are written and synced before the first rename, so a
    /// write failure leaves the previous set of outputs in place.
    pub fn commit(&self, output_dir: &Path) -> PipelineResult<Vec<PathBuf>> {
        self.stage(output_dir)?.persist()
    }

    /// Write every artifact to a temp file in `output_dir` without replacing
    /// anything. Dropping the result removes the temp files.
    pub fn stage(&self, output_dir: &Path) -> PipelineResult<StagedArtifacts> {
        let mut pending = vec![(self.predictions_file.as_str(), &self.predictions)];
        if let Some(bytes) = &self.importances {
            pending.push((FEATURE_IMPORTANCES_FILE, bytes));
        }
        if let Some(bytes) = &self.density_plot {
            pending.push((DENSITY_PLOT_FILE, bytes));
        }

        let files = pending
            .into_iter()
            .map(|(name, bytes)| write_temp(output_dir, name, bytes))
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(StagedArtifacts { files })
    }
}

/// Synced temp files waiting to be renamed over their targets.
#[derive(Debug)]
pub struct StagedArtifacts {
    files: Vec<(NamedTempFile, PathBuf)>,
}

impl StagedArtifacts {
    /// Number of staged files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Rename each temp file over its target, in staging order.
    pub fn persist(self) -> PipelineResult<Vec<PathBuf>> {
        self.files
            .into_iter()
            .map(|(tmp, target)| {
                tmp.persist(&target).map_err(|e| PipelineError::Artifact {
                    path: target.clone(),
                    source: e.error,
                })?;
                Ok(target)
            })
            .collect()
    }
}

/// Write `bytes` to a synced temp file next to `dir/name`.
fn write_temp(
    dir: &Path,
    name: &str,
    bytes: &[u8],
) -> PipelineResult<(NamedTempFile, PathBuf)> {
    let target = dir.join(name);
    let to_error = |source| PipelineError::Artifact {
        path: target.clone(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(to_error)?;
    tmp.write_all(bytes).map_err(to_error)?;
    tmp.as_file().sync_all().map_err(to_error)?;

    Ok((tmp, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_label_threshold_is_inclusive() {
        assert_eq!(label_for(0.5, 0.5), 1);
        assert_eq!(label_for(0.4999, 0.5), 0);
        assert_eq!(label_for(0.0, 0.0), 1);
        assert_eq!(label_for(1.0, 1.0), 1);
        assert_eq!(label_for(f64::NAN, 0.5), 0);
    }

    #[test]
    fn test_encode_predictions() {
        let records = vec![
            PredictionRecord {
                id: RecordId::Column("a-1".to_string()),
                label: 0,
                score: 0.3,
            },
            PredictionRecord {
                id: RecordId::Position(1),
                label: 1,
                score: 0.8,
            },
        ];

        let csv = encode_predictions(&records, "id", "label").unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "id,label\na-1,0\n1,1\n");
    }

    #[test]
    fn test_encode_importances_keeps_order() {
        let imps = vec![
            FeatureImportance {
                name: "zeta".to_string(),
                importance: 60.0,
            },
            FeatureImportance {
                name: "alpha".to_string(),
                importance: 40.0,
            },
        ];

        let json = String::from_utf8(encode_importances(&imps).unwrap()).unwrap();
        let zeta = json.find("zeta").unwrap();
        let alpha = json.find("alpha").unwrap();
        assert!(zeta < alpha);

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["alpha"], 40.0);
    }

    #[test]
    fn test_commit_replaces_existing_and_skips_disabled() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("preds.csv"), "old").unwrap();

        let artifacts = ScoringArtifacts {
            predictions_file: "preds.csv".to_string(),
            predictions: b"id,label\n".to_vec(),
            importances: Some(b"{}".to_vec()),
            density_plot: None,
        };

        let written = artifacts.commit(temp_dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("preds.csv")).unwrap(),
            "id,label\n"
        );
        assert!(temp_dir.path().join(FEATURE_IMPORTANCES_FILE).exists());
        assert!(!temp_dir.path().join(DENSITY_PLOT_FILE).exists());

        // No temp files left behind
        let entries = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 2);
    }

    fn sample_artifacts() -> ScoringArtifacts {
        ScoringArtifacts {
            predictions_file: "preds.csv".to_string(),
            predictions: b"id,label\n1,1\n".to_vec(),
            importances: Some(b"{}".to_vec()),
            density_plot: Some(b"png".to_vec()),
        }
    }

    #[test]
    fn test_staging_leaves_existing_outputs_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let preds = temp_dir.path().join("preds.csv");
        std::fs::write(&preds, "old").unwrap();

        let staged = sample_artifacts().stage(temp_dir.path()).unwrap();
        assert_eq!(staged.len(), 3);
        // Three temp files next to the untouched prediction file
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 4);
        assert_eq!(std::fs::read_to_string(&preds).unwrap(), "old");
        assert!(!temp_dir.path().join(DENSITY_PLOT_FILE).exists());

        // Abandoning the stage removes the temp files
        drop(staged);
        let names: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["preds.csv"]);
        assert_eq!(std::fs::read_to_string(&preds).unwrap(), "old");
    }

    #[test]
    fn test_failed_write_replaces_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone");

        let err = sample_artifacts().commit(&missing).unwrap_err();
        assert!(matches!(err, PipelineError::Artifact { .. }));
        assert!(!missing.exists());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }
}

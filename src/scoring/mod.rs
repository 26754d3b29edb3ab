//! Batch scoring of a staged dataset.
//!
//! ```text
//! staged csv → Dataset → FeatureTransformer → FeatureMatrix
//!                                                  │
//!                   ModelLoader → Classifier ──────┤ predict_proba
//!                                                  ▼
//!                        threshold → predictions.csv
//!                        top-5     → feature_importances.json
//!                        KDE       → scores_density.png
//! ```

pub mod artifacts;
pub mod classifier;
pub mod dataset;
pub mod density;
mod error;
pub mod pipeline;
pub mod transform;

pub use artifacts::{
    DENSITY_PLOT_FILE, FEATURE_IMPORTANCES_FILE, PredictionRecord, RecordId, ScoringArtifacts,
    StagedArtifacts, label_for,
};
pub use classifier::{
    Classifier, FeatureImportance, JsonModelLoader, LogisticModel, ModelLoader, top_importances,
};
pub use dataset::{Dataset, DatasetSchema};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::ScoringPipeline;
pub use transform::{FeatureMatrix, FeatureTransformer, NumericFeatureTransformer};

use std::path::{Path, PathBuf};

/// Outcome of a successful scoring run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub rows: usize,
    pub positives: usize,
    pub artifacts: Vec<PathBuf>,
}

/// Anything that scores a staged dataset.
///
/// Called from a blocking context, one run at a time.
pub trait Scorer: Send + Sync {
    fn score(&self, staged: &Path) -> PipelineResult<ScoreSummary>;
}

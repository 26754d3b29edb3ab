//! Scoring pipeline: load → transform → infer → threshold → write.

use std::path::{Path, PathBuf};

use super::artifacts::{
    PredictionRecord, RecordId, ScoringArtifacts, encode_importances, encode_predictions,
    label_for,
};
use super::classifier::{Classifier, JsonModelLoader, ModelLoader, top_importances};
use super::dataset::Dataset;
use super::density::{DensityCurve, GRID_POINTS, gaussian_kde, render_png};
use super::error::{PipelineError, PipelineResult};
use super::transform::{FeatureMatrix, FeatureTransformer, NumericFeatureTransformer};
use super::{ScoreSummary, Scorer};
use crate::config::{DataConfig, InferenceConfig, Settings};

/// Number of features kept in the importance document.
pub const TOP_FEATURES: usize = 5;

/// Turns a staged dataset into prediction and diagnostic artifacts.
///
/// The model is loaded fresh on every run; nothing is cached between runs.
pub struct ScoringPipeline {
    models_dir: PathBuf,
    output_dir: PathBuf,
    data: DataConfig,
    inference: InferenceConfig,
    transformer: Box<dyn FeatureTransformer>,
    loader: Box<dyn ModelLoader>,
}

impl ScoringPipeline {
    pub fn new(
        settings: &Settings,
        transformer: Box<dyn FeatureTransformer>,
        loader: Box<dyn ModelLoader>,
    ) -> Self {
        Self {
            models_dir: settings.paths.models_dir.clone(),
            output_dir: settings.paths.output_dir.clone(),
            data: settings.data.clone(),
            inference: settings.inference.clone(),
            transformer,
            loader,
        }
    }

    /// Pipeline with the numeric transformer and the JSON model loader.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings,
            Box::new(NumericFeatureTransformer),
            Box::new(JsonModelLoader::new(settings.inference.model_file.clone())),
        )
    }

    /// Score `staged` and commit artifacts to the output directory.
    pub fn run(&self, staged: &Path) -> PipelineResult<ScoreSummary> {
        let dataset = Dataset::read_csv(staged)?;
        crate::log_event!(
            "pipeline",
            "loaded",
            "{} rows from {}",
            dataset.len(),
            staged.display()
        );

        let (artifacts, records) = self.build(&dataset)?;
        let written = artifacts.commit(&self.output_dir)?;

        let summary = ScoreSummary {
            rows: records.len(),
            positives: records.iter().filter(|r| r.label == 1).count(),
            artifacts: written,
        };
        crate::log_event!(
            "pipeline",
            "saved",
            "{} predictions ({} positive) -> {}",
            summary.rows,
            summary.positives,
            summary
                .artifacts
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(summary)
    }

    /// Everything up to, but not including, writing to disk.
    pub fn build(
        &self,
        dataset: &Dataset,
    ) -> PipelineResult<(ScoringArtifacts, Vec<PredictionRecord>)> {
        let matrix = self.transformer.transform(dataset, &self.data)?;
        crate::debug_event!("pipeline", "transformed", "{} features", matrix.columns().len());

        let classifier = self.loader.load(&self.models_dir)?;
        check_feature_contract(classifier.as_ref(), &matrix)?;

        let probabilities = classifier.predict_proba(&matrix)?;
        if probabilities.len() != dataset.len() {
            return Err(PipelineError::PredictionCount {
                expected: dataset.len(),
                actual: probabilities.len(),
            });
        }

        let records = self.records(dataset, &probabilities);
        let predictions =
            encode_predictions(&records, &self.data.id_col, &self.data.target_col)?;

        let importances = if self.inference.produce_feature_importances {
            let top = top_importances(classifier.as_ref(), TOP_FEATURES);
            Some(encode_importances(&top)?)
        } else {
            None
        };

        let density_plot = if self.inference.produce_density_plot {
            let curve = gaussian_kde(&probabilities, GRID_POINTS).unwrap_or_else(|| {
                crate::log_event!("pipeline", "density plot empty", "no scores");
                DensityCurve::empty()
            });
            Some(render_png(&curve, &self.data.target_col)?)
        } else {
            None
        };

        let artifacts = ScoringArtifacts {
            predictions_file: self.data.output_file_name.clone(),
            predictions,
            importances,
            density_plot,
        };
        Ok((artifacts, records))
    }

    /// Pair probabilities with ids and thresholded labels, in row order.
    fn records(&self, dataset: &Dataset, probabilities: &[f64]) -> Vec<PredictionRecord> {
        let threshold = self.inference.threshold;
        let ids: Vec<RecordId> = match dataset.column(&self.data.id_col) {
            Some(values) => values.map(|v| RecordId::Column(v.to_string())).collect(),
            None => {
                crate::debug_event!(
                    "pipeline",
                    "id column absent",
                    "'{}', using row positions",
                    self.data.id_col
                );
                (0..dataset.len()).map(RecordId::Position).collect()
            }
        };

        ids.into_iter()
            .zip(probabilities)
            .map(|(id, &score)| PredictionRecord {
                id,
                label: label_for(score, threshold),
                score,
            })
            .collect()
    }
}

impl Scorer for ScoringPipeline {
    fn score(&self, staged: &Path) -> PipelineResult<ScoreSummary> {
        self.run(staged)
    }
}

/// The transform output must match the model's features exactly, order included.
fn check_feature_contract(
    classifier: &dyn Classifier,
    matrix: &FeatureMatrix,
) -> PipelineResult<()> {
    if classifier.feature_names() == matrix.columns() {
        return Ok(());
    }

    Err(PipelineError::FeatureMismatch {
        expected: classifier.feature_names().to_vec(),
        actual: matrix.columns().to_vec(),
    })
}

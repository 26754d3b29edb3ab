//! Classifier contract and the persisted logistic model.
//!
//! The pipeline only talks to [`Classifier`] and [`ModelLoader`]; the JSON
//! logistic model is the implementation shipped with the binary. A model
//! file looks like:
//!
//! ```json
//! {
//!   "feature_names": ["f1", "f2"],
//!   "weights": [1.5, -0.25],
//!   "intercept": -0.1,
//!   "importances": { "f1": 80.0, "f2": 20.0 }
//! }
//! ```
//!
//! `importances` is optional; without it importance is the absolute weight
//! scaled so all features sum to 100.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use super::error::{PipelineError, PipelineResult};
use super::transform::FeatureMatrix;

/// A named feature with its importance score.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

/// Probability model over a fixed, ordered feature list.
pub trait Classifier: Send + Sync {
    /// Feature columns the model expects, in order.
    fn feature_names(&self) -> &[String];

    /// Probability of the positive class, one per matrix row.
    fn predict_proba(&self, features: &FeatureMatrix) -> PipelineResult<Vec<f64>>;

    /// Importance of every feature, in no particular order.
    fn feature_importances(&self) -> Vec<FeatureImportance>;
}

/// Loads a classifier from the models directory.
pub trait ModelLoader: Send + Sync {
    fn load(&self, models_dir: &Path) -> PipelineResult<Box<dyn Classifier>>;
}

/// Highest `limit` importances, descending. Ties keep model order.
pub fn top_importances(classifier: &dyn Classifier, limit: usize) -> Vec<FeatureImportance> {
    let mut ranked = classifier.feature_importances();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(limit);
    ranked
}

#[derive(Debug, Deserialize)]
struct LogisticModelFile {
    feature_names: Vec<String>,
    weights: Vec<f64>,
    #[serde(default)]
    intercept: f64,
    #[serde(default)]
    importances: Option<IndexMap<String, f64>>,
}

/// Logistic regression: `sigmoid(intercept + Σ wᵢxᵢ)`.
///
/// `NaN` inputs contribute nothing to the sum.
#[derive(Debug, Clone)]
pub struct LogisticModel {
    feature_names: Vec<String>,
    weights: Vec<f64>,
    intercept: f64,
    importances: Vec<FeatureImportance>,
}

impl LogisticModel {
    pub fn new(feature_names: Vec<String>, weights: Vec<f64>, intercept: f64) -> Self {
        let importances = weight_importances(&feature_names, &weights);
        Self {
            feature_names,
            weights,
            intercept,
            importances,
        }
    }

    /// Parse a model document. `path` is used for error context only.
    pub fn from_json(text: &str, path: &Path) -> PipelineResult<Self> {
        let corrupt = |reason: String| PipelineError::ModelCorrupt {
            path: path.to_path_buf(),
            reason,
        };

        let file: LogisticModelFile =
            serde_json::from_str(text).map_err(|e| corrupt(e.to_string()))?;

        if file.feature_names.len() != file.weights.len() {
            return Err(corrupt(format!(
                "{} feature names but {} weights",
                file.feature_names.len(),
                file.weights.len()
            )));
        }
        if !file.intercept.is_finite() || file.weights.iter().any(|w| !w.is_finite()) {
            return Err(corrupt("non-finite coefficient".to_string()));
        }

        let mut model = Self::new(file.feature_names, file.weights, file.intercept);
        if let Some(explicit) = file.importances {
            model.importances = explicit
                .into_iter()
                .map(|(name, importance)| FeatureImportance { name, importance })
                .collect();
        }
        Ok(model)
    }

    fn score_row(&self, row: &[f64]) -> f64 {
        let logit = row
            .iter()
            .zip(&self.weights)
            .filter(|(x, _)| !x.is_nan())
            .fold(self.intercept, |acc, (x, w)| acc + x * w);
        sigmoid(logit)
    }
}

impl Classifier for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &FeatureMatrix) -> PipelineResult<Vec<f64>> {
        if features.columns() != self.feature_names.as_slice() {
            return Err(PipelineError::FeatureMismatch {
                expected: self.feature_names.clone(),
                actual: features.columns().to_vec(),
            });
        }

        Ok(features.rows().iter().map(|row| self.score_row(row)).collect())
    }

    fn feature_importances(&self) -> Vec<FeatureImportance> {
        self.importances.clone()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn weight_importances(names: &[String], weights: &[f64]) -> Vec<FeatureImportance> {
    let total: f64 = weights.iter().map(|w| w.abs()).sum();
    names
        .iter()
        .zip(weights)
        .map(|(name, w)| FeatureImportance {
            name: name.clone(),
            importance: if total > 0.0 {
                w.abs() / total * 100.0
            } else {
                0.0
            },
        })
        .collect()
}

/// Reads `<models_dir>/<file_name>` as a [`LogisticModel`] on every call.
#[derive(Debug, Clone)]
pub struct JsonModelLoader {
    file_name: String,
}

impl JsonModelLoader {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn model_path(&self, models_dir: &Path) -> PathBuf {
        models_dir.join(&self.file_name)
    }
}

impl ModelLoader for JsonModelLoader {
    fn load(&self, models_dir: &Path) -> PipelineResult<Box<dyn Classifier>> {
        let path = self.model_path(models_dir);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::ModelMissing { path });
            }
            Err(e) => {
                return Err(PipelineError::ModelCorrupt {
                    path,
                    reason: e.to_string(),
                });
            }
        };

        let model = LogisticModel::from_json(&text, &path)?;
        crate::debug_event!(
            "classifier",
            "loaded",
            "{} features from {}",
            model.feature_names.len(),
            path.display()
        );
        Ok(Box::new(model))
    }
}

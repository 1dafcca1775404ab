//! Fitting the shared scaler and regressor

use crate::error::Result;
use crate::models::artifact::{ArtifactPaths, ModelArtifact};
use crate::window::TrainingMatrix;
use oracle_math::{ForestParams, RandomForestRegressor, StandardScaler};
use tracing::{info, warn};

/// Summary of a completed fit
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub samples: usize,
    pub window_size: usize,
    pub n_estimators: usize,
    pub oob_score: Option<f64>,
}

/// Result of a training run
#[derive(Debug, Clone)]
pub enum TrainingOutcome {
    /// A new artifact was fitted and persisted
    Trained {
        artifact: ModelArtifact,
        report: TrainingReport,
    },
    /// The training matrix was empty; nothing was fitted or written
    NoData,
}

impl TrainingOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, TrainingOutcome::Trained { .. })
    }
}

/// Fits a fresh artifact on a training matrix and persists it
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    params: ForestParams,
    paths: ArtifactPaths,
}

impl ModelTrainer {
    pub fn new(params: ForestParams, paths: ArtifactPaths) -> Self {
        Self { params, paths }
    }

    /// Fit the scaler, scale the inputs, fit the forest, then overwrite the
    /// persisted artifact.
    ///
    /// An empty matrix returns [`TrainingOutcome::NoData`] without touching
    /// the model or the files.
    pub fn train(&self, matrix: &TrainingMatrix) -> Result<TrainingOutcome> {
        if matrix.is_empty() {
            warn!("insufficient data: training matrix is empty");
            return Ok(TrainingOutcome::NoData);
        }

        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(matrix.inputs().view())?;

        let mut model = RandomForestRegressor::new(self.params.clone());
        model.fit(scaled.view(), matrix.targets().view())?;

        let report = TrainingReport {
            samples: matrix.n_samples(),
            window_size: matrix.window_size(),
            n_estimators: model.trees().len(),
            oob_score: model.oob_score(),
        };
        match report.oob_score {
            Some(score) => info!(samples = report.samples, oob_score = score, "trained model"),
            None => info!(samples = report.samples, "trained model"),
        }

        let artifact = ModelArtifact::from_parts(model, scaler);
        artifact.save(&self.paths)?;
        Ok(TrainingOutcome::Trained { artifact, report })
    }
}

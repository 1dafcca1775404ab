//! Run orchestrator driving the learn and predict phases

use crate::config::OracleConfig;
use crate::data::{gather, HistorySource, SeriesCollection};
use crate::error::{OracleError, Result};
use crate::export::{write_forecasts, ExportFormat};
use crate::forecast::ForecastEngine;
use crate::models::{ArtifactPaths, ModelArtifact, ModelTrainer, TrainingOutcome};
use crate::store::BulkStore;
use crate::window::build_training_matrix;
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{info, warn};

/// Holds the configuration, the history source, the shared model and the
/// last gathered series between phases
pub struct Oracle {
    config: OracleConfig,
    source: Box<dyn HistorySource>,
    artifact: ModelArtifact,
    paths: ArtifactPaths,
    collection: Option<SeriesCollection>,
}

impl Oracle {
    /// Load the persisted model, or start untrained when `reset` is set or
    /// no model has been saved yet
    pub fn new(config: OracleConfig, source: Box<dyn HistorySource>, reset: bool) -> Result<Self> {
        config.validate()?;
        let paths = ArtifactPaths::from_config(&config);
        let artifact = ModelArtifact::load_or_new(&paths, config.model.clone(), reset)?;
        Ok(Self {
            config,
            source,
            artifact,
            paths,
            collection: None,
        })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Last gathered series, if any
    pub fn collection(&self) -> Option<&SeriesCollection> {
        self.collection.as_ref()
    }

    /// Anchor day of the last gathered series
    pub fn as_of(&self) -> Option<NaiveDate> {
        self.collection.as_ref().map(SeriesCollection::as_of)
    }

    /// Read the history, keeping `limit` days before its most recent day.
    ///
    /// Returns `false` when the history is empty.
    pub fn gather_data(&mut self, limit: Option<u32>) -> Result<bool> {
        self.collection = gather(self.source.as_ref(), limit)?;
        Ok(self.collection.is_some())
    }

    fn ensure_gathered(&mut self, limit: Option<u32>) -> Result<()> {
        if self.collection.is_none() {
            self.gather_data(limit)?;
        }
        Ok(())
    }

    /// Fit a fresh model on the gathered history and persist it.
    ///
    /// Returns `false` when there was nothing to train on; the previous
    /// model is then kept.
    pub fn learn(&mut self) -> Result<bool> {
        let window_size = self.config.forecast.window_size;
        let lookback = self.config.forecast.train_lookback_days;
        self.ensure_gathered(lookback)?;
        let Some(collection) = self.collection.as_ref() else {
            warn!("no history to learn from");
            return Ok(false);
        };

        let matrix = build_training_matrix(collection, window_size)?;
        let trainer = ModelTrainer::new(self.config.model.clone(), self.paths.clone());
        match trainer.train(&matrix)? {
            TrainingOutcome::Trained { artifact, report } => {
                info!(
                    samples = report.samples,
                    trees = report.n_estimators,
                    "learning finished"
                );
                self.artifact = artifact;
                Ok(true)
            }
            TrainingOutcome::NoData => Ok(false),
        }
    }

    /// Forecast every usable series and write the export file.
    ///
    /// Fails with [`OracleError::MissingArtifact`] when no model has been
    /// trained. An empty history produces an empty export file.
    pub fn predict(&mut self) -> Result<PathBuf> {
        if !self.artifact.is_trained() {
            return Err(OracleError::MissingArtifact(
                "No trained model available; run learn first".to_string(),
            ));
        }
        let trained_width = self.artifact.regressor().n_features();
        if trained_width != self.config.forecast.window_size {
            return Err(OracleError::InvalidParameter(format!(
                "Model was trained with window_size {} but {} is configured",
                trained_width, self.config.forecast.window_size
            )));
        }

        let window_size = self.config.forecast.window_size;
        let lookback = u32::try_from(window_size).ok();
        let horizon = self.config.forecast.nb_predictions;
        let path = self.config.export_path();
        let format = ExportFormat::from_config(&self.config.export);

        self.ensure_gathered(lookback)?;
        let rows = match self.collection.as_ref() {
            Some(collection) => {
                ForecastEngine::from_artifact(&self.artifact, horizon)?.forecast_rows(collection)?
            }
            None => {
                warn!("no history to forecast from");
                Vec::new()
            }
        };

        write_forecasts(&path, &rows, &format)?;
        Ok(path)
    }

    /// Replace the target table with the last export file
    pub fn insert_predictions(&self, store: &mut dyn BulkStore) -> Result<usize> {
        let path = self.config.export_path();
        if !path.exists() {
            return Err(OracleError::DataError(format!(
                "No export file at {}; run predict first",
                path.display()
            )));
        }
        let table = &self.config.forecast.target_table;
        let records =
            store.replace_from_file(table, &path, self.config.export.delimiter as u8)?;
        info!(table = %table, records, "inserted predictions");
        Ok(records)
    }
}

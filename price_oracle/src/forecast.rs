//! Chained multi-step forecasting
//!
//! Each (item, variant) series runs its own [`ForecastChain`]: the state is
//! the current window, a transition scales the window, predicts the next
//! value and shifts that raw prediction into the window. The chain stops
//! after the configured number of steps. [`ForecastEngine`] advances all
//! chains together, one batched model call per step.

use crate::data::{ItemId, SeriesCollection, Variant};
use crate::error::{OracleError, Result};
use crate::models::ModelArtifact;
use crate::utils::forecast_date;
use chrono::NaiveDate;
use ndarray::Array2;
use oracle_math::{FeatureTransform, Regressor};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

/// Placeholder written in the record id field of every forecast row
pub const RECORD_ID_PLACEHOLDER: &str = "0";

/// Autoregressive state of one series
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastChain {
    window: VecDeque<f64>,
    horizon: usize,
    step: usize,
}

impl ForecastChain {
    /// Seed a chain from the last `window_size` observations of `series`.
    ///
    /// Returns `None` when the series is too short to fill a window.
    pub fn seed(series: &[f64], window_size: usize, horizon: usize) -> Option<Self> {
        if window_size == 0 || series.len() < window_size {
            return None;
        }
        Some(Self {
            window: series[series.len() - window_size..].iter().copied().collect(),
            horizon,
            step: 0,
        })
    }

    /// Current window, oldest value first
    pub fn window(&self) -> Vec<f64> {
        self.window.iter().copied().collect()
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.horizon
    }

    /// Shift `prediction` into the window and return the day offset it was
    /// predicted for, or `None` once the horizon is reached.
    ///
    /// The raw value is always fed back, including non-positive ones.
    pub fn advance(&mut self, prediction: f64) -> Option<usize> {
        if self.is_finished() {
            return None;
        }
        self.window.pop_front();
        self.window.push_back(prediction);
        self.step += 1;
        Some(self.step)
    }

    /// Drive this chain alone to the end of its horizon
    pub fn run(&mut self, model: &dyn Regressor, scaler: &dyn FeatureTransform) -> Result<Vec<f64>> {
        let mut predictions = Vec::with_capacity(self.horizon - self.step);
        while !self.is_finished() {
            let input = Array2::from_shape_vec((1, self.window.len()), self.window())
                .map_err(|e| OracleError::DataError(format!("Cannot shape window: {}", e)))?;
            let scaled = scaler.transform(input.view())?;
            let prediction = model.predict(scaled.view())?[0];
            self.advance(prediction);
            predictions.push(prediction);
        }
        Ok(predictions)
    }
}

/// Raw prediction for one series and one future day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub item: ItemId,
    pub variant: Variant,
    /// Days after the as-of anchor, starting at 1
    pub offset: usize,
    pub value: f64,
}

impl ForecastPoint {
    /// Value as recorded downstream: non-positive prices are absent
    pub fn recorded(&self) -> Option<f64> {
        if self.value <= 0.0 {
            None
        } else {
            Some(self.value)
        }
    }
}

/// Forecast of every variant of one item for one day
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub id: String,
    pub date: NaiveDate,
    pub primary: Option<f64>,
    pub alternate: Option<f64>,
    pub item: ItemId,
}

impl ForecastRow {
    pub fn new(item: ItemId, date: NaiveDate) -> Self {
        Self {
            id: RECORD_ID_PLACEHOLDER.to_string(),
            date,
            primary: None,
            alternate: None,
            item,
        }
    }

    /// Recorded value of one variant
    pub fn value(&self, variant: Variant) -> Option<f64> {
        match variant {
            Variant::Primary => self.primary,
            Variant::Alternate => self.alternate,
        }
    }

    fn set(&mut self, variant: Variant, value: Option<f64>) {
        match variant {
            Variant::Primary => self.primary = value,
            Variant::Alternate => self.alternate = value,
        }
    }
}

/// Merge points of the same item and day into one row.
///
/// Rows come out ordered by item, then by day.
pub fn merge_rows(as_of: NaiveDate, points: &[ForecastPoint]) -> Result<Vec<ForecastRow>> {
    let mut rows: BTreeMap<(ItemId, usize), ForecastRow> = BTreeMap::new();
    for point in points {
        let row = match rows.entry((point.item, point.offset)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                entry.insert(ForecastRow::new(point.item, forecast_date(as_of, point.offset)?))
            }
        };
        row.set(point.variant, point.recorded());
    }
    Ok(rows.into_values().collect())
}

/// Runs every chain of a collection against one shared model and scaler
pub struct ForecastEngine<'a> {
    model: &'a dyn Regressor,
    scaler: &'a dyn FeatureTransform,
    window_size: usize,
    horizon: usize,
}

impl<'a> ForecastEngine<'a> {
    pub fn new(
        model: &'a dyn Regressor,
        scaler: &'a dyn FeatureTransform,
        window_size: usize,
        horizon: usize,
    ) -> Result<Self> {
        if window_size == 0 {
            return Err(OracleError::InvalidParameter(
                "window_size must be at least 1".to_string(),
            ));
        }
        if horizon == 0 {
            return Err(OracleError::InvalidParameter(
                "nb_predictions must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            model,
            scaler,
            window_size,
            horizon,
        })
    }

    /// Engine over a trained artifact; its window size is the model's input width
    pub fn from_artifact(artifact: &'a ModelArtifact, horizon: usize) -> Result<Self> {
        if !artifact.is_trained() {
            return Err(OracleError::MissingArtifact(
                "No trained model available; run training first".to_string(),
            ));
        }
        Self::new(
            artifact.regressor(),
            artifact.transform(),
            artifact.regressor().n_features(),
            horizon,
        )
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Forecast one series on its own; `None` when it cannot seed a window
    pub fn forecast_series(&self, series: &[f64]) -> Result<Option<Vec<f64>>> {
        match ForecastChain::seed(series, self.window_size, self.horizon) {
            Some(mut chain) => Ok(Some(chain.run(self.model, self.scaler)?)),
            None => Ok(None),
        }
    }

    /// Raw predictions for every usable (item, variant) series, step by step
    pub fn forecast(&self, collection: &SeriesCollection) -> Result<Vec<ForecastPoint>> {
        let mut chains: Vec<(ItemId, Variant, ForecastChain)> = Vec::new();
        for (item, series) in collection.iter() {
            for (variant, values) in series.iter() {
                match ForecastChain::seed(values, self.window_size, self.horizon) {
                    Some(chain) => chains.push((item, variant, chain)),
                    None => debug!(item, ?variant, len = values.len(), "series too short to forecast"),
                }
            }
        }

        let mut points = Vec::with_capacity(chains.len() * self.horizon);
        if chains.is_empty() {
            info!("no series long enough to forecast");
            return Ok(points);
        }

        for _ in 0..self.horizon {
            let mut flat = Vec::with_capacity(chains.len() * self.window_size);
            for (_, _, chain) in &chains {
                flat.extend(chain.window.iter().copied());
            }
            let inputs = Array2::from_shape_vec((chains.len(), self.window_size), flat)
                .map_err(|e| OracleError::DataError(format!("Cannot shape windows: {}", e)))?;
            let scaled = self.scaler.transform(inputs.view())?;
            let predictions = self.model.predict(scaled.view())?;
            if predictions.len() != chains.len() {
                return Err(OracleError::ValidationError(format!(
                    "Model returned {} predictions for {} windows",
                    predictions.len(),
                    chains.len()
                )));
            }

            for ((item, variant, chain), &value) in chains.iter_mut().zip(predictions.iter()) {
                if let Some(offset) = chain.advance(value) {
                    points.push(ForecastPoint {
                        item: *item,
                        variant: *variant,
                        offset,
                        value,
                    });
                }
            }
        }

        info!(
            series = chains.len(),
            steps = self.horizon,
            "forecast complete"
        );
        Ok(points)
    }

    /// Forecast a collection and merge the points into dated rows
    pub fn forecast_rows(&self, collection: &SeriesCollection) -> Result<Vec<ForecastRow>> {
        let points = self.forecast(collection)?;
        merge_rows(collection.as_of(), &points)
    }
}

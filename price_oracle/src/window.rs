//! Sliding-window training set construction
//!
//! Every series of length `L` longer than the window `W` yields `L - W`
//! samples: the input of sample `i` (for `i` in `W..L`) is `series[i-W..i]`
//! and its target is `series[i]`. Samples from every item and variant are
//! pooled into one matrix; item identity is not kept.

use crate::data::SeriesCollection;
use crate::error::{OracleError, Result};
use ndarray::{Array1, Array2};
use tracing::{debug, info, warn};

/// Pooled window samples of every series
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingMatrix {
    inputs: Array2<f64>,
    targets: Array1<f64>,
}

impl TrainingMatrix {
    /// Assemble a matrix from inputs and their targets
    pub fn new(inputs: Array2<f64>, targets: Array1<f64>) -> Result<Self> {
        if inputs.nrows() != targets.len() {
            return Err(OracleError::ValidationError(format!(
                "Input rows ({}) don't match targets ({})",
                inputs.nrows(),
                targets.len()
            )));
        }
        Ok(Self { inputs, targets })
    }

    /// One row of `W` consecutive observations per sample
    pub fn inputs(&self) -> &Array2<f64> {
        &self.inputs
    }

    /// Observation following each input row
    pub fn targets(&self) -> &Array1<f64> {
        &self.targets
    }

    pub fn window_size(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn n_samples(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Number of samples a series of `len` observations yields
pub fn window_count(len: usize, window_size: usize) -> usize {
    len.saturating_sub(window_size)
}

/// Input/target pairs of one series, oldest first
pub fn window_samples(series: &[f64], window_size: usize) -> impl Iterator<Item = (&[f64], f64)> + '_ {
    (window_size..series.len()).map(move |i| (&series[i - window_size..i], series[i]))
}

/// Pool the window samples of every item and variant.
///
/// Items are visited in collection order and variants in declared order,
/// so the result is deterministic. Series too short to yield a sample are
/// skipped; the matrix may be empty.
pub fn build_training_matrix(
    collection: &SeriesCollection,
    window_size: usize,
) -> Result<TrainingMatrix> {
    if window_size == 0 {
        return Err(OracleError::InvalidParameter(
            "window_size must be at least 1".to_string(),
        ));
    }

    let total: usize = collection
        .iter()
        .flat_map(|(_, series)| series.iter())
        .map(|(_, values)| window_count(values.len(), window_size))
        .sum();

    let mut inputs = Vec::with_capacity(total * window_size);
    let mut targets = Vec::with_capacity(total);
    let mut short_series = 0usize;

    for (item, series) in collection.iter() {
        for (variant, values) in series.iter() {
            if values.len() <= window_size {
                debug!(item, ?variant, len = values.len(), "series too short for a window");
                short_series += 1;
                continue;
            }
            for (window, target) in window_samples(values, window_size) {
                inputs.extend_from_slice(window);
                targets.push(target);
            }
        }
    }

    if short_series > 0 {
        warn!(
            short_series,
            window_size, "insufficient data: some series yield no training samples"
        );
    }

    let inputs = Array2::from_shape_vec((targets.len(), window_size), inputs)
        .map_err(|e| OracleError::DataError(format!("Cannot shape training matrix: {}", e)))?;
    info!(samples = targets.len(), window_size, "built training matrix");
    TrainingMatrix::new(inputs, Array1::from(targets))
}

//! # Oracle Math
//!
//! Numerical building blocks for the price oracle.
//! This crate provides a feature scaler and a random forest regressor
//! that operate on dense `ndarray` matrices, with no I/O of their own.

use ndarray::{Array1, Array2, ArrayView2};
use thiserror::Error;

pub mod forest;
pub mod scaler;
pub mod tree;

pub use forest::{ForestParams, MaxFeatures, RandomForestRegressor};
pub use scaler::StandardScaler;
pub use tree::{RegressionTree, TreeNode};

/// Errors that can occur while fitting or evaluating models
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Model is not fitted: {0}")]
    NotFitted(String),

    #[error("Dimension mismatch: expected {expected} columns, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for oracle math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// A fitted model mapping feature rows to one real output each.
///
/// Implementors must be `Send + Sync` so a single fitted model can be
/// shared across every series being forecast.
pub trait Regressor: Send + Sync {
    /// Predict one value per row of `x`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Number of input columns the model was fitted on.
    fn n_features(&self) -> usize;
}

/// A fitted feature transformation applied before a [`Regressor`].
pub trait FeatureTransform: Send + Sync {
    /// Transform every row of `x`.
    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>>;
}

/// Check that `x` has the expected number of columns.
pub(crate) fn check_columns(x: &ArrayView2<'_, f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(MathError::DimensionMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn check_columns_reports_both_widths() {
        let x = array![[1.0, 2.0, 3.0]];
        let err = check_columns(&x.view(), 4).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: expected 4 columns, got 3"
        );
        assert!(check_columns(&x.view(), 3).is_ok());
    }
}

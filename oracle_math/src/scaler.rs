//! Per-column standardisation of feature matrices
//!
//! `StandardScaler` learns the mean and population standard deviation of
//! every column and maps each value to `(x - mean) / scale`. Columns with
//! zero variance keep a scale of 1.0, so they map to 0.0 instead of NaN.

use crate::{check_columns, FeatureTransform, MathError, Result};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Scales below this are treated as zero variance
const MIN_SCALE: f64 = 10.0 * f64::EPSILON;

/// Zero-mean / unit-variance feature scaler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
    n_samples_seen: usize,
}

impl StandardScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fitted scaler from explicit statistics
    pub fn from_parts(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != scale.len() {
            return Err(MathError::InvalidInput(format!(
                "Mean length ({}) doesn't match scale length ({})",
                mean.len(),
                scale.len()
            )));
        }
        if mean.is_empty() {
            return Err(MathError::InvalidInput(
                "Scaler needs at least one column".to_string(),
            ));
        }
        if scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(MathError::InvalidInput(
                "Scale values must be finite and positive".to_string(),
            ));
        }

        Ok(Self {
            mean: Some(mean),
            scale: Some(scale),
            n_samples_seen: 0,
        })
    }

    /// Learn column statistics from `x`, replacing any previous fit
    pub fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(MathError::InsufficientData(
                "Cannot fit a scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MathError::CalculationError("Column mean is undefined".to_string()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s < MIN_SCALE { 1.0 } else { s });

        self.mean = Some(mean.to_vec());
        self.scale = Some(scale.to_vec());
        self.n_samples_seen = x.nrows();
        Ok(())
    }

    /// Fit on `x` and return its transformed copy
    pub fn fit_transform(&mut self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Whether `fit` (or `from_parts`) has been called
    pub fn is_fitted(&self) -> bool {
        self.mean.is_some() && self.scale.is_some()
    }

    /// Learned column means
    pub fn mean(&self) -> Option<&[f64]> {
        self.mean.as_deref()
    }

    /// Learned column scales
    pub fn scale(&self) -> Option<&[f64]> {
        self.scale.as_deref()
    }

    /// Number of rows seen by the last fit
    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }
}

impl FeatureTransform for StandardScaler {
    fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let (mean, scale) = match (&self.mean, &self.scale) {
            (Some(mean), Some(scale)) => (mean, scale),
            _ => {
                return Err(MathError::NotFitted(
                    "StandardScaler must be fitted before transform".to_string(),
                ))
            }
        };
        check_columns(&x, mean.len())?;

        let mean = Array1::from(mean.clone());
        let scale = Array1::from(scale.clone());
        Ok((&x - &mean) / &scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_fit_learns_population_statistics() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(x.view()).unwrap();

        let mean = scaler.mean().unwrap();
        assert_relative_eq!(mean[0], 3.0);
        assert_relative_eq!(mean[1], 10.0);

        let scale = scaler.scale().unwrap();
        assert_relative_eq!(scale[0], (8.0f64 / 3.0).sqrt());
        // Constant column keeps a unit scale
        assert_relative_eq!(scale[1], 1.0);
        assert_eq!(scaler.n_samples_seen(), 3);
    }

    #[test]
    fn test_transform_centres_and_scales() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let mut scaler = StandardScaler::new();
        let scaled = scaler.fit_transform(x.view()).unwrap();

        let col0 = scaled.column(0);
        assert_relative_eq!(col0.sum(), 0.0, epsilon = 1e-12);
        let variance = col0.iter().map(|v| v * v).sum::<f64>() / col0.len() as f64;
        assert_relative_eq!(variance, 1.0, epsilon = 1e-12);
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_requires_fit() {
        let scaler = StandardScaler::new();
        let x = array![[1.0]];
        assert!(matches!(
            scaler.transform(x.view()),
            Err(MathError::NotFitted(_))
        ));
    }

    #[test]
    fn test_transform_rejects_wrong_width() {
        let scaler = StandardScaler::from_parts(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let x = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            scaler.transform(x.view()),
            Err(MathError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_identity_scaler() {
        let scaler = StandardScaler::from_parts(vec![0.0; 3], vec![1.0; 3]).unwrap();
        let x = array![[1.5, -2.0, 7.25]];
        assert_eq!(scaler.transform(x.view()).unwrap(), x);
    }

    #[test]
    fn test_fit_empty_matrix_fails() {
        let x = Array2::<f64>::zeros((0, 4));
        let mut scaler = StandardScaler::new();
        assert!(matches!(
            scaler.fit(x.view()),
            Err(MathError::InsufficientData(_))
        ));
        assert!(!scaler.is_fitted());
    }

    #[test]
    fn test_serde_round_trip_preserves_transform() {
        let x = array![[1.0, 2.0], [4.0, 8.0], [9.0, 3.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(x.view()).unwrap();

        let json = serde_json::to_string(&scaler).unwrap();
        let restored: StandardScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(
            scaler.transform(x.view()).unwrap(),
            restored.transform(x.view()).unwrap()
        );
    }
}

//! Random forest regression
//!
//! An ensemble of [`RegressionTree`]s, each grown on a bootstrap draw of
//! the training rows with a random subset of features tried at every split.
//! Predictions average the trees in index order.
//!
//! Every tree owns an RNG seeded from `random_state` and its index, so a fit
//! is reproducible bit for bit no matter how many threads grow the trees.

use crate::tree::{RegressionTree, TreeParams};
use crate::{check_columns, MathError, Regressor, Result};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};

/// Number of features tried at each split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`
    #[default]
    Sqrt,
    /// `floor(log2(n_features))`
    Log2,
    /// Every feature
    All,
}

impl MaxFeatures {
    /// Resolve to a feature count for `n_features` columns (at least 1)
    pub fn resolve(&self, n_features: usize) -> usize {
        let count = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::All => n_features,
        };
        count.clamp(1, n_features.max(1))
    }
}

/// Hyperparameters of a random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Depth limit of every tree; `0` in configuration means unlimited
    #[serde(deserialize_with = "depth_limit")]
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may be split
    pub min_samples_split: usize,
    /// Minimum samples each child of a split must keep
    pub min_samples_leaf: usize,
    /// Feature subsampling strategy
    pub max_features: MaxFeatures,
    /// Worker threads: `-1` or `0` uses every core, `-k` leaves `k - 1` cores idle
    pub n_jobs: i32,
    /// Seed for bootstrap draws and feature subsampling
    pub random_state: u64,
    /// Grow each tree on a bootstrap draw instead of the full matrix
    pub bootstrap: bool,
    /// Compute the out-of-bag R² score after fitting
    pub oob_score: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(15),
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            n_jobs: -1,
            random_state: 42,
            bootstrap: true,
            oob_score: true,
        }
    }
}

impl ForestParams {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(MathError::InvalidInput(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(MathError::InvalidInput(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(MathError::InvalidInput(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(MathError::InvalidInput(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Thread count for the fitting pool; 0 lets rayon use every core
    fn worker_threads(&self) -> usize {
        match self.n_jobs {
            n if n > 0 => n as usize,
            0 | -1 => 0,
            n => {
                let cores = std::thread::available_parallelism()
                    .map(|c| c.get())
                    .unwrap_or(1) as i64;
                (cores + 1 + n as i64).max(1) as usize
            }
        }
    }

    /// Pool fitting and prediction run in
    fn thread_pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_threads())
            .build()
            .map_err(|e| MathError::CalculationError(format!("Thread pool: {}", e)))
    }

    /// Seed of the tree at `index`
    fn tree_seed(&self, index: usize) -> u64 {
        self.random_state ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }

    fn tree_params(&self, n_features: usize) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features.resolve(n_features),
        }
    }
}

/// Random forest regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<RegressionTree>,
    n_features: usize,
    oob_score: Option<f64>,
}

impl RandomForestRegressor {
    /// Create an unfitted forest
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            n_features: 0,
            oob_score: None,
        }
    }

    /// Fit the forest on `x` and `y`, discarding any previous fit
    pub fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<()> {
        self.params.validate()?;
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(MathError::InsufficientData(
                "Cannot fit a forest on an empty matrix".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(MathError::InvalidInput(format!(
                "Feature rows ({}) don't match targets ({})",
                x.nrows(),
                y.len()
            )));
        }

        let n_samples = x.nrows();
        let tree_params = self.params.tree_params(x.ncols());
        let pool = self.params.thread_pool()?;

        let params = &self.params;
        let trees = pool.install(|| {
            (0..params.n_estimators)
                .into_par_iter()
                .map(|i| {
                    let mut rng = StdRng::seed_from_u64(params.tree_seed(i));
                    let samples = draw_samples(&mut rng, n_samples, params.bootstrap);
                    RegressionTree::fit(x, y, &samples, &tree_params, &mut rng)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        self.trees = trees;
        self.n_features = x.ncols();
        self.oob_score = if self.params.bootstrap && self.params.oob_score {
            self.compute_oob_score(x, y)
        } else {
            None
        };
        Ok(())
    }

    /// R² of out-of-bag predictions over the rows left out by at least one tree
    fn compute_oob_score(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Option<f64> {
        let n_samples = x.nrows();
        let mut sums = vec![0.0; n_samples];
        let mut counts = vec![0usize; n_samples];

        for (i, tree) in self.trees.iter().enumerate() {
            // Replaying the seed reproduces this tree's bootstrap draw
            let mut rng = StdRng::seed_from_u64(self.params.tree_seed(i));
            let mut in_bag = vec![false; n_samples];
            for s in draw_samples(&mut rng, n_samples, true) {
                in_bag[s] = true;
            }
            for s in (0..n_samples).filter(|&s| !in_bag[s]) {
                sums[s] += tree.predict_row(x.row(s));
                counts[s] += 1;
            }
        }

        let scored: Vec<(f64, f64)> = (0..n_samples)
            .filter(|&s| counts[s] > 0)
            .map(|s| (y[s], sums[s] / counts[s] as f64))
            .collect();
        if scored.is_empty() {
            return None;
        }

        let mean = scored.iter().map(|(t, _)| t).sum::<f64>() / scored.len() as f64;
        let ss_res: f64 = scored.iter().map(|(t, p)| (t - p).powi(2)).sum();
        let ss_tot: f64 = scored.iter().map(|(t, _)| (t - mean).powi(2)).sum();
        if ss_tot == 0.0 {
            return Some(if ss_res == 0.0 { 1.0 } else { 0.0 });
        }
        Some(1.0 - ss_res / ss_tot)
    }

    /// Whether the forest holds fitted trees
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Out-of-bag R² from the last fit, when it was requested and defined
    pub fn oob_score(&self) -> Option<f64> {
        self.oob_score
    }

    /// Hyperparameters
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fitted trees in ensemble order
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Average of every tree's prediction for one row
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        sum / self.trees.len() as f64
    }
}

impl Regressor for RandomForestRegressor {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if !self.is_fitted() {
            return Err(MathError::NotFitted(
                "RandomForestRegressor must be fitted before predict".to_string(),
            ));
        }
        check_columns(&x, self.n_features)?;

        let values: Vec<f64> = self.params.thread_pool()?.install(|| {
            (0..x.nrows())
                .into_par_iter()
                .map(|i| self.predict_row(x.row(i)))
                .collect()
        });
        Ok(Array1::from(values))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

fn depth_limit<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<usize>, D::Error> {
    Ok(Option::<usize>::deserialize(deserializer)?.filter(|&d| d > 0))
}

/// Row indices a tree is grown on
fn draw_samples<R: Rng + ?Sized>(rng: &mut R, n_samples: usize, bootstrap: bool) -> Vec<usize> {
    if bootstrap {
        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
    } else {
        (0..n_samples).collect()
    }
}

//! CART regression tree
//!
//! Trees are grown greedily: every node tries a random subset of the
//! features that vary within it and keeps the threshold with the largest reduction in squared
//! error. Nodes are stored in a flat table where `feature == -1` marks a
//! leaf, so a fitted tree serializes as a plain list.
//!
//! # Traversal
//!
//! - Start at node 0 (root)
//! - If `feature == -1`, return the leaf `value`
//! - Else go `left` when `row[feature] <= threshold` (or is NaN), `right` otherwise

use crate::{MathError, Result};
use ndarray::{ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A single node of a fitted tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Feature index to split on (-1 for leaf nodes).
    pub feature: i32,
    /// Threshold value for the split.
    pub threshold: f64,
    /// Index of left child (-1 for leaf nodes).
    pub left: i32,
    /// Index of right child (-1 for leaf nodes).
    pub right: i32,
    /// Mean target of the training samples that reached this node.
    pub value: f64,
    /// Number of training samples that reached this node.
    pub n_samples: usize,
}

impl TreeNode {
    fn leaf(value: f64, n_samples: usize) -> Self {
        Self {
            feature: -1,
            threshold: 0.0,
            left: -1,
            right: -1,
            value,
            n_samples,
        }
    }

    /// Whether this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature == -1
    }
}

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// Maximum depth of the tree (root is depth 0); `None` grows until pure
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs before it may be split
    pub min_samples_split: usize,
    /// Minimum samples each child of a split must keep
    pub min_samples_leaf: usize,
    /// Number of features tried at each split
    pub max_features: usize,
}

/// Best split found for one node
struct Split {
    feature: usize,
    threshold: f64,
    /// Number of samples going left
    n_left: usize,
    /// Node samples ordered by the split feature
    ordered: Vec<usize>,
}

/// Pending node during growth: node index, sample range, depth
type Pending = (usize, usize, usize, usize);

/// A fitted regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
    n_features: usize,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `samples`.
    ///
    /// `samples` may repeat indices (bootstrap draws); each repetition counts
    /// as a separate sample.
    pub fn fit<R: Rng + ?Sized>(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        samples: &[usize],
        params: &TreeParams,
        rng: &mut R,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot grow a tree without samples".to_string(),
            ));
        }
        if x.nrows() != y.len() {
            return Err(MathError::InvalidInput(format!(
                "Feature rows ({}) don't match targets ({})",
                x.nrows(),
                y.len()
            )));
        }
        if samples.iter().any(|&i| i >= x.nrows()) {
            return Err(MathError::InvalidInput(
                "Sample index out of bounds".to_string(),
            ));
        }
        let n_features = x.ncols();
        if params.max_features == 0 || params.max_features > n_features {
            return Err(MathError::InvalidInput(format!(
                "max_features must be in 1..={}, got {}",
                n_features, params.max_features
            )));
        }

        let mut idx = samples.to_vec();
        let mut nodes = vec![TreeNode::leaf(0.0, 0)];
        let mut stack: Vec<Pending> = vec![(0, 0, idx.len(), 0)];

        while let Some((node, start, end, depth)) = stack.pop() {
            let members = &idx[start..end];
            let n = members.len();
            let sum: f64 = members.iter().map(|&i| y[i]).sum();
            nodes[node] = TreeNode::leaf(sum / n as f64, n);

            let depth_reached = params.max_depth.map_or(false, |d| depth >= d);
            if depth_reached
                || n < params.min_samples_split
                || n < 2 * params.min_samples_leaf
                || is_constant(members, &y)
            {
                continue;
            }

            let Some(split) = best_split(&x, &y, members, sum, params, rng) else {
                continue;
            };

            idx[start..end].copy_from_slice(&split.ordered);
            let left = nodes.len();
            nodes.push(TreeNode::leaf(0.0, 0));
            let right = nodes.len();
            nodes.push(TreeNode::leaf(0.0, 0));

            let parent = &mut nodes[node];
            parent.feature = split.feature as i32;
            parent.threshold = split.threshold;
            parent.left = left as i32;
            parent.right = right as i32;

            let mid = start + split.n_left;
            stack.push((right, mid, end, depth + 1));
            stack.push((left, start, mid, depth + 1));
        }

        Ok(Self { nodes, n_features })
    }

    /// Predict a single row
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node_idx = 0usize;

        loop {
            let node = &self.nodes[node_idx];
            if node.is_leaf() {
                return node.value;
            }

            let feature_val = row
                .get(node.feature as usize)
                .copied()
                .unwrap_or(f64::NAN);

            if feature_val.is_nan() || feature_val <= node.threshold {
                node_idx = node.left as usize;
            } else {
                node_idx = node.right as usize;
            }
        }
    }

    /// Node table
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Number of features the tree was grown on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Length of the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            let node = &self.nodes[idx];
            if node.is_leaf() {
                deepest = deepest.max(depth);
            } else {
                stack.push((node.left as usize, depth + 1));
                stack.push((node.right as usize, depth + 1));
            }
        }
        deepest
    }
}

fn is_constant(members: &[usize], y: &ArrayView1<'_, f64>) -> bool {
    let first = y[members[0]];
    members.iter().all(|&i| y[i] == first)
}

/// Search features in random order for the split with the largest
/// reduction in squared error.
///
/// At least `max_features` features that vary within the node are examined.
/// When none of those yields a valid split, the search keeps drawing
/// features, so a node only becomes a leaf once every feature is exhausted.
///
/// Minimising the children's squared error is the same as maximising
/// `sum_left^2 / n_left + sum_right^2 / n_right`, which only needs prefix sums.
fn best_split<R: Rng + ?Sized>(
    x: &ArrayView2<'_, f64>,
    y: &ArrayView1<'_, f64>,
    members: &[usize],
    total: f64,
    params: &TreeParams,
    rng: &mut R,
) -> Option<Split> {
    let n = members.len();
    let min_leaf = params.min_samples_leaf;
    let mut features: Vec<usize> = (0..x.ncols()).collect();
    features.shuffle(rng);

    let mut best: Option<Split> = None;
    let mut best_score = f64::NEG_INFINITY;
    let mut varying = 0;

    for feature in features {
        if varying >= params.max_features && best.is_some() {
            break;
        }

        let mut ordered = members.to_vec();
        ordered.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
        if x[[ordered[0], feature]] >= x[[ordered[n - 1], feature]] {
            // Constant within this node
            continue;
        }
        varying += 1;

        let mut left_sum = 0.0;
        let mut found: Option<(usize, f64)> = None;
        for k in 1..n {
            left_sum += y[ordered[k - 1]];
            if k < min_leaf || n - k < min_leaf {
                continue;
            }
            let lo = x[[ordered[k - 1], feature]];
            let hi = x[[ordered[k], feature]];
            if lo >= hi {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
            if score > best_score {
                best_score = score;
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi || !threshold.is_finite() {
                    threshold = lo;
                }
                found = Some((k, threshold));
            }
        }

        if let Some((n_left, threshold)) = found {
            best = Some(Split {
                feature,
                threshold,
                n_left,
                ordered,
            });
        }
    }

    best
}

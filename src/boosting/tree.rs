//! Depth-limited regression trees fitted by exact greedy search
//!
//! Candidate thresholds are midpoints between consecutive distinct values
//! of a feature. A split is scored by the reduction in squared error,
//! `S_L²/n_L + S_R²/n_R - S²/n`, where `S` is the target sum of a node.
//! Rows with `x <= threshold` go left.

use crate::data::DenseMatrix;
use serde::{Deserialize, Serialize};

/// Index into [`RegressionTree::nodes`]
pub type NodeId = u32;

/// Smallest improvement that still counts as a split
const MIN_SPLIT_GAIN: f64 = 1e-12;

/// A single tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Terminal node carrying the prediction
    Leaf {
        /// Mean target of the training rows that reached this leaf
        value: f64,
    },
    /// Internal node routing on one feature
    Split {
        /// Feature column
        feature: usize,
        /// Rows with `x[feature] <= threshold` go left
        threshold: f64,
        /// Left child
        left: NodeId,
        /// Right child
        right: NodeId,
    },
}

/// Tree growth limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth; the root sits at depth 0
    pub max_depth: usize,
    /// Minimum rows a node needs before it may be split
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

/// Immutable trained regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit a tree to `targets` over all rows of `x`.
    ///
    /// `targets.len()` must equal `x.n_rows()` and be non-zero.
    #[must_use]
    pub fn fit(x: &DenseMatrix, targets: &[f64], params: &TreeParams) -> Self {
        debug_assert_eq!(x.n_rows(), targets.len());
        debug_assert!(!targets.is_empty());

        let mut builder = TreeBuilder {
            x,
            targets,
            params,
            nodes: Vec::new(),
        };
        let rows: Vec<usize> = (0..x.n_rows()).collect();
        builder.grow(rows, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    /// All nodes; index 0 is the root
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of leaves
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Longest root-to-leaf path, in edges
    #[must_use]
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: NodeId) -> usize {
            match &nodes[id as usize] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Route one row to its leaf value
    #[must_use]
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut id: NodeId = 0;
        loop {
            match &self.nodes[id as usize] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    x: &'a DenseMatrix,
    targets: &'a [f64],
    params: &'a TreeParams,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `rows`; returns its node id
    #[allow(clippy::cast_possible_truncation)]
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Node::Leaf {
            value: self.mean(&rows),
        });

        let splittable =
            depth < self.params.max_depth && rows.len() >= self.params.min_samples_split;
        let Some(split) = splittable.then(|| self.best_split(&rows)).flatten() else {
            return id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.x.get(r, split.feature) <= split.threshold);

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[id as usize] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(&self, rows: &[usize]) -> f64 {
        rows.iter().map(|&r| self.targets[r]).sum::<f64>() / rows.len() as f64
    }

    #[allow(clippy::cast_precision_loss)]
    fn best_split(&self, rows: &[usize]) -> Option<SplitCandidate> {
        let n = rows.len();
        let total: f64 = rows.iter().map(|&r| self.targets[r]).sum();
        let parent_score = total * total / n as f64;
        let min_leaf = self.params.min_samples_leaf;

        let mut best: Option<SplitCandidate> = None;
        let mut order = rows.to_vec();

        for feature in 0..self.x.n_cols() {
            order.sort_by(|&a, &b| self.x.get(a, feature).total_cmp(&self.x.get(b, feature)));

            let mut left_sum = 0.0;
            for i in 1..n {
                left_sum += self.targets[order[i - 1]];

                let lo = self.x.get(order[i - 1], feature);
                let hi = self.x.get(order[i], feature);
                if lo >= hi || i < min_leaf || n - i < min_leaf {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / i as f64
                    + right_sum * right_sum / (n - i) as f64
                    - parent_score;

                if gain > MIN_SPLIT_GAIN && best.map_or(true, |b| gain > b.gain) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    // midpoint can round up to `hi` for adjacent floats
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f64]) -> DenseMatrix {
        DenseMatrix::from_row_major(values.to_vec(), values.len(), 1)
    }

    #[test]
    fn test_single_split_separates_step() {
        let x = column(&[1.0, 2.0, 3.0, 4.0]);
        let y = [0.0, 0.0, 10.0, 10.0];
        let tree = RegressionTree::fit(&x, &y, &TreeParams::default());

        assert_eq!(tree.predict_row(&[1.5]), 0.0);
        assert_eq!(tree.predict_row(&[3.5]), 10.0);
        match &tree.nodes()[0] {
            Node::Split { threshold, .. } => assert!((threshold - 2.5).abs() < 1e-12),
            Node::Leaf { .. } => panic!("root should split"),
        }
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = column(&[1.0, 2.0, 3.0]);
        let tree = RegressionTree::fit(&x, &[5.0, 5.0, 5.0], &TreeParams::default());

        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.predict_row(&[100.0]), 5.0);
    }

    #[test]
    fn test_identical_features_cannot_split() {
        let x = column(&[7.0, 7.0]);
        let tree = RegressionTree::fit(&x, &[1.0, 3.0], &TreeParams::default());

        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_row(&[7.0]), 2.0);
    }

    #[test]
    fn test_depth_limit_respected() {
        let values: Vec<f64> = (0..64).map(f64::from).collect();
        let x = column(&values);
        let y: Vec<f64> = values.iter().map(|v| v * v).collect();

        let params = TreeParams {
            max_depth: 2,
            ..TreeParams::default()
        };
        let tree = RegressionTree::fit(&x, &y, &params);
        assert!(tree.depth() <= 2);
        assert!(tree.n_leaves() <= 4);
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let x = column(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = [100.0, 0.0, 0.0, 0.0, 0.0];
        let params = TreeParams {
            max_depth: 1,
            min_samples_leaf: 2,
            ..TreeParams::default()
        };
        let tree = RegressionTree::fit(&x, &y, &params);

        // best unconstrained split isolates row 0; with two rows per side it moves right
        match &tree.nodes()[0] {
            Node::Split { threshold, .. } => assert!((threshold - 2.5).abs() < 1e-12),
            Node::Leaf { .. } => panic!("root should split"),
        }
    }

    #[test]
    fn test_picks_informative_feature() {
        // feature 0 is noise, feature 1 determines the target
        let data = vec![
            3.0, 0.0, //
            1.0, 0.0, //
            2.0, 1.0, //
            0.0, 1.0,
        ];
        let x = DenseMatrix::from_row_major(data, 4, 2);
        let y = [1.0, 1.0, 9.0, 9.0];
        let tree = RegressionTree::fit(&x, &y, &TreeParams::default());

        match &tree.nodes()[0] {
            Node::Split { feature, .. } => assert_eq!(*feature, 1),
            Node::Leaf { .. } => panic!("root should split"),
        }
        assert_eq!(tree.predict_row(&[3.0, 1.0]), 9.0);
    }
}

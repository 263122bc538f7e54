//! Histogram-binned regression trees for gradient boosting.
//!
//! Features are binned once per fit. Trees grow best-first: the open leaf
//! with the largest variance reduction is split next, until the split budget
//! (the interaction depth) is spent or no split helps. Missing values follow
//! a per-split default direction learned from the training rows.

use serde::{Deserialize, Serialize};

use crate::pipeline::features::FeatureMatrix;

/// Bin code for a missing (`NaN`) value.
pub const MISSING_BIN: u16 = u16::MAX;

/// Upper bound on bins per feature, leaving room for [`MISSING_BIN`].
pub const MAX_BINS: usize = 1024;

/// Index into a `Vec<Node>` arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Quantile bins for every feature of a training matrix.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    /// `edges[f]` ascending; a value goes to the first bin whose edge is >= it.
    edges: Vec<Vec<f64>>,
    /// Column-major bin codes.
    codes: Vec<Vec<u16>>,
    n_rows: usize,
}

fn bin_edges(column: &[f64], max_bins: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.len() < 2 {
        return Vec::new();
    }
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));

    let mut distinct = sorted.clone();
    distinct.dedup();
    if distinct.len() < 2 {
        return Vec::new();
    }

    // Few distinct values (indicators, small counts): cut between each pair
    if distinct.len() <= max_bins {
        return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }

    let n = sorted.len();
    let (min, max) = (sorted[0], sorted[n - 1]);
    let mut edges: Vec<f64> = (1..max_bins)
        .map(|k| {
            let pos = (k as f64 / max_bins as f64) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = pos - lo as f64;
            sorted[lo] + frac * (sorted[hi] - sorted[lo])
        })
        .collect();
    edges.dedup();
    edges.retain(|&e| e >= min && e < max);
    edges
}

impl BinnedMatrix {
    pub fn from_matrix(matrix: &FeatureMatrix, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, MAX_BINS);
        let mut edges = Vec::with_capacity(matrix.n_features());
        let mut codes = Vec::with_capacity(matrix.n_features());

        for f in 0..matrix.n_features() {
            let column = matrix.column(f);
            let feature_edges = bin_edges(column, max_bins);
            codes.push(
                column
                    .iter()
                    .map(|&v| {
                        if v.is_nan() {
                            MISSING_BIN
                        } else {
                            feature_edges.partition_point(|&e| e < v) as u16
                        }
                    })
                    .collect(),
            );
            edges.push(feature_edges);
        }

        Self {
            edges,
            codes,
            n_rows: matrix.n_rows(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.edges.len()
    }

    /// Bins for a feature, 0 when the feature is constant.
    pub fn n_bins(&self, feature: usize) -> usize {
        match self.edges[feature].len() {
            0 => 0,
            n => n + 1,
        }
    }

    pub fn code(&self, feature: usize, row: usize) -> u16 {
        self.codes[feature][row]
    }

    /// Rows in bins `0..=bin` satisfy `value <= threshold(bin)`.
    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.edges[feature][bin]
    }
}

/// A node in a regression tree arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        /// Rows with `value <= threshold` go left.
        threshold: f64,
        /// Where `NaN` goes.
        missing_left: bool,
        left: NodeIndex,
        right: NodeIndex,
        /// Reduction in squared error from this split.
        gain: f64,
        n_samples: usize,
    },
    Leaf {
        /// Newton step, before shrinkage.
        value: f64,
        n_samples: usize,
    },
}

/// Regression tree fitted to gradients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_splits(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Split { .. }))
            .count()
    }

    pub fn leaf_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.nodes.iter().filter_map(|n| match n {
            Node::Leaf { value, .. } => Some(*value),
            Node::Split { .. } => None,
        })
    }

    /// Leaf value for one row of `matrix`.
    pub fn predict_row(&self, matrix: &FeatureMatrix, row: usize) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    missing_left,
                    left,
                    right,
                    ..
                } => {
                    let v = matrix.value(row, *feature);
                    let go_left = if v.is_nan() { *missing_left } else { v <= *threshold };
                    index = if go_left { left.index() } else { right.index() };
                }
            }
        }
    }
}

/// Growth limits for one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    /// Maximum number of splits.
    pub max_splits: usize,
    /// Minimum rows in each child.
    pub min_leaf: usize,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: usize,
    missing_left: bool,
    gain: f64,
}

struct OpenLeaf {
    node: usize,
    rows: Vec<usize>,
    split: Option<SplitCandidate>,
}

fn best_split(
    data: &BinnedMatrix,
    gradients: &[f64],
    rows: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = rows.len();
    if n < 2 * min_leaf.max(1) {
        return None;
    }
    let g_total: f64 = rows.iter().map(|&r| gradients[r]).sum();
    let parent = g_total * g_total / n as f64;

    let mut best: Option<SplitCandidate> = None;
    let mut best_gain = 1e-12;

    for feature in 0..data.n_features() {
        let n_bins = data.n_bins(feature);
        if n_bins == 0 {
            continue;
        }

        let mut bin_sums = vec![0.0f64; n_bins];
        let mut bin_counts = vec![0usize; n_bins];
        let mut missing_sum = 0.0;
        let mut missing_count = 0usize;
        for &r in rows {
            let code = data.code(feature, r);
            if code == MISSING_BIN {
                missing_sum += gradients[r];
                missing_count += 1;
            } else {
                let b = code as usize;
                bin_sums[b] += gradients[r];
                bin_counts[b] += 1;
            }
        }

        let observed = n - missing_count;
        let observed_sum = g_total - missing_sum;
        let mut left_sum = 0.0;
        let mut left_count = 0usize;

        for bin in 0..n_bins - 1 {
            left_sum += bin_sums[bin];
            left_count += bin_counts[bin];
            let right_count = observed - left_count;
            if left_count == 0 || right_count == 0 {
                continue;
            }
            let right_sum = observed_sum - left_sum;

            // Without missing rows the default direction is the larger child
            let (directions, n_directions) = if missing_count == 0 {
                ([left_count >= right_count; 2], 1)
            } else {
                ([true, false], 2)
            };
            for &missing_left in &directions[..n_directions] {
                let (gl, nl, gr, nr) = if missing_left {
                    (left_sum + missing_sum, left_count + missing_count, right_sum, right_count)
                } else {
                    (left_sum, left_count, right_sum + missing_sum, right_count + missing_count)
                };
                if nl < min_leaf || nr < min_leaf {
                    continue;
                }
                let gain = gl * gl / nl as f64 + gr * gr / nr as f64 - parent;
                if gain > best_gain {
                    best_gain = gain;
                    best = Some(SplitCandidate {
                        feature,
                        bin,
                        missing_left,
                        gain,
                    });
                }
            }
        }
    }

    best
}

fn newton_step(gradients: &[f64], hessians: &[f64], rows: &[usize]) -> f64 {
    let g: f64 = rows.iter().map(|&r| gradients[r]).sum();
    let h: f64 = rows.iter().map(|&r| hessians[r]).sum();
    if h.abs() < 1e-12 {
        0.0
    } else {
        g / h
    }
}

/// Grow one tree on `rows` (the bag) against per-row gradients and hessians.
pub fn grow_tree(
    data: &BinnedMatrix,
    gradients: &[f64],
    hessians: &[f64],
    rows: Vec<usize>,
    params: TreeParams,
) -> RegressionTree {
    let mut nodes = vec![Node::Leaf {
        value: 0.0,
        n_samples: rows.len(),
    }];
    let split = best_split(data, gradients, &rows, params.min_leaf);
    let mut open = vec![OpenLeaf {
        node: 0,
        rows,
        split,
    }];

    let mut n_splits = 0;
    while n_splits < params.max_splits {
        // First leaf wins ties so growth order is deterministic
        let mut chosen: Option<(usize, f64)> = None;
        for (i, leaf) in open.iter().enumerate() {
            if let Some(s) = leaf.split {
                if chosen.map_or(true, |(_, g)| s.gain > g) {
                    chosen = Some((i, s.gain));
                }
            }
        }
        let Some((i, _)) = chosen else { break };

        let leaf = open.remove(i);
        let Some(split) = leaf.split else { break };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            leaf.rows.iter().copied().partition(|&r| {
                let code = data.code(split.feature, r);
                if code == MISSING_BIN {
                    split.missing_left
                } else {
                    code as usize <= split.bin
                }
            });

        let left = NodeIndex::new(nodes.len());
        nodes.push(Node::Leaf {
            value: 0.0,
            n_samples: left_rows.len(),
        });
        let right = NodeIndex::new(nodes.len());
        nodes.push(Node::Leaf {
            value: 0.0,
            n_samples: right_rows.len(),
        });
        nodes[leaf.node] = Node::Split {
            feature: split.feature,
            threshold: data.threshold(split.feature, split.bin),
            missing_left: split.missing_left,
            left,
            right,
            gain: split.gain,
            n_samples: leaf.rows.len(),
        };

        for (index, rows) in [(left, left_rows), (right, right_rows)] {
            let split = best_split(data, gradients, &rows, params.min_leaf);
            open.push(OpenLeaf {
                node: index.index(),
                rows,
                split,
            });
        }
        n_splits += 1;
    }

    for leaf in open {
        nodes[leaf.node] = Node::Leaf {
            value: newton_step(gradients, hessians, &leaf.rows),
            n_samples: leaf.rows.len(),
        };
    }

    RegressionTree { nodes }
}

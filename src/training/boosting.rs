//! Shared machinery for the second-order boosted tree families
//!
//! - Histogram binning of feature columns (quantile cut points)
//! - Best-first gradient tree growth: Gain = ½·[GL²/(HL+λ) + GR²/(HR+λ) − G²/(H+λ)] − γ
//! - Leaf weights w* = −G / (H + λ), shrunk by the learning rate
//! - Softmax over per-class margins

use ndarray::{Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Quantile cut points per feature; bin `b` holds `cuts[b-1] < v <= cuts[b]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinMapper {
    cuts: Vec<Vec<f64>>,
}

impl BinMapper {
    pub fn fit(x: &Array2<f64>, max_bin: usize) -> Self {
        let max_bin = max_bin.max(2);
        let cuts = x
            .columns()
            .into_iter()
            .map(|col| {
                let mut values: Vec<f64> = col.to_vec();
                values.sort_by(|a, b| a.total_cmp(b));
                values.dedup();
                if values.len() <= max_bin {
                    values.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
                } else {
                    let mut cuts: Vec<f64> = (1..max_bin)
                        .map(|b| {
                            let pos = b * (values.len() - 1) / max_bin;
                            (values[pos] + values[pos + 1]) / 2.0
                        })
                        .collect();
                    cuts.dedup();
                    cuts
                }
            })
            .collect();
        Self { cuts }
    }

    pub fn n_bins(&self, feature: usize) -> usize {
        self.cuts[feature].len() + 1
    }

    /// Raw-space threshold equivalent to "bin <= b"
    pub fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.cuts[feature][bin]
    }

    fn bin_of(&self, feature: usize, value: f64) -> u16 {
        self.cuts[feature].partition_point(|&c| c < value) as u16
    }

    /// Column-major binned copy of `x`
    pub fn transform(&self, x: &Array2<f64>) -> BinnedMatrix {
        let n_rows = x.nrows();
        let mut data = Vec::with_capacity(n_rows * x.ncols());
        for (f, col) in x.columns().into_iter().enumerate() {
            data.extend(col.iter().map(|&v| self.bin_of(f, v)));
        }
        BinnedMatrix {
            n_rows,
            n_features: x.ncols(),
            data,
        }
    }
}

/// Binned feature matrix, one contiguous column per feature
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    n_rows: usize,
    n_features: usize,
    data: Vec<u16>,
}

impl BinnedMatrix {
    #[inline]
    fn get(&self, row: usize, feature: usize) -> usize {
        self.data[feature * self.n_rows + row] as usize
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Gradient tree node; leaf values already include the learning rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GradNode {
    Leaf { value: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<GradNode>,
        right: Box<GradNode>,
    },
}

impl GradNode {
    pub fn predict(&self, row: &ArrayView1<f64>) -> f64 {
        match self {
            GradNode::Leaf { value } => *value,
            GradNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            GradNode::Leaf { .. } => 0,
            GradNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            GradNode::Leaf { .. } => 1,
            GradNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Growth limits and regularisation for one tree
#[derive(Debug, Clone)]
pub struct GrowParams {
    pub max_depth: usize,
    /// `None` grows every positive-gain split up to `max_depth`
    pub max_leaves: Option<usize>,
    pub min_child_samples: usize,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub gamma: f64,
    pub learning_rate: f64,
}

#[derive(Debug, Clone)]
struct Candidate {
    gain: f64,
    node: usize,
    feature: usize,
    bin: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Highest gain first; older nodes first on ties
        self.gain.total_cmp(&other.gain).then(other.node.cmp(&self.node))
    }
}

enum Slot {
    Leaf { rows: Vec<usize>, depth: usize },
    Split { feature: usize, bin: usize, left: usize, right: usize },
}

fn leaf_weight(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 {
        0.0
    } else {
        -g / denom
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 {
        0.0
    } else {
        g * g / denom
    }
}

fn best_split(
    binned: &BinnedMatrix,
    mapper: &BinMapper,
    grad: &[f64],
    hess: &[f64],
    rows: &[usize],
    features: &[usize],
    node: usize,
    params: &GrowParams,
) -> Option<Candidate> {
    let g_total: f64 = rows.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = rows.iter().map(|&i| hess[i]).sum();
    let parent = score(g_total, h_total, params.reg_lambda);
    let n_total = rows.len();

    let mut best: Option<Candidate> = None;
    for &feature in features {
        let n_bins = mapper.n_bins(feature);
        if n_bins < 2 {
            continue;
        }
        let mut g_hist = vec![0.0; n_bins];
        let mut h_hist = vec![0.0; n_bins];
        let mut c_hist = vec![0usize; n_bins];
        for &i in rows {
            let b = binned.get(i, feature);
            g_hist[b] += grad[i];
            h_hist[b] += hess[i];
            c_hist[b] += 1;
        }

        let (mut gl, mut hl, mut nl) = (0.0, 0.0, 0usize);
        for bin in 0..n_bins - 1 {
            gl += g_hist[bin];
            hl += h_hist[bin];
            nl += c_hist[bin];
            let (gr, hr, nr) = (g_total - gl, h_total - hl, n_total - nl);
            if nl < params.min_child_samples || nr < params.min_child_samples {
                continue;
            }
            if hl < params.min_child_weight || hr < params.min_child_weight {
                continue;
            }
            let gain = 0.5 * (score(gl, hl, params.reg_lambda) + score(gr, hr, params.reg_lambda) - parent) - params.gamma;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(Candidate { gain, node, feature, bin });
            }
        }
    }
    best
}

/// Grow one tree best-first on `rows` using the given column subset.
///
/// Returns the tree and the total split gain per feature.
pub fn grow_tree(
    binned: &BinnedMatrix,
    mapper: &BinMapper,
    grad: &[f64],
    hess: &[f64],
    rows: Vec<usize>,
    features: &[usize],
    params: &GrowParams,
) -> (GradNode, Vec<f64>) {
    let mut gains = vec![0.0; binned.n_features()];
    let mut slots = vec![Slot::Leaf { rows, depth: 0 }];
    let mut heap = BinaryHeap::new();
    let max_leaves = params.max_leaves.unwrap_or(usize::MAX).max(1);

    let push_candidate = |slots: &[Slot], node: usize, heap: &mut BinaryHeap<Candidate>| {
        if let Slot::Leaf { rows, depth } = &slots[node] {
            if *depth < params.max_depth && rows.len() >= 2 * params.min_child_samples.max(1) {
                if let Some(c) = best_split(binned, mapper, grad, hess, rows, features, node, params) {
                    heap.push(c);
                }
            }
        }
    };

    push_candidate(&slots, 0, &mut heap);
    let mut n_leaves = 1;

    while n_leaves < max_leaves {
        let Some(cand) = heap.pop() else { break };
        let (rows, depth) = match std::mem::replace(
            &mut slots[cand.node],
            Slot::Split {
                feature: cand.feature,
                bin: cand.bin,
                left: 0,
                right: 0,
            },
        ) {
            Slot::Leaf { rows, depth } => (rows, depth),
            Slot::Split { .. } => continue,
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&i| binned.get(i, cand.feature) <= cand.bin);

        let left = slots.len();
        slots.push(Slot::Leaf { rows: left_rows, depth: depth + 1 });
        let right = slots.len();
        slots.push(Slot::Leaf { rows: right_rows, depth: depth + 1 });
        slots[cand.node] = Slot::Split {
            feature: cand.feature,
            bin: cand.bin,
            left,
            right,
        };
        gains[cand.feature] += cand.gain;
        n_leaves += 1;

        push_candidate(&slots, left, &mut heap);
        push_candidate(&slots, right, &mut heap);
    }

    let tree = to_node(&slots, 0, mapper, grad, hess, params);
    (tree, gains)
}

fn to_node(slots: &[Slot], idx: usize, mapper: &BinMapper, grad: &[f64], hess: &[f64], params: &GrowParams) -> GradNode {
    match &slots[idx] {
        Slot::Leaf { rows, .. } => {
            let g: f64 = rows.iter().map(|&i| grad[i]).sum();
            let h: f64 = rows.iter().map(|&i| hess[i]).sum();
            GradNode::Leaf {
                value: params.learning_rate * leaf_weight(g, h, params.reg_lambda),
            }
        }
        Slot::Split {
            feature,
            bin,
            left,
            right,
        } => GradNode::Split {
            feature: *feature,
            threshold: mapper.threshold(*feature, *bin),
            left: Box::new(to_node(slots, *left, mapper, grad, hess, params)),
            right: Box::new(to_node(slots, *right, mapper, grad, hess, params)),
        },
    }
}

/// Softmax of one row of margins, in place
pub fn softmax_in_place(margins: &mut [f64]) {
    let max = margins.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for m in margins.iter_mut() {
        *m = (*m - max).exp();
        sum += *m;
    }
    for m in margins.iter_mut() {
        *m /= sum;
    }
}

/// Row-wise softmax of a margin matrix
pub fn softmax_rows(margins: &Array2<f64>) -> Array2<f64> {
    let mut probs = margins.clone();
    for mut row in probs.rows_mut() {
        if let Some(slice) = row.as_slice_mut() {
            softmax_in_place(slice);
        } else {
            let mut v = row.to_vec();
            softmax_in_place(&mut v);
            row.iter_mut().zip(v).for_each(|(r, p)| *r = p);
        }
    }
    probs
}

/// Random subset of `0..n` of size ⌈n·ratio⌉, sorted
pub fn subsample<R: Rng>(rng: &mut R, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).clamp(1, n.max(1));
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

/// Normalise accumulated per-feature gains to sum to one
pub fn normalise(mut values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter_mut().for_each(|v| *v /= total);
    }
    values
}

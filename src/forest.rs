//! Isolation forest over fixed-width feature vectors.
//!
//! Each tree recursively splits a random sub-sample on a random feature at a
//! random threshold. Points that end up isolated after few splits are
//! outliers. Scores follow the usual convention of
//! `-2^(-E[h(x)] / c(psi))`: lower means more anomalous.

use crate::error::{Error, Result};
use crate::record::FeatureVector;
use crate::stats;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Unsupervised detector contract shared by the scoring pipeline.
pub trait OutlierModel: Send + Sync {
    fn fit(&mut self, x: &[FeatureVector]) -> Result<()>;

    /// Per-row scores, lower = more anomalous.
    fn score_samples(&self, x: &[FeatureVector]) -> Vec<f64>;

    /// -1 = anomaly, 1 = normal
    fn predict(&self, x: &[FeatureVector]) -> Vec<i8> {
        let threshold = self.threshold();
        self.score_samples(x)
            .into_iter()
            .map(|s| if s < threshold { -1 } else { 1 })
            .collect()
    }

    fn fit_predict(&mut self, x: &[FeatureVector]) -> Result<Vec<i8>> {
        self.fit(x)?;
        Ok(self.predict(x))
    }

    /// Decision threshold on `score_samples`.
    fn threshold(&self) -> f64;
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { size: usize },
    Split { feature: usize, threshold: f64, left: usize, right: usize },
}

#[derive(Debug, Clone)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(x: &[FeatureVector], sample: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = IsolationTree { nodes: Vec::new() };
        tree.grow(x, sample, 0, max_depth, rng);
        tree
    }

    fn grow(&mut self, x: &[FeatureVector], idx: Vec<usize>, depth: usize, max_depth: usize, rng: &mut StdRng) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: idx.len() });
        if depth >= max_depth || idx.len() <= 1 { return id; }

        // only features that still vary inside this node can split it
        let candidates: Vec<(usize, f64, f64)> = (0..x[idx[0]].len())
            .filter_map(|f| {
                let (lo, hi) = idx.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    (lo.min(x[i][f]), hi.max(x[i][f]))
                });
                if hi > lo { Some((f, lo, hi)) } else { None }
            })
            .collect();
        if candidates.is_empty() { return id; }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);
        let (l, r): (Vec<usize>, Vec<usize>) = idx.into_iter().partition(|&i| x[i][feature] < threshold);
        let left = self.grow(x, l, depth + 1, max_depth, rng);
        let right = self.grow(x, r, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split { feature, threshold, left, right };
        id
    }

    /// Depth at which `row` lands, plus the expected remaining depth of its leaf.
    pub fn path_length(&self, row: &FeatureVector) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split { feature, threshold, left, right } => {
                    node = if row[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
}

/// Average path length of an unsuccessful BST search over `n` points.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    n_estimators: usize,
    max_samples: usize,
    contamination: f64,
    random_state: u64,
    sample_size: usize,
    offset: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            random_state: 42,
            sample_size: 0,
            offset: f64::NEG_INFINITY,
            trees: Vec::new(),
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self { self.n_estimators = n.max(1); self }
    pub fn with_max_samples(mut self, n: usize) -> Self { self.max_samples = n.max(2); self }
    pub fn with_contamination(mut self, c: f64) -> Self { self.contamination = c; self }
    pub fn with_random_state(mut self, seed: u64) -> Self { self.random_state = seed; self }

    pub fn trees(&self) -> &[IsolationTree] { &self.trees }
    pub fn sample_size(&self) -> usize { self.sample_size }
}

impl Default for IsolationForest {
    fn default() -> Self { Self::new() }
}

impl OutlierModel for IsolationForest {
    fn fit(&mut self, x: &[FeatureVector]) -> Result<()> {
        if x.len() < 2 {
            return Err(Error::InsufficientData { rows: x.len(), required: 2 });
        }
        let n = x.len();
        self.sample_size = self.max_samples.min(n);
        let max_depth = (self.sample_size as f64).log2().ceil() as usize;

        // Seeds are drawn up front so tree i is the same whatever thread builds it.
        let mut master = StdRng::seed_from_u64(self.random_state);
        let seeds: Vec<u64> = (0..self.n_estimators).map(|_| master.gen()).collect();
        let sample_size = self.sample_size;
        self.trees = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let sample = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::build(x, sample, max_depth, &mut rng)
            })
            .collect();

        let scores = self.score_samples(x);
        self.offset = stats::quantile(&scores, self.contamination);
        Ok(())
    }

    fn score_samples(&self, x: &[FeatureVector]) -> Vec<f64> {
        if self.trees.is_empty() { return vec![0.0; x.len()]; }
        let norm = average_path_length(self.sample_size);
        let n_trees = self.trees.len() as f64;
        x.par_iter()
            .map(|row| {
                let mean_depth = self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / n_trees;
                -(2f64.powf(-mean_depth / norm))
            })
            .collect()
    }

    fn threshold(&self) -> f64 { self.offset }
}

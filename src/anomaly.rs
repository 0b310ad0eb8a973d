use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const MAX_SAMPLE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorSettings {
    #[serde(default = "default_trees")]
    pub trees: usize,
    /// Expected share of the batch to flag, in `(0, 0.5]`.
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_trees() -> usize {
    100
}

fn default_contamination() -> f64 {
    0.01
}

fn default_seed() -> u64 {
    42
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            trees: default_trees(),
            contamination: default_contamination(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Average path length of an unsuccessful search in a binary search tree of
/// `n` nodes. Normalizes isolation depths.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

fn build_tree(values: &mut [f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
    if depth >= max_depth || values.len() <= 1 {
        return Node::Leaf { size: values.len() };
    }
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if min >= max {
        return Node::Leaf { size: values.len() };
    }

    // threshold < max, so both sides are non-empty
    let threshold = rng.gen_range(min..max);
    let mut split = 0;
    for i in 0..values.len() {
        if values[i] <= threshold {
            values.swap(i, split);
            split += 1;
        }
    }
    let (left, right) = values.split_at_mut(split);
    Node::Split {
        threshold,
        left: Box::new(build_tree(left, depth + 1, max_depth, rng)),
        right: Box::new(build_tree(right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, x: f64) -> f64 {
    let mut node = node;
    let mut depth = 0usize;
    loop {
        match node {
            Node::Leaf { size } => return depth as f64 + average_path_length(*size),
            Node::Split {
                threshold,
                left,
                right,
            } => {
                node = if x <= *threshold { left } else { right };
                depth += 1;
            }
        }
    }
}

/// Linear-interpolated percentile of an ascending slice, `q` in `[0, 100]`.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Unsupervised outlier detection over a one-dimensional batch using an
/// ensemble of random partitioning trees.
pub struct IsolationForest {
    settings: DetectorSettings,
}

pub struct FittedForest {
    trees: Vec<Node>,
    sample_size: usize,
    /// Score above which a value counts as an outlier for the fitted batch.
    threshold: f64,
}

impl FittedForest {
    /// Anomaly score in `(0, 1]`; higher means easier to isolate.
    pub fn score(&self, x: f64) -> f64 {
        let norm = average_path_length(self.sample_size);
        if norm == 0.0 || self.trees.is_empty() {
            return 0.5;
        }
        let mean_depth =
            self.trees.iter().map(|t| path_length(t, x)).sum::<f64>() / self.trees.len() as f64;
        2f64.powf(-mean_depth / norm)
    }

    pub fn is_anomaly(&self, x: f64) -> bool {
        self.score(x) > self.threshold
    }
}

impl IsolationForest {
    pub fn new(settings: DetectorSettings) -> Self {
        Self { settings }
    }

    /// Grow the forest on `values` and set the outlier threshold at the
    /// `(1 - contamination)` percentile of the batch's own scores.
    pub fn fit(&self, values: &[f64]) -> FittedForest {
        let n = values.len();
        let sample_size = n.min(MAX_SAMPLE_SIZE);
        let max_depth = if sample_size > 1 {
            (sample_size as f64).log2().ceil() as usize
        } else {
            0
        };

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut trees = Vec::with_capacity(self.settings.trees);
        if n > 0 {
            for _ in 0..self.settings.trees {
                let mut sample: Vec<f64> = rand::seq::index::sample(&mut rng, n, sample_size)
                    .into_iter()
                    .map(|i| values[i])
                    .collect();
                trees.push(build_tree(&mut sample, 0, max_depth, &mut rng));
            }
        }

        let mut forest = FittedForest {
            trees,
            sample_size,
            threshold: f64::INFINITY,
        };
        if n > 0 {
            let mut scores: Vec<f64> = values.iter().map(|&v| forest.score(v)).collect();
            scores.sort_by(|a, b| a.total_cmp(b));
            let contamination = self.settings.contamination.clamp(0.0, 0.5);
            forest.threshold = percentile(&scores, 100.0 * (1.0 - contamination));
        }
        forest
    }

    /// One flag per input value. Flags depend on the whole batch.
    pub fn fit_predict(&self, values: &[f64]) -> Vec<bool> {
        if values.is_empty() {
            return Vec::new();
        }
        let forest = self.fit(values);
        debug!(
            batch = values.len(),
            sample_size = forest.sample_size,
            threshold = forest.threshold,
            "fitted isolation forest"
        );
        values.iter().map(|&v| forest.is_anomaly(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> IsolationForest {
        IsolationForest::new(DetectorSettings::default())
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.244).abs() < 0.01, "c(256) = {c256}");
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 100.0), 5.0);
        assert_eq!(percentile(&v, 50.0), 3.0);
        assert!((percentile(&v, 90.0) - 4.6).abs() < 1e-12);
    }

    #[test]
    fn test_empty_batch() {
        assert!(detector().fit_predict(&[]).is_empty());
    }

    #[test]
    fn test_single_value() {
        assert_eq!(detector().fit_predict(&[42.0]), vec![false]);
    }

    #[test]
    fn test_identical_amounts_flag_nothing() {
        let values = vec![25.0; 500];
        let flags = detector().fit_predict(&values);
        assert_eq!(flags.len(), 500);
        assert_eq!(flags.iter().filter(|f| **f).count(), 0);
    }

    #[test]
    fn test_uniform_batch_flags_about_one_percent() {
        let values: Vec<f64> = (0..1000).map(|i| 20.0 + (i as f64) * 0.05).collect();
        let flagged = detector().fit_predict(&values).iter().filter(|f| **f).count();
        assert!((5..=15).contains(&flagged), "flagged {flagged}");
    }

    #[test]
    fn test_extreme_outlier_is_flagged() {
        let mut values: Vec<f64> = (0..999).map(|i| 10.0 + (i % 40) as f64).collect();
        values.push(25_000.0);
        let flags = detector().fit_predict(&values);
        assert!(flags[999], "outlier not flagged");
        assert!(flags.iter().filter(|f| **f).count() <= 15);
    }

    #[test]
    fn test_outlier_scores_higher_than_inliers() {
        let mut values: Vec<f64> = (0..200).map(|i| 50.0 + (i % 10) as f64).collect();
        values.push(5_000.0);
        let forest = detector().fit(&values);
        assert!(forest.score(5_000.0) > forest.score(55.0));
        assert!(forest.score(5_000.0) > forest.threshold);
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let values: Vec<f64> = (0..300).map(|i| ((i * 37) % 101) as f64 * 1.5).collect();
        assert_eq!(detector().fit_predict(&values), detector().fit_predict(&values));
    }

    #[test]
    fn test_flags_depend_on_batch() {
        let d = detector();
        let small: Vec<f64> = (0..100).map(|i| 10.0 + i as f64).collect();
        let forest_small = d.fit(&small);
        let mut wide = small.clone();
        wide.extend((0..100).map(|i| 10_000.0 + i as f64 * 100.0));
        let forest_wide = d.fit(&wide);
        assert_ne!(forest_small.score(109.0), forest_wide.score(109.0));
    }
}

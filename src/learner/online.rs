//! Online (streaming) tree learner.
//!
//! Processes one example at a time against a persistent tree, keeping
//! live candidate-split statistics on every leaf and committing a split
//! once the entropy gain of the best candidate crosses the configured
//! minimum. Past data is never re-scanned; degenerate outcomes are
//! silent no-ops and the leaf simply keeps accumulating.
use crate::config::OnlineConfig;
use crate::constants::{THRESHOLD_RETRIES, TIE_EPSILON};
use crate::data::DataSet;
use crate::errors::TreeLearnError;
use crate::histogram::ClassHistogram;
use crate::learner::{leaf_log_probs, LearnState};
use crate::sampler::{poisson_draw, sample_features, ThresholdSampler};
use crate::tree::{LeafStats, SplitRule, Tree};
use log::debug;
use rand::rngs::StdRng;

/// Updates a tree in place from a stream of examples.
#[derive(Debug, Clone, Default)]
pub struct OnlineLearner {
    pub config: OnlineConfig,
}

impl OnlineLearner {
    pub fn new(config: OnlineConfig) -> Self {
        OnlineLearner { config }
    }

    /// Feed every example of `data`, in order, into the tree. The tree
    /// may be empty (a root is added) or carry state from earlier
    /// calls; processing is strictly sequential because each example's
    /// statistics depend on the tree's state at that point.
    pub fn learn<D: DataSet, T: ThresholdSampler>(
        &self,
        data: &D,
        thresholds: &T,
        tree: &mut Tree,
        rng: &mut StdRng,
        state: &mut LearnState,
    ) -> Result<(), TreeLearnError> {
        state.reset();
        state.started = true;
        self.config.validate(data)?;

        let dimensionality = data.dimensionality();
        if thresholds.dimensionality() != dimensionality {
            return Err(TreeLearnError::InvalidParameter(
                "threshold sampler".to_string(),
                format!("dimensionality {}", dimensionality),
                thresholds.dimensionality().to_string(),
            ));
        }
        let classes = data.class_count();
        let num_features = self.config.resolved_num_features(dimensionality);
        let num_thresholds = self.config.num_thresholds;
        state.total = data.len();

        if tree.is_empty() {
            tree.add_node();
        }

        for n in 0..data.len() {
            let x = data.data_point(n);
            if let Some(feature) = x.iter().position(|v| !v.is_finite()) {
                return Err(TreeLearnError::NonFiniteFeature(n, feature, x[feature]));
            }
            let label = data.class_label(n);

            let leaf = tree.find_leaf(x);
            let depth = tree.node(leaf).depth;
            state.processed += 1;
            state.num_nodes = tree.len();
            state.depth = state.depth.max(depth);

            // A fresh leaf gets its candidate grid sampled once, for
            // its whole lifetime.
            if tree.node(leaf).stats.is_none() {
                tree.node_mut(leaf).stats = Some(Box::new(self.fresh_leaf_stats(
                    classes,
                    dimensionality,
                    num_features,
                    thresholds,
                    rng,
                )));
            }

            let replicas = if self.config.use_bootstrap {
                poisson_draw(self.config.bootstrap_lambda, rng)
            } else {
                1
            };

            let stats = tree
                .node_mut(leaf)
                .stats
                .as_mut()
                .expect("leaf stats were just initialized");
            for _ in 0..replicas {
                stats.node_stats.add_one(label);
                for (f, &feature) in stats.features.iter().enumerate() {
                    for (t, &threshold) in stats.thresholds[f].iter().enumerate() {
                        let slot = t + num_thresholds * f;
                        if x[feature] < threshold {
                            stats.left_stats[slot].add_one(label);
                        } else {
                            stats.right_stats[slot].add_one(label);
                        }
                    }
                }
            }

            // Same stop criteria as the batch learners.
            if stats.node_stats.mass() < self.config.min_split_examples
                || stats.node_stats.is_pure()
                || depth >= self.config.max_depth
            {
                let log_probs = leaf_log_probs(&stats.node_stats, self.config.smoothing);
                tree.node_mut(leaf).log_probs = log_probs;
                continue;
            }

            // Scan every (feature, threshold) slot for the best gain.
            let parent_entropy = stats.node_stats.entropy();
            let mut best_gain = 0.0;
            let mut best_slot: Option<(usize, usize)> = None;
            for f in 0..stats.features.len() {
                for t in 0..stats.thresholds[f].len() {
                    let slot = t + num_thresholds * f;
                    let left_mass = stats.left_stats[slot].mass();
                    let right_mass = stats.right_stats[slot].mass();
                    if left_mass > self.config.min_child_examples && right_mass > self.config.min_child_examples {
                        let gain = parent_entropy
                            - stats.left_stats[slot].entropy()
                            - stats.right_stats[slot].entropy();
                        if gain > best_gain {
                            best_gain = gain;
                            best_slot = Some((f, t));
                        }
                    }
                }
            }

            let (best_feature, best_threshold) = match best_slot {
                Some(slot) if best_gain >= self.config.min_split_gain => slot,
                _ => {
                    // Not enough evidence yet; keep accumulating.
                    let log_probs = leaf_log_probs(&stats.node_stats, self.config.smoothing);
                    tree.node_mut(leaf).log_probs = log_probs;
                    continue;
                }
            };

            let feature = stats.features[best_feature];
            let threshold = stats.thresholds[best_feature][best_threshold];
            let slot = best_threshold + num_thresholds * best_feature;
            let left_hist = stats.left_stats[slot].clone();
            let right_hist = stats.right_stats[slot].clone();

            debug!(
                "leaf {}: online split on feature {} at {} (gain {})",
                leaf, feature, threshold, best_gain
            );

            // Commit: the winning slot's histograms seed the children's
            // leaf histograms; all other candidate state of the parent
            // is discarded by split_node.
            tree.node_mut(leaf).split = Some(SplitRule::AxisAligned { feature, threshold });
            let left = tree.split_node(leaf);
            tree.node_mut(left).log_probs = leaf_log_probs(&left_hist, self.config.smoothing);
            tree.node_mut(left + 1).log_probs = leaf_log_probs(&right_hist, self.config.smoothing);
            state.num_nodes = tree.len();
        }

        state.terminated = true;
        Ok(())
    }

    /// Sample the candidate grid for a fresh leaf: a feature subset and
    /// per-feature thresholds, with bounded retries against
    /// near-duplicate successive thresholds, plus zeroed left/right
    /// histogram pairs for every slot.
    fn fresh_leaf_stats<T: ThresholdSampler>(
        &self,
        classes: usize,
        dimensionality: usize,
        num_features: usize,
        thresholds: &T,
        rng: &mut StdRng,
    ) -> LeafStats {
        let num_thresholds = self.config.num_thresholds;
        let features = sample_features(dimensionality, num_features, rng);

        let mut grids: Vec<Vec<f64>> = Vec::with_capacity(num_features);
        for &feature in &features {
            let mut grid: Vec<f64> = Vec::with_capacity(num_thresholds);
            for t in 0..num_thresholds {
                let mut value = thresholds.sample(feature, rng);
                if t > 0 {
                    let mut tries = 0;
                    while (value - grid[t - 1]).abs() < TIE_EPSILON && tries < THRESHOLD_RETRIES {
                        value = thresholds.sample(feature, rng);
                        tries += 1;
                    }
                }
                grid.push(value);
            }
            grids.push(grid);
        }

        let slots = num_features * num_thresholds;
        LeafStats {
            node_stats: ClassHistogram::new(classes),
            features,
            thresholds: grids,
            left_stats: (0..slots).map(|_| ClassHistogram::new(classes)).collect(),
            right_stats: (0..slots).map(|_| ClassHistogram::new(classes)).collect(),
        }
    }
}

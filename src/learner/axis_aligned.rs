//! Batch axis-aligned tree learner.
//!
//! At every pending node the learner exactly searches a sampled feature
//! subset via a sort-based sweep: examples move one at a time from the
//! right histogram to the left one, and every valid split point is
//! scored as `entropy(left) + entropy(right)`.
use crate::config::TreeConfig;
use crate::constants::TIE_EPSILON;
use crate::data::{DataSet, DataStorage};
use crate::errors::TreeLearnError;
use crate::histogram::ClassHistogram;
use crate::learner::{finalize_leaf, refresh_leaf_histograms, should_stop, LearnState, PendingNode};
use crate::sampler::sample_features;
use crate::tree::{SplitRule, Tree};
use log::debug;
use rand::rngs::StdRng;

/// Grows a tree by exact threshold search over sampled features.
#[derive(Debug, Clone, Default)]
pub struct AxisAlignedLearner {
    pub config: TreeConfig,
}

impl AxisAlignedLearner {
    pub fn new(config: TreeConfig) -> Self {
        AxisAlignedLearner { config }
    }

    /// Learn a tree from the dataset. Randomness is drawn only from the
    /// caller-owned generator, so a fixed seed reproduces the tree.
    pub fn learn<D: DataSet + Sync>(
        &self,
        data: &D,
        rng: &mut StdRng,
        state: &mut LearnState,
    ) -> Result<Tree, TreeLearnError> {
        state.reset();
        state.started = true;
        self.config.validate_feature_subset(data)?;

        let resample: Option<DataStorage> = if self.config.use_bootstrap {
            let count = self.config.resolved_bootstrap_examples(data.len());
            Some(data.bootstrap(count, rng).0)
        } else {
            None
        };

        let mut tree = match &resample {
            Some(storage) => self.grow(storage, rng, state)?,
            None => self.grow(data, rng, state)?,
        };

        // Bootstrap statistics are biased; re-accumulate every leaf over
        // the full dataset before smoothing.
        if self.config.use_bootstrap {
            refresh_leaf_histograms(&mut tree, data, self.config.smoothing, true);
        }

        state.terminated = true;
        Ok(tree)
    }

    fn grow<D: DataSet>(&self, storage: &D, rng: &mut StdRng, state: &mut LearnState) -> Result<Tree, TreeLearnError> {
        let dimensionality = storage.dimensionality();
        let classes = storage.class_count();
        let num_features = self.config.resolved_num_features(dimensionality);
        state.total = storage.len();

        let mut tree = Tree::new();
        let root = tree.add_node();
        let mut worklist = vec![PendingNode {
            node: root,
            examples: (0..storage.len()).collect(),
        }];

        let mut left_hist = ClassHistogram::new(classes);

        while let Some(PendingNode { node, mut examples }) = worklist.pop() {
            state.num_nodes = tree.len();
            state.depth = state.depth.max(tree.node(node).depth);
            let n = examples.len();

            let mut hist = ClassHistogram::new(classes);
            for &i in &examples {
                hist.add_one(storage.class_label(i));
            }

            if should_stop(&hist, tree.node(node).depth, self.config.min_split_examples, self.config.max_depth) {
                finalize_leaf(&mut tree, node, &hist, self.config.smoothing, self.config.use_bootstrap)?;
                state.processed += n;
                continue;
            }

            let mut best: Option<(usize, f64)> = None;
            let mut best_objective = f64::INFINITY;
            let mut best_left_mass = 0;
            let mut best_right_mass = n;

            for feature in sample_features(dimensionality, num_features, rng) {
                examples.sort_unstable_by(|&a, &b| {
                    storage.data_point(a)[feature].total_cmp(&storage.data_point(b)[feature])
                });

                left_hist.reset();
                let mut right_hist = hist.clone();
                let mut left_value = storage.data_point(examples[0])[feature];
                let mut left_class = storage.class_label(examples[0]);

                for &i in &examples[1..] {
                    // Move the previous point over to the left histogram.
                    left_hist.add_one(left_class);
                    right_hist.sub_one(left_class);

                    let right_value = storage.data_point(i)[feature];

                    // Skip split points inside a run of numerically tied
                    // values.
                    let diff = (right_value - left_value).abs();
                    let scale = f64::max((right_value + TIE_EPSILON).abs(), (left_value + TIE_EPSILON).abs());
                    if diff < TIE_EPSILON * scale {
                        left_value = right_value;
                        left_class = storage.class_label(i);
                        continue;
                    }

                    let objective = left_hist.entropy() + right_hist.entropy();
                    if objective < best_objective {
                        best_objective = objective;
                        best = Some((feature, 0.5 * (left_value + right_value)));
                        best_left_mass = left_hist.mass();
                        best_right_mass = right_hist.mass();
                    }

                    left_value = right_value;
                    left_class = storage.class_label(i);
                }
            }

            let (feature, threshold) = match best {
                Some(found)
                    if best_left_mass >= self.config.min_child_examples
                        && best_right_mass >= self.config.min_child_examples =>
                {
                    found
                }
                _ => {
                    // No feature yields two viable children; resolve as
                    // a leaf instead.
                    finalize_leaf(&mut tree, node, &hist, self.config.smoothing, self.config.use_bootstrap)?;
                    state.processed += n;
                    continue;
                }
            };

            // Partition under the committed rule; values below the
            // threshold go left, ties go right. The threshold lies
            // strictly between two observed distinct values.
            let mut left_examples = Vec::with_capacity(best_left_mass);
            let mut right_examples = Vec::with_capacity(best_right_mass);
            for &i in &examples {
                let value = storage.data_point(i)[feature];
                if !value.is_finite() {
                    return Err(TreeLearnError::NonFiniteFeature(i, feature, value));
                }
                if value < threshold {
                    left_examples.push(i);
                } else {
                    right_examples.push(i);
                }
            }

            debug!(
                "node {}: split on feature {} at {} ({}/{} examples)",
                node,
                feature,
                threshold,
                left_examples.len(),
                right_examples.len()
            );

            tree.node_mut(node).split = Some(SplitRule::AxisAligned { feature, threshold });
            let left = tree.split_node(node);
            worklist.push(PendingNode {
                node: left,
                examples: left_examples,
            });
            worklist.push(PendingNode {
                node: left + 1,
                examples: right_examples,
            });
        }

        state.num_nodes = tree.len();
        Ok(tree)
    }
}

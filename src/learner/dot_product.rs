//! Batch dot-product (metric-learning-style) tree learner.
//!
//! Same control flow as the axis-aligned learner, but each candidate
//! split samples two anchor points from two distinct classes present in
//! the node and splits on the perpendicular-bisector hyperplane between
//! them: `⟨x, b⟩ − ⟨x, a⟩ < ½(‖b‖² − ‖a‖²)`.
use crate::config::TreeConfig;
use crate::data::{DataSet, DataStorage};
use crate::errors::TreeLearnError;
use crate::histogram::ClassHistogram;
use crate::learner::{finalize_leaf, refresh_leaf_histograms, should_stop, LearnState, PendingNode};
use crate::sampler::{random_entry, sample_two};
use crate::tree::{SplitRule, Tree};
use log::debug;
use rand::rngs::StdRng;

#[inline]
fn squared_norm(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

/// Grows a tree with class-pair anchored bisector splits.
#[derive(Debug, Clone, Default)]
pub struct DotProductLearner {
    pub config: TreeConfig,
}

impl DotProductLearner {
    pub fn new(config: TreeConfig) -> Self {
        DotProductLearner { config }
    }

    /// Learn a tree from the dataset.
    pub fn learn<D: DataSet + Sync>(
        &self,
        data: &D,
        rng: &mut StdRng,
        state: &mut LearnState,
    ) -> Result<Tree, TreeLearnError> {
        state.reset();
        state.started = true;
        self.config.validate(data)?;

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

        if self.config.use_bootstrap {
            refresh_leaf_histograms(&mut tree, data, self.config.smoothing, true);
        }

        state.terminated = true;
        Ok(tree)
    }

    fn grow<D: DataSet>(&self, storage: &D, rng: &mut StdRng, state: &mut LearnState) -> Result<Tree, TreeLearnError> {
        let classes = storage.class_count();
        let num_candidates = self.config.resolved_num_features(storage.dimensionality());
        state.total = storage.len();

        let mut tree = Tree::new();
        let root = tree.add_node();
        let mut worklist = vec![PendingNode {
            node: root,
            examples: (0..storage.len()).collect(),
        }];

        let mut left_hist = ClassHistogram::new(classes);

        while let Some(PendingNode { node, examples }) = worklist.pop() {
            state.num_nodes = tree.len();
            state.depth = state.depth.max(tree.node(node).depth);
            let n = examples.len();

            // Bucket the node's examples by class; anchors are drawn
            // from these buckets.
            let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); classes];
            let mut hist = ClassHistogram::new(classes);
            for &i in &examples {
                let label = storage.class_label(i);
                hist.add_one(label);
                buckets[label].push(i);
            }

            if should_stop(&hist, tree.node(node).depth, self.config.min_split_examples, self.config.max_depth) {
                finalize_leaf(&mut tree, node, &hist, self.config.smoothing, self.config.use_bootstrap)?;
                state.processed += n;
                continue;
            }

            // Non-empty classes; at least two, since the node is not pure.
            let labels: Vec<usize> = (0..classes).filter(|&c| hist.at(c) > 0).collect();

            let mut best: Option<SplitRule> = None;
            let mut best_objective = f64::INFINITY;
            let mut best_left_mass = 0;
            let mut best_right_mass = n;

            for _ in 0..num_candidates {
                let (first, second) = sample_two(labels.len(), rng);
                let anchor_a = storage.data_point(*random_entry(&buckets[labels[first]], rng)).to_vec();
                let anchor_b = storage.data_point(*random_entry(&buckets[labels[second]], rng)).to_vec();
                let threshold = 0.5 * (squared_norm(&anchor_b) - squared_norm(&anchor_a));
                let rule = SplitRule::DotProduct {
                    anchor_a,
                    anchor_b,
                    threshold,
                };

                left_hist.reset();
                let mut right_hist = hist.clone();
                for &i in &examples {
                    if rule.goes_left(storage.data_point(i)) {
                        let label = storage.class_label(i);
                        left_hist.add_one(label);
                        right_hist.sub_one(label);
                    }
                }

                let objective = left_hist.entropy() + right_hist.entropy();
                if objective < best_objective {
                    best_objective = objective;
                    best_left_mass = left_hist.mass();
                    best_right_mass = right_hist.mass();
                    best = Some(rule);
                }
            }

            let rule = match best {
                Some(rule)
                    if best_left_mass >= self.config.min_child_examples
                        && best_right_mass >= self.config.min_child_examples =>
                {
                    rule
                }
                _ => {
                    finalize_leaf(&mut tree, node, &hist, self.config.smoothing, self.config.use_bootstrap)?;
                    state.processed += n;
                    continue;
                }
            };

            let mut left_examples = Vec::with_capacity(best_left_mass);
            let mut right_examples = Vec::with_capacity(best_right_mass);
            for &i in &examples {
                let point = storage.data_point(i);
                if let Some(feature) = point.iter().position(|v| !v.is_finite()) {
                    return Err(TreeLearnError::NonFiniteFeature(i, feature, point[feature]));
                }
                if rule.goes_left(point) {
                    left_examples.push(i);
                } else {
                    right_examples.push(i);
                }
            }

            debug!(
                "node {}: bisector split ({}/{} examples)",
                node,
                left_examples.len(),
                right_examples.len()
            );

            tree.node_mut(node).split = Some(rule);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataStorage;
    use rand::SeedableRng;

    /// Two tight clusters; anchors can only be the two cluster points,
    /// so every candidate bisector separates the classes exactly.
    fn two_point_clusters() -> DataStorage {
        let mut points = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..8 {
            points.push(vec![3.0, 4.0]);
            labels.push(0);
            points.push(vec![-2.0, -6.0]);
            labels.push(1);
        }
        DataStorage::from_vecs(&points, &labels)
    }

    #[test]
    fn test_separates_two_clusters() {
        let storage = two_point_clusters();
        let config = TreeConfig {
            num_features: Some(2),
            min_split_examples: 2,
            smoothing: 0.0,
            ..Default::default()
        };
        let tree = DotProductLearner::new(config)
            .learn(&storage, &mut StdRng::seed_from_u64(6), &mut LearnState::default())
            .unwrap();

        assert_eq!(tree.len(), 3);
        match &tree.node(0).split {
            Some(SplitRule::DotProduct {
                anchor_a,
                anchor_b,
                threshold,
            }) => {
                assert_eq!(anchor_a.len(), 2);
                assert_eq!(anchor_b.len(), 2);
                assert!(threshold.is_finite());
            }
            other => panic!("unexpected split {:?}", other),
        }
        for n in 0..storage.len() {
            let leaf = tree.find_leaf(storage.data_point(n));
            assert_eq!(tree.node(leaf).log_probs[storage.class_label(n)], 0.0);
        }
    }

    #[test]
    fn test_three_class_purity_with_recursion() {
        // Three well-separated tight clusters; bisectors between any
        // two cluster representatives carve them apart.
        let mut points = Vec::new();
        let mut labels = Vec::new();
        for _ in 0..6 {
            points.push(vec![0.0, 20.0]);
            labels.push(0);
            points.push(vec![20.0, -10.0]);
            labels.push(1);
            points.push(vec![-20.0, -10.0]);
            labels.push(2);
        }
        let storage = DataStorage::from_vecs(&points, &labels);
        let config = TreeConfig {
            num_features: Some(4),
            min_split_examples: 2,
            smoothing: 0.0,
            ..Default::default()
        };
        let tree = DotProductLearner::new(config)
            .learn(&storage, &mut StdRng::seed_from_u64(13), &mut LearnState::default())
            .unwrap();
        for n in 0..storage.len() {
            let leaf = tree.find_leaf(storage.data_point(n));
            assert_eq!(tree.node(leaf).log_probs[storage.class_label(n)], 0.0);
        }
    }

    #[test]
    fn test_candidate_count_may_exceed_dimensionality() {
        // The candidate count is a number of anchor pairs, not a
        // feature subset; far more candidates than dimensions is valid.
        let storage = two_point_clusters();
        let config = TreeConfig {
            num_features: Some(50),
            min_split_examples: 2,
            ..Default::default()
        };
        let tree = DotProductLearner::new(config)
            .learn(&storage, &mut StdRng::seed_from_u64(9), &mut LearnState::default())
            .unwrap();
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_determinism_under_fixed_seed() {
        let storage = two_point_clusters();
        let config = TreeConfig {
            num_features: Some(3),
            ..Default::default()
        };
        let tree_a = DotProductLearner::new(config.clone())
            .learn(&storage, &mut StdRng::seed_from_u64(77), &mut LearnState::default())
            .unwrap();
        let tree_b = DotProductLearner::new(config)
            .learn(&storage, &mut StdRng::seed_from_u64(77), &mut LearnState::default())
            .unwrap();
        assert_eq!(tree_a.to_string(), tree_b.to_string());
    }
}

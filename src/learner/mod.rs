//! Tree learners.
//!
//! Four learners share one control flow: a worklist of pending nodes,
//! each owning its example partition exclusively; stop criteria that
//! resolve a node into a smoothed leaf; and a candidate-split search
//! whose objective is the summed entropy of the two child histograms.
mod axis_aligned;
mod dot_product;
mod online;
mod projective;

pub use axis_aligned::AxisAlignedLearner;
pub use dot_product::DotProductLearner;
pub use online::OnlineLearner;
pub use projective::ProjectiveLearner;

use crate::data::DataSet;
use crate::errors::TreeLearnError;
use crate::histogram::ClassHistogram;
use crate::tree::Tree;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Progress record filled in by every learner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnState {
    pub started: bool,
    pub terminated: bool,
    /// Number of training examples presented to the learner.
    pub total: usize,
    /// Examples resolved into a leaf (batch) or consumed (online).
    pub processed: usize,
    pub num_nodes: usize,
    pub depth: usize,
}

impl LearnState {
    pub fn reset(&mut self) {
        *self = LearnState::default();
    }
}

/// A pending node together with the example indices it exclusively
/// owns. Ownership moves to the two child entries when a split commits
/// and is dropped when the node resolves as a leaf.
pub(crate) struct PendingNode {
    pub node: usize,
    pub examples: Vec<usize>,
}

/// Stop criteria shared by every learner: too little mass, already
/// pure, or the depth bound reached.
pub(crate) fn should_stop(hist: &ClassHistogram, depth: usize, min_split_examples: usize, max_depth: usize) -> bool {
    hist.mass() < min_split_examples || hist.is_pure() || depth >= max_depth
}

/// Convert class counts into the smoothed log-probability vector
/// `ln((count + α) / (mass + classes·α))`.
pub(crate) fn leaf_log_probs(hist: &ClassHistogram, smoothing: f64) -> Vec<f64> {
    let classes = hist.size() as f64;
    let mass = hist.mass() as f64;
    hist.counts()
        .iter()
        .map(|&count| ((count as f64 + smoothing) / (mass + classes * smoothing)).ln())
        .collect()
}

/// Resolve a batch node as a leaf. When the tree is being grown on a
/// bootstrap resample the log-probabilities are left unset; the global
/// refresh pass fills them in over the full dataset afterwards.
pub(crate) fn finalize_leaf(
    tree: &mut Tree,
    node: usize,
    hist: &ClassHistogram,
    smoothing: f64,
    use_bootstrap: bool,
) -> Result<(), TreeLearnError> {
    if hist.mass() == 0 {
        return Err(TreeLearnError::EmptyLeaf(node));
    }
    if !use_bootstrap {
        tree.node_mut(node).log_probs = leaf_log_probs(hist, smoothing);
    }
    Ok(())
}

/// Recompute every leaf's log-probability vector over the full,
/// unsampled dataset by routing each example down the finished tree and
/// re-accumulating per-leaf counts. Corrects the bias of
/// bootstrap-only statistics.
pub fn refresh_leaf_histograms<D: DataSet + Sync>(tree: &mut Tree, data: &D, smoothing: f64, parallel: bool) {
    let leaves: Vec<usize> = if parallel {
        (0..data.len())
            .into_par_iter()
            .map(|n| tree.find_leaf(data.data_point(n)))
            .collect()
    } else {
        (0..data.len()).map(|n| tree.find_leaf(data.data_point(n))).collect()
    };

    let classes = data.class_count();
    let mut hists: Vec<ClassHistogram> = (0..tree.len()).map(|_| ClassHistogram::new(classes)).collect();
    for (n, &leaf) in leaves.iter().enumerate() {
        hists[leaf].add_one(data.class_label(n));
    }
    for (index, hist) in hists.iter().enumerate() {
        if tree.node(index).is_leaf() {
            tree.node_mut(index).log_probs = leaf_log_probs(hist, smoothing);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SplitRule;

    #[test]
    fn test_leaf_log_probs_normalize() {
        let mut hist = ClassHistogram::new(3);
        for label in [0, 0, 1] {
            hist.add_one(label);
        }
        for smoothing in [1e-6, 0.5, 10.0] {
            let log_probs = leaf_log_probs(&hist, smoothing);
            let total: f64 = log_probs.iter().map(|lp| lp.exp()).sum();
            assert!((total - 1.0).abs() < 1e-9, "smoothing {}: {}", smoothing, total);
        }
    }

    #[test]
    fn test_leaf_log_probs_no_smoothing_pure() {
        let mut hist = ClassHistogram::new(2);
        hist.add_one(1);
        hist.add_one(1);
        let log_probs = leaf_log_probs(&hist, 0.0);
        assert_eq!(log_probs[1], 0.0);
        assert_eq!(log_probs[0], f64::NEG_INFINITY);
    }

    #[test]
    fn test_should_stop() {
        let mut hist = ClassHistogram::new(2);
        hist.add_one(0);
        hist.add_one(1);
        assert!(should_stop(&hist, 0, 3, 10)); // mass below minimum
        assert!(should_stop(&hist, 10, 2, 10)); // depth bound
        assert!(!should_stop(&hist, 0, 2, 10));
        hist.sub_one(1);
        hist.add_one(0);
        assert!(should_stop(&hist, 0, 2, 10)); // pure
    }

    #[test]
    fn test_refresh_leaf_histograms() {
        use crate::data::DataStorage;
        let storage = DataStorage::from_vecs(
            &[vec![0.0], vec![1.0], vec![10.0], vec![11.0]],
            &[0, 0, 1, 1],
        );
        let mut tree = Tree::new();
        let root = tree.add_node();
        tree.node_mut(root).split = Some(SplitRule::AxisAligned {
            feature: 0,
            threshold: 5.0,
        });
        tree.split_node(root);

        refresh_leaf_histograms(&mut tree, &storage, 0.0, false);
        assert_eq!(tree.node(1).log_probs[0], 0.0);
        assert_eq!(tree.node(2).log_probs[1], 0.0);

        // The parallel path computes the same result.
        let mut tree_par = tree.clone();
        refresh_leaf_histograms(&mut tree_par, &storage, 0.0, true);
        assert_eq!(tree.node(1).log_probs, tree_par.node(1).log_probs);
        assert_eq!(tree.node(2).log_probs, tree_par.node(2).log_probs);
    }
}

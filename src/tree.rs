//! Decision tree as a dense, growable node table.
//!
//! Nodes are identified by their index into `nodes`; indices, once
//! issued, are never invalidated or reused. The table guarantees index
//! stability but not reference stability across growth, so nodes are
//! always re-resolved by index and a reference is never held across an
//! operation that may append.
use crate::errors::TreeLearnError;
use crate::histogram::ClassHistogram;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::fs;
use std::path::Path;

/// The split descriptor of an internal node.
///
/// Exactly one shape is ever active per node, so the three learner
/// families share a single tree type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SplitRule {
    /// Threshold on a single feature.
    AxisAligned { feature: usize, threshold: f64 },
    /// Sparse random projection; examples with a negative projection go
    /// left. Stored as (dimension, weight) pairs with unique dimensions.
    Projection { weights: Vec<(usize, f64)> },
    /// Perpendicular-bisector hyperplane between two anchor points.
    /// Examples with `⟨x, b⟩ − ⟨x, a⟩` below the threshold go left.
    DotProduct {
        anchor_a: Vec<f64>,
        anchor_b: Vec<f64>,
        threshold: f64,
    },
}

impl SplitRule {
    /// Evaluate the routing decision for a feature vector.
    pub fn goes_left(&self, x: &[f64]) -> bool {
        match self {
            SplitRule::AxisAligned { feature, threshold } => x[*feature] < *threshold,
            SplitRule::Projection { weights } => {
                weights.iter().map(|(d, w)| w * x[*d]).sum::<f64>() < 0.0
            }
            SplitRule::DotProduct {
                anchor_a,
                anchor_b,
                threshold,
            } => {
                let mut inner = 0.0;
                for ((xi, ai), bi) in x.iter().zip(anchor_a.iter()).zip(anchor_b.iter()) {
                    inner += xi * bi - xi * ai;
                }
                inner < *threshold
            }
        }
    }
}

/// Live split-candidate statistics held by a leaf between visits of the
/// online learner. Created lazily on the first visit, discarded the
/// moment the leaf is split. Never serialized.
#[derive(Debug, Clone, Default)]
pub struct LeafStats {
    /// Running histogram of every example routed to this leaf.
    pub node_stats: ClassHistogram,
    /// Feature subset sampled once for this leaf's lifetime.
    pub features: Vec<usize>,
    /// Candidate thresholds per sampled feature.
    pub thresholds: Vec<Vec<f64>>,
    /// Left/right running histograms, one pair per (feature, threshold)
    /// slot, indexed `t + num_thresholds * f`.
    pub left_stats: Vec<ClassHistogram>,
    pub right_stats: Vec<ClassHistogram>,
}

/// A single tree node. A node is either a leaf (no split rule, holds the
/// smoothed log-probability vector) or internal (split rule and two
/// children) — transiently neither during construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub num: usize,
    pub depth: usize,
    pub split: Option<SplitRule>,
    /// Indices of the two children; meaningful only when `split` is set.
    /// The right child is always `left_child + 1`.
    pub left_child: usize,
    pub right_child: usize,
    /// Smoothed per-class log-probabilities; empty until the node is
    /// finalized as a leaf.
    pub log_probs: Vec<f64>,
    /// Online-only candidate state, dropped when the leaf is split.
    #[serde(skip)]
    pub stats: Option<Box<LeafStats>>,
}

impl Node {
    fn new(num: usize, depth: usize) -> Self {
        Node {
            num,
            depth,
            split: None,
            left_child: 0,
            right_child: 0,
            log_probs: Vec::new(),
            stats: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.split.is_none()
    }
}

/// An indexed, growable binary decision tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new() -> Self {
        Tree { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a fresh unresolved node at depth 0 and return its index.
    pub fn add_node(&mut self) -> usize {
        let num = self.nodes.len();
        self.nodes.push(Node::new(num, 0));
        num
    }

    /// Split a node whose split rule has already been set, allocating
    /// its two children as a contiguous pair. Returns the left child's
    /// index; the right child is `left + 1`. The former leaf's
    /// log-probability vector and candidate statistics are cleared.
    pub fn split_node(&mut self, index: usize) -> usize {
        debug_assert!(self.nodes[index].split.is_some(), "split rule must be set before splitting");
        let depth = self.nodes[index].depth + 1;
        let left = self.nodes.len();
        self.nodes.push(Node::new(left, depth));
        self.nodes.push(Node::new(left + 1, depth));
        let parent = &mut self.nodes[index];
        parent.left_child = left;
        parent.right_child = left + 1;
        parent.log_probs.clear();
        parent.stats = None;
        left
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut Node {
        &mut self.nodes[index]
    }

    /// Maximum node depth in the tree.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Route a feature vector down the tree to its leaf node index.
    /// This is the sole traversal primitive inference tooling needs.
    pub fn find_leaf(&self, x: &[f64]) -> usize {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            match &node.split {
                None => return index,
                Some(rule) => {
                    index = if rule.goes_left(x) {
                        node.left_child
                    } else {
                        node.right_child
                    };
                }
            }
        }
    }

    /// Serialize the tree to a JSON string.
    pub fn json_dump(&self) -> Result<String, TreeLearnError> {
        serde_json::to_string(self).map_err(|e| TreeLearnError::UnableToWrite(e.to_string()))
    }

    /// Deserialize a tree from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, TreeLearnError> {
        serde_json::from_str(json_str).map_err(|e| TreeLearnError::UnableToRead(e.to_string()))
    }

    /// Save the tree as JSON to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TreeLearnError> {
        let json = self.json_dump()?;
        fs::write(path, json).map_err(|e| TreeLearnError::UnableToWrite(e.to_string()))
    }

    /// Load a tree from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TreeLearnError> {
        let json = fs::read_to_string(path).map_err(|e| TreeLearnError::UnableToRead(e.to_string()))?;
        Self::from_json(&json)
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.split {
            None => write!(f, "{}:leaf,depth={}", self.num, self.depth),
            Some(SplitRule::AxisAligned { feature, threshold }) => write!(
                f,
                "{}:[f{} < {}] yes={},no={}",
                self.num, feature, threshold, self.left_child, self.right_child
            ),
            Some(SplitRule::Projection { weights }) => write!(
                f,
                "{}:[proj {:?} < 0] yes={},no={}",
                self.num, weights, self.left_child, self.right_child
            ),
            Some(SplitRule::DotProduct { threshold, .. }) => write!(
                f,
                "{}:[bisector < {}] yes={},no={}",
                self.num, threshold, self.left_child, self.right_child
            ),
        }
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.nodes.is_empty() {
            return Ok(());
        }
        let mut print_buffer: Vec<usize> = vec![0];
        let mut r = String::new();
        while let Some(index) = print_buffer.pop() {
            let node = &self.nodes[index];
            r += format!("{}{}\n", "      ".repeat(node.depth).as_str(), node).as_str();
            if !node.is_leaf() {
                print_buffer.push(node.right_child);
                print_buffer.push(node.left_child);
            }
        }
        write!(f, "{}", r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_split_node() {
        let mut tree = Tree::new();
        let root = tree.add_node();
        assert_eq!(root, 0);
        assert_eq!(tree.node(root).depth, 0);
        assert!(tree.node(root).is_leaf());

        tree.node_mut(root).log_probs = vec![0.0, 0.0];
        tree.node_mut(root).split = Some(SplitRule::AxisAligned {
            feature: 0,
            threshold: 1.5,
        });
        let left = tree.split_node(root);
        assert_eq!(left, 1);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.node(root).left_child, 1);
        assert_eq!(tree.node(root).right_child, 2);
        assert_eq!(tree.node(1).depth, 1);
        assert_eq!(tree.node(2).depth, 1);
        // The parent's leaf payload is cleared once it becomes internal.
        assert!(tree.node(root).log_probs.is_empty());
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_find_leaf_routing() {
        let mut tree = Tree::new();
        let root = tree.add_node();
        tree.node_mut(root).split = Some(SplitRule::AxisAligned {
            feature: 0,
            threshold: 0.5,
        });
        let left = tree.split_node(root);
        assert_eq!(tree.find_leaf(&[0.0, 9.0]), left);
        assert_eq!(tree.find_leaf(&[1.0, -9.0]), left + 1);
        // Ties at the threshold route right.
        assert_eq!(tree.find_leaf(&[0.5, 0.0]), left + 1);
    }

    #[test]
    fn test_projection_and_dot_product_routing() {
        let projection = SplitRule::Projection {
            weights: vec![(0, 1.0), (1, -1.0)],
        };
        assert!(projection.goes_left(&[0.0, 1.0]));
        assert!(!projection.goes_left(&[1.0, 0.0]));

        // Bisector between a = (0, 0) and b = (2, 0) is the line x = 1.
        let bisector = SplitRule::DotProduct {
            anchor_a: vec![0.0, 0.0],
            anchor_b: vec![2.0, 0.0],
            threshold: 2.0,
        };
        assert!(bisector.goes_left(&[0.0, 5.0]));
        assert!(!bisector.goes_left(&[2.0, -3.0]));
    }

    #[test]
    fn test_json_roundtrip_skips_stats() {
        let mut tree = Tree::new();
        let root = tree.add_node();
        tree.node_mut(root).stats = Some(Box::new(LeafStats::default()));
        tree.node_mut(root).log_probs = vec![-0.1, -2.3];
        let json = tree.json_dump().unwrap();
        let restored = Tree::from_json(&json).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.node(0).log_probs, vec![-0.1, -2.3]);
        assert!(restored.node(0).stats.is_none());
    }
}

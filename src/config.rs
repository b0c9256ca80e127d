//! Learner configuration.
//!
//! Plain numeric/boolean knobs shared by the batch learners, plus the
//! extra knobs of the online learner. All of them serialize, so a
//! training run can be reproduced from a stored config and seed.
use crate::data::DataSet;
use crate::errors::TreeLearnError;
use serde::{Deserialize, Serialize};

/// Configuration for the batch tree learners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Number of feature/candidate evaluations per node. `None` resolves
    /// to ⌊√dimensionality⌋ at learn time.
    pub num_features: Option<usize>,
    /// Train on a bootstrap resample and refresh leaf histograms over
    /// the full dataset afterwards.
    pub use_bootstrap: bool,
    /// Size of the bootstrap resample; `None` resolves to the dataset
    /// size.
    pub num_bootstrap_examples: Option<usize>,
    /// Nodes at this depth are never split.
    pub max_depth: usize,
    /// Minimum number of examples for a node to be considered for
    /// splitting.
    pub min_split_examples: usize,
    /// Minimum number of examples each child must receive for a split
    /// to be accepted.
    pub min_child_examples: usize,
    /// Additive (Laplace) smoothing constant for leaf log-probabilities.
    pub smoothing: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        TreeConfig {
            num_features: None,
            use_bootstrap: false,
            num_bootstrap_examples: None,
            max_depth: 100,
            min_split_examples: 2,
            min_child_examples: 1,
            smoothing: 1e-4,
        }
    }
}

impl TreeConfig {
    /// The effective feature budget for a given dimensionality.
    pub fn resolved_num_features(&self, dimensionality: usize) -> usize {
        self.num_features
            .unwrap_or_else(|| (dimensionality as f64).sqrt().floor() as usize)
            .max(1)
    }

    /// The effective bootstrap sample count for a given dataset size.
    pub fn resolved_bootstrap_examples(&self, len: usize) -> usize {
        self.num_bootstrap_examples.unwrap_or(len)
    }

    /// Check the configuration against a dataset. Violations are fatal.
    ///
    /// `num_features` is not bounded here: the projection and
    /// dot-product learners treat it as a candidate count and accept
    /// any value. The axis-aligned learner, which samples an actual
    /// feature subset, additionally calls
    /// [`validate_feature_subset`](Self::validate_feature_subset).
    pub fn validate<D: DataSet>(&self, data: &D) -> Result<(), TreeLearnError> {
        if data.is_empty() || data.class_count() == 0 {
            return Err(TreeLearnError::EmptyDataset);
        }
        if !self.smoothing.is_finite() || self.smoothing < 0.0 {
            return Err(TreeLearnError::InvalidParameter(
                "smoothing".to_string(),
                "finite value >= 0".to_string(),
                self.smoothing.to_string(),
            ));
        }
        if self.min_child_examples < 1 {
            return Err(TreeLearnError::InvalidParameter(
                "min_child_examples".to_string(),
                "value >= 1".to_string(),
                self.min_child_examples.to_string(),
            ));
        }
        Ok(())
    }

    /// [`validate`](Self::validate), plus the requirement that the
    /// feature budget fits the dimensionality. Only meaningful for
    /// learners that sample a without-replacement feature subset.
    pub fn validate_feature_subset<D: DataSet>(&self, data: &D) -> Result<(), TreeLearnError> {
        self.validate(data)?;
        let num_features = self.resolved_num_features(data.dimensionality());
        if num_features > data.dimensionality() {
            return Err(TreeLearnError::FeatureBudget(num_features, data.dimensionality()));
        }
        Ok(())
    }
}

/// Configuration for the online learner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineConfig {
    /// Number of candidate features per leaf. `None` resolves to
    /// ⌊√dimensionality⌋.
    pub num_features: Option<usize>,
    /// Number of candidate thresholds per candidate feature.
    pub num_thresholds: usize,
    /// Nodes at this depth are never split.
    pub max_depth: usize,
    /// Minimum leaf mass before a split is considered.
    pub min_split_examples: usize,
    /// Minimum candidate-child mass for a slot to be eligible. The
    /// comparison is strict: a child must exceed this count.
    pub min_child_examples: usize,
    /// Minimum entropy gain required to commit a split.
    pub min_split_gain: f64,
    /// Additive smoothing constant for leaf log-probabilities.
    pub smoothing: f64,
    /// Replicate each example a Poisson-distributed number of times
    /// (online bagging). A zero draw skips the example.
    pub use_bootstrap: bool,
    /// Mean of the Poisson replication count.
    pub bootstrap_lambda: f64,
}

impl Default for OnlineConfig {
    fn default() -> Self {
        OnlineConfig {
            num_features: None,
            num_thresholds: 10,
            max_depth: 100,
            min_split_examples: 2,
            min_child_examples: 1,
            min_split_gain: 1e-2,
            smoothing: 1e-4,
            use_bootstrap: false,
            bootstrap_lambda: 1.0,
        }
    }
}

impl OnlineConfig {
    /// The effective feature budget for a given dimensionality.
    pub fn resolved_num_features(&self, dimensionality: usize) -> usize {
        self.num_features
            .unwrap_or_else(|| (dimensionality as f64).sqrt().floor() as usize)
            .max(1)
    }

    /// Check the configuration against a dataset. Violations are fatal.
    pub fn validate<D: DataSet>(&self, data: &D) -> Result<(), TreeLearnError> {
        if data.is_empty() || data.class_count() == 0 {
            return Err(TreeLearnError::EmptyDataset);
        }
        let num_features = self.resolved_num_features(data.dimensionality());
        if num_features > data.dimensionality() {
            return Err(TreeLearnError::FeatureBudget(num_features, data.dimensionality()));
        }
        if self.num_thresholds == 0 {
            return Err(TreeLearnError::InvalidParameter(
                "num_thresholds".to_string(),
                "value >= 1".to_string(),
                self.num_thresholds.to_string(),
            ));
        }
        if !self.smoothing.is_finite() || self.smoothing < 0.0 {
            return Err(TreeLearnError::InvalidParameter(
                "smoothing".to_string(),
                "finite value >= 0".to_string(),
                self.smoothing.to_string(),
            ));
        }
        if self.use_bootstrap && !(self.bootstrap_lambda > 0.0 && self.bootstrap_lambda.is_finite()) {
            return Err(TreeLearnError::InvalidParameter(
                "bootstrap_lambda".to_string(),
                "finite value > 0".to_string(),
                self.bootstrap_lambda.to_string(),
            ));
        }
        Ok(())
    }
}

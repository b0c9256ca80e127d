// Modules
pub mod config;
pub mod constants;
pub mod data;
pub mod errors;
pub mod histogram;
pub mod learner;
pub mod sampler;
pub mod tree;

// Individual classes, and functions
pub use config::{OnlineConfig, TreeConfig};
pub use data::{DataSet, DataStorage};
pub use errors::TreeLearnError;
pub use histogram::ClassHistogram;
pub use learner::{
    refresh_leaf_histograms, AxisAlignedLearner, DotProductLearner, LearnState, OnlineLearner,
    ProjectiveLearner,
};
pub use sampler::{ThresholdSampler, UniformThresholdSampler};
pub use tree::{Node, SplitRule, Tree};

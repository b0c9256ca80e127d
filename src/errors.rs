//! Errors
//!
//! Custom error types used throughout the `arbora` crate.
use thiserror::Error;

/// Errors that can occur while inducing a decision tree.
///
/// All of these are contract violations; they abort the current build
/// rather than produce a corrupt tree. Degenerate split outcomes (no
/// feature improves the objective, no candidate beats the minimum gain)
/// are normal control flow and resolve a node to a leaf instead.
#[derive(Debug, Error)]
pub enum TreeLearnError {
    /// The feature sample budget exceeds the data dimensionality.
    #[error("The number of feature evaluations {0} must not exceed the feature dimension {1}.")]
    FeatureBudget(usize, usize),
    /// The dataset has no examples or no classes.
    #[error("The dataset is empty or reports zero classes.")]
    EmptyDataset,
    /// A leaf was produced with no class mass.
    #[error("Node {0} was resolved as a leaf with no class mass.")]
    EmptyLeaf(usize),
    /// NaN or infinite feature value encountered while partitioning.
    #[error("Non-finite feature value {2} at example {0}, feature {1}.")]
    NonFiniteFeature(usize, usize, f64),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Unable to write model to file.
    #[error("Unable to write model to file: {0}")]
    UnableToWrite(String),
    /// Unable to read model from file.
    #[error("Unable to read model from a file {0}")]
    UnableToRead(String),
}

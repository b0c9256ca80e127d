/// Relative tolerance under which two adjacent feature values are treated as tied.
pub const TIE_EPSILON: f64 = 1e-6;
/// Number of nonzero dimensions in a random sparse projection.
pub const PROJECTION_SPARSITY: usize = 3;
/// Maximum re-draws when sampling a candidate threshold too close to the previous one.
pub const THRESHOLD_RETRIES: usize = 10;

//! Class histogram sufficient statistic.
//!
//! The split search moves examples between a left and a right histogram
//! one at a time, so `add_one`, `sub_one` and the entropy query all have
//! to be O(1). The histogram keeps a running `Σ count·log2(count)` and a
//! nonzero-bucket counter for this.
use serde::{Deserialize, Serialize};

#[inline]
fn xlog2(n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        let v = n as f64;
        v * v.log2()
    }
}

/// Mutable class-count statistic with an O(1) total-entropy query.
///
/// The entropy reported is the *total* entropy
/// `mass·log2(mass) − Σ count·log2(count)`, i.e. scaled by the mass, so
/// that summing a left and a right histogram's entropies is directly
/// comparable as a split objective.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassHistogram {
    counts: Vec<usize>,
    mass: usize,
    nonzero: usize,
    count_log_sum: f64,
}

impl ClassHistogram {
    /// Create a zeroed histogram over `classes` buckets.
    pub fn new(classes: usize) -> Self {
        ClassHistogram {
            counts: vec![0; classes],
            mass: 0,
            nonzero: 0,
            count_log_sum: 0.0,
        }
    }

    /// Number of class buckets.
    pub fn size(&self) -> usize {
        self.counts.len()
    }

    /// Zero-fill to `classes` buckets, discarding all content.
    pub fn resize(&mut self, classes: usize) {
        self.counts.clear();
        self.counts.resize(classes, 0);
        self.mass = 0;
        self.nonzero = 0;
        self.count_log_sum = 0.0;
    }

    /// Zero all counts.
    pub fn reset(&mut self) {
        for count in self.counts.iter_mut() {
            *count = 0;
        }
        self.mass = 0;
        self.nonzero = 0;
        self.count_log_sum = 0.0;
    }

    /// Record one example of class `label`.
    #[inline]
    pub fn add_one(&mut self, label: usize) {
        let count = self.counts[label];
        if count == 0 {
            self.nonzero += 1;
        }
        self.count_log_sum += xlog2(count + 1) - xlog2(count);
        self.counts[label] = count + 1;
        self.mass += 1;
    }

    /// Remove one example of class `label`.
    ///
    /// The caller must only remove a label it previously added and has
    /// not yet removed; there is no underflow protection beyond this
    /// contract.
    #[inline]
    pub fn sub_one(&mut self, label: usize) {
        let count = self.counts[label];
        debug_assert!(count > 0, "sub_one on an empty bucket");
        if count == 1 {
            self.nonzero -= 1;
        }
        self.count_log_sum += xlog2(count - 1) - xlog2(count);
        self.counts[label] = count - 1;
        self.mass -= 1;
    }

    /// The count of a single class.
    pub fn at(&self, label: usize) -> usize {
        self.counts[label]
    }

    /// All class counts.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Total number of recorded examples.
    pub fn mass(&self) -> usize {
        self.mass
    }

    /// True if all mass is concentrated in at most one class.
    pub fn is_pure(&self) -> bool {
        self.nonzero <= 1
    }

    /// Total entropy of the recorded counts, O(1).
    pub fn entropy(&self) -> f64 {
        if self.mass == 0 {
            0.0
        } else {
            xlog2(self.mass) - self.count_log_sum
        }
    }
}

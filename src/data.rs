//! Dataset contract and owned dense storage.
//!
//! The learners only ever read through the [`DataSet`] trait, so any
//! columnar or memory-mapped backend can be plugged in. [`DataStorage`]
//! is the owned row-major implementation used for bootstrap resamples.
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Read-only accessor over labeled examples.
///
/// Implementations must support thread-safe concurrent reads; all
/// accessors take `&self` and the learners never write through this
/// trait.
pub trait DataSet {
    /// Number of examples.
    fn len(&self) -> usize;
    /// True if there are no examples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Number of features per example.
    fn dimensionality(&self) -> usize;
    /// Number of distinct class labels.
    fn class_count(&self) -> usize;
    /// The feature vector of an example.
    fn data_point(&self, index: usize) -> &[f64];
    /// The class label of an example.
    fn class_label(&self, index: usize) -> usize;

    /// Sample `count` examples with replacement into an owned resample.
    ///
    /// The second element of the returned tuple marks which original
    /// indices were drawn at least once; it feeds the full-data leaf
    /// histogram refresh after a bootstrapped build.
    fn bootstrap(&self, count: usize, rng: &mut StdRng) -> (DataStorage, Vec<bool>) {
        let mut resampled = DataStorage::new(self.dimensionality(), self.class_count());
        let mut drawn = vec![false; self.len()];
        for _ in 0..count {
            let i = rng.gen_range(0..self.len());
            drawn[i] = true;
            resampled.push(self.data_point(i), self.class_label(i));
        }
        (resampled, drawn)
    }
}

/// Owned, contiguous row-major storage of labeled examples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStorage {
    data: Vec<f64>,
    labels: Vec<usize>,
    rows: usize,
    cols: usize,
    classes: usize,
}

impl DataStorage {
    /// Create an empty storage for `cols`-dimensional examples over
    /// `classes` classes.
    pub fn new(cols: usize, classes: usize) -> Self {
        DataStorage {
            data: Vec::new(),
            labels: Vec::new(),
            rows: 0,
            cols,
            classes,
        }
    }

    /// Build a storage from one vector per example. The class count is
    /// inferred as the largest label plus one.
    pub fn from_vecs(points: &[Vec<f64>], labels: &[usize]) -> Self {
        assert_eq!(points.len(), labels.len());
        let cols = points.first().map(|p| p.len()).unwrap_or(0);
        let classes = labels.iter().max().map(|c| c + 1).unwrap_or(0);
        let mut storage = DataStorage::new(cols, classes);
        for (point, label) in points.iter().zip(labels.iter()) {
            storage.push(point, *label);
        }
        storage
    }

    /// Append a single labeled example.
    pub fn push(&mut self, point: &[f64], label: usize) {
        assert_eq!(point.len(), self.cols);
        assert!(label < self.classes);
        self.data.extend_from_slice(point);
        self.labels.push(label);
        self.rows += 1;
    }
}

impl DataSet for DataStorage {
    fn len(&self) -> usize {
        self.rows
    }

    fn dimensionality(&self) -> usize {
        self.cols
    }

    fn class_count(&self) -> usize {
        self.classes
    }

    fn data_point(&self, index: usize) -> &[f64] {
        &self.data[index * self.cols..(index + 1) * self.cols]
    }

    fn class_label(&self, index: usize) -> usize {
        self.labels[index]
    }
}

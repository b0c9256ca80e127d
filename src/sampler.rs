//! Sampling helpers.
//!
//! All randomness in a build flows through a caller-owned `StdRng`, so
//! concurrent ensemble builds never contend on shared generator state
//! and a seed reproduces a tree exactly.
use crate::data::DataSet;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Poisson};

/// Sample `count` feature indices without replacement: shuffle a
/// permutation of `0..dimensionality` and take its prefix.
pub fn sample_features(dimensionality: usize, count: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut features: Vec<usize> = (0..dimensionality).collect();
    features.shuffle(rng);
    features.truncate(count);
    features
}

/// Sample two distinct indices from `0..len`. Requires `len >= 2`.
pub fn sample_two(len: usize, rng: &mut StdRng) -> (usize, usize) {
    debug_assert!(len >= 2);
    let first = rng.gen_range(0..len);
    let mut second = rng.gen_range(0..len);
    while second == first {
        second = rng.gen_range(0..len);
    }
    (first, second)
}

/// Pick a uniformly random entry of a non-empty slice.
pub fn random_entry<'a, T>(items: &'a [T], rng: &mut StdRng) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

/// Draw a Poisson-distributed replication count. Zero is a valid draw
/// and means the example is skipped for statistics this visit.
pub fn poisson_draw(lambda: f64, rng: &mut StdRng) -> usize {
    let poisson = Poisson::new(lambda).expect("bootstrap_lambda is validated to be positive");
    poisson.sample(rng) as usize
}

/// Source of candidate split thresholds for the online learner,
/// specified per feature.
pub trait ThresholdSampler {
    /// Number of features the sampler covers. Must match the training
    /// data's dimensionality.
    fn dimensionality(&self) -> usize;
    /// Draw a candidate threshold for a feature.
    fn sample(&self, feature: usize, rng: &mut StdRng) -> f64;
    /// Lower bound of the feature's threshold range.
    fn min(&self, feature: usize) -> f64;
    /// Upper bound of the feature's threshold range.
    fn max(&self, feature: usize) -> f64;
}

/// Uniform threshold sampler over fixed per-feature ranges.
pub struct UniformThresholdSampler {
    mins: Vec<f64>,
    maxs: Vec<f64>,
}

impl UniformThresholdSampler {
    pub fn new(mins: Vec<f64>, maxs: Vec<f64>) -> Self {
        assert_eq!(mins.len(), maxs.len());
        UniformThresholdSampler { mins, maxs }
    }

    /// Derive the per-feature ranges from the observed value ranges of a
    /// dataset.
    pub fn from_data<D: DataSet>(data: &D) -> Self {
        let d = data.dimensionality();
        let mut mins = vec![f64::INFINITY; d];
        let mut maxs = vec![f64::NEG_INFINITY; d];
        for n in 0..data.len() {
            for (f, &v) in data.data_point(n).iter().enumerate() {
                mins[f] = mins[f].min(v);
                maxs[f] = maxs[f].max(v);
            }
        }
        UniformThresholdSampler { mins, maxs }
    }
}

impl ThresholdSampler for UniformThresholdSampler {
    fn dimensionality(&self) -> usize {
        self.mins.len()
    }

    fn sample(&self, feature: usize, rng: &mut StdRng) -> f64 {
        let (min, max) = (self.mins[feature], self.maxs[feature]);
        if min < max {
            rng.gen_range(min..max)
        } else {
            // Trivial feature, every candidate collapses to its bound.
            min
        }
    }

    fn min(&self, feature: usize) -> f64 {
        self.mins[feature]
    }

    fn max(&self, feature: usize) -> f64 {
        self.maxs[feature]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataStorage;
    use rand::SeedableRng;

    #[test]
    fn test_sample_features_is_prefix_of_permutation() {
        let mut rng = StdRng::seed_from_u64(3);
        let features = sample_features(20, 5, &mut rng);
        assert_eq!(features.len(), 5);
        let mut sorted = features.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 5);
        assert!(sorted.iter().all(|&f| f < 20));
    }

    #[test]
    fn test_sample_two_distinct() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let (a, b) = sample_two(2, &mut rng);
            assert_ne!(a, b);
            assert!(a < 2 && b < 2);
        }
    }

    #[test]
    fn test_uniform_threshold_sampler_bounds() {
        let storage = DataStorage::from_vecs(&[vec![0.0, 5.0], vec![2.0, 5.0], vec![-1.0, 5.0]], &[0, 1, 0]);
        let sampler = UniformThresholdSampler::from_data(&storage);
        assert_eq!(sampler.min(0), -1.0);
        assert_eq!(sampler.max(0), 2.0);

        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..100 {
            let t = sampler.sample(0, &mut rng);
            assert!((-1.0..2.0).contains(&t));
        }
        // Trivial feature: the sampler collapses to the bound.
        assert_eq!(sampler.sample(1, &mut rng), 5.0);
    }

    #[test]
    fn test_poisson_draw_mean() {
        let mut rng = StdRng::seed_from_u64(5);
        let draws: Vec<usize> = (0..2000).map(|_| poisson_draw(1.0, &mut rng)).collect();
        let mean = draws.iter().sum::<usize>() as f64 / draws.len() as f64;
        assert!((mean - 1.0).abs() < 0.1);
        // Zero draws do occur at lambda 1.
        assert!(draws.iter().any(|&k| k == 0));
    }
}

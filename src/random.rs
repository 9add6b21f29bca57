//! Random selection engine.
//!
//! All randomness in a render goes through a [`RandomSource`], so callers can
//! pass a seeded generator (or a scripted one in tests) and get reproducible
//! masks and permutations. Shuffles are Fisher–Yates.

use rand::Rng;
use rand::rngs::{StdRng, ThreadRng};
use rand::SeedableRng;

/// Source of uniform random integers.
pub trait RandomSource {
    /// Uniform integer in `0..bound`. `bound` is never zero.
    fn below(&mut self, bound: usize) -> usize;
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn below(&mut self, bound: usize) -> usize {
        (**self).below(bound)
    }
}

/// Adapter from any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R>(pub R);

impl<R: Rng> RandomSource for RngSource<R> {
    fn below(&mut self, bound: usize) -> usize {
        self.0.gen_range(0..bound)
    }
}

impl RngSource<ThreadRng> {
    /// Fresh, unseeded source for production renders.
    pub fn thread() -> Self {
        RngSource(rand::thread_rng())
    }
}

impl RngSource<StdRng> {
    /// Reproducible source for a given seed.
    pub fn seeded(seed: u64) -> Self {
        RngSource(StdRng::seed_from_u64(seed))
    }
}

/// Replays a fixed list of values, each reduced modulo the requested bound.
/// Yields zero once the list is exhausted.
#[derive(Debug, Clone, Default)]
pub struct SequenceRandom {
    values: Vec<usize>,
    next: usize,
}

impl SequenceRandom {
    pub fn new(values: impl Into<Vec<usize>>) -> Self {
        Self {
            values: values.into(),
            next: 0,
        }
    }

    /// Number of values handed out so far.
    pub fn draws(&self) -> usize {
        self.next
    }
}

impl RandomSource for SequenceRandom {
    fn below(&mut self, bound: usize) -> usize {
        let value = self.values.get(self.next).copied().unwrap_or(0);
        self.next += 1;
        value % bound
    }
}

/// Uniform integer in `lo..=hi`. Returns `lo` without drawing when the range
/// holds a single value (or is inverted).
pub fn random_int(rng: &mut dyn RandomSource, lo: usize, hi: usize) -> usize {
    if hi <= lo {
        return lo;
    }
    lo + rng.below(hi - lo + 1)
}

/// In-place Fisher–Yates shuffle.
pub fn shuffle<T>(rng: &mut dyn RandomSource, items: &mut [T]) {
    for i in (1..items.len()).rev() {
        let j = rng.below(i + 1);
        items.swap(i, j);
    }
}

/// A uniformly random permutation of `0..n`.
pub fn permutation(rng: &mut dyn RandomSource, n: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..n).collect();
    shuffle(rng, &mut order);
    order
}

/// Number of blocks to keep out of `n` for an inclusion-fraction range.
pub fn selection_bounds(n: usize, frac_min: f64, frac_max: f64) -> (usize, usize) {
    let min = (n as f64 * frac_min).floor() as usize;
    let max = ((n as f64 * frac_max).ceil() as usize).min(n);
    (min.min(n), max.max(min.min(n)))
}

/// Boolean mask of length `n` with a uniformly drawn number of `true`
/// entries in the selection bounds, uniformly permuted.
pub fn selection_mask(rng: &mut dyn RandomSource, n: usize, frac_min: f64, frac_max: f64) -> Vec<bool> {
    if n == 0 {
        return Vec::new();
    }
    let (min, max) = selection_bounds(n, frac_min, frac_max);
    let k = random_int(rng, min, max);
    let mut mask: Vec<bool> = (0..n).map(|i| i < k).collect();
    shuffle(rng, &mut mask);
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn random_int_is_inclusive() {
        let mut rng = SequenceRandom::new(vec![0, 3, 7]);
        assert_eq!(random_int(&mut rng, 2, 5), 2);
        assert_eq!(random_int(&mut rng, 2, 5), 5);
        assert_eq!(random_int(&mut rng, 2, 5), 5);
    }

    #[test]
    fn degenerate_range_does_not_draw() {
        let mut rng = SequenceRandom::new(vec![9]);
        assert_eq!(random_int(&mut rng, 4, 4), 4);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn fisher_yates_with_zero_draws_rotates() {
        // j = 0 at every step moves the first element to the back each time
        let mut rng = SequenceRandom::new(Vec::<usize>::new());
        let mut items = vec!['a', 'b', 'c', 'd'];
        shuffle(&mut rng, &mut items);
        assert_eq!(items, vec!['b', 'c', 'd', 'a']);
        assert_eq!(rng.draws(), 3);
    }

    #[test]
    fn identity_when_each_draw_is_i() {
        let mut rng = SequenceRandom::new(vec![3, 2, 1]);
        assert_eq!(permutation(&mut rng, 4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn seeded_permutations_reproduce() {
        let a = permutation(&mut RngSource::seeded(7), 10);
        let b = permutation(&mut RngSource::seeded(7), 10);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn bounds_follow_floor_and_ceil() {
        assert_eq!(selection_bounds(10, 0.5, 0.5), (5, 5));
        assert_eq!(selection_bounds(3, 0.5, 0.5), (1, 2));
        assert_eq!(selection_bounds(0, 0.2, 0.9), (0, 0));
        assert_eq!(selection_bounds(4, 1.0, 1.0), (4, 4));
    }

    #[test]
    fn mask_cardinality_is_exact_for_fixed_fraction() {
        let mut rng = RngSource::seeded(99);
        for _ in 0..200 {
            let mask = selection_mask(&mut rng, 10, 0.5, 0.5);
            assert_eq!(mask.len(), 10);
            assert_eq!(mask.iter().filter(|b| **b).count(), 5);
        }
    }

    #[test]
    fn empty_mask_draws_nothing() {
        let mut rng = SequenceRandom::new(vec![1, 2, 3]);
        assert!(selection_mask(&mut rng, 0, 0.0, 1.0).is_empty());
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn thread_source_stays_in_bounds() {
        let mut rng = RngSource::thread();
        for _ in 0..100 {
            assert!(rng.below(3) < 3);
        }
    }
}

//! Seeded random number generation for reproducibility.
//!
//! Every source of randomness in a run (weight init, dropout masks, epoch
//! permutations) is derived from the configured seed through this wrapper, so
//! two runs with the same configuration draw identical streams.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

/// ChaCha8-backed RNG with the small sampling surface the layers need.
#[derive(Clone, Debug)]
pub struct SeededRng {
    inner: ChaCha8Rng,
}

impl SeededRng {
    /// Create a new RNG from an explicit seed.
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Create an RNG on a numbered stream of `seed`.
    ///
    /// Streams of the same seed are independent, which lets callers derive a
    /// fresh generator for e.g. each (trial, epoch) pair without carrying state.
    pub fn with_stream(seed: u64, stream: u64) -> Self {
        let mut inner = ChaCha8Rng::seed_from_u64(seed);
        inner.set_stream(stream);
        Self { inner }
    }

    /// Derive an independent generator for a sub-component.
    ///
    /// The child is seeded from the parent's stream, so forking is itself
    /// deterministic and advances the parent.
    pub fn fork(&mut self) -> Self {
        Self::new(self.inner.next_u64())
    }

    /// Uniform u32.
    pub fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    /// Uniform sample in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        self.inner.gen::<f32>()
    }

    /// Uniform sample in [low, high).
    pub fn gen_range_f32(&mut self, low: f32, high: f32) -> f32 {
        if high <= low {
            return low;
        }
        self.inner.gen_range(low..high)
    }

    /// Integer sample in [0, upper).
    pub fn gen_usize(&mut self, upper: usize) -> usize {
        if upper == 0 {
            0
        } else {
            self.inner.gen_range(0..upper)
        }
    }

    /// Fisher-Yates shuffle for usize slices.
    pub fn shuffle_usize(&mut self, data: &mut [usize]) {
        data.shuffle(&mut self.inner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_deterministic() {
        let mut rng1 = SeededRng::new(42);
        let mut rng2 = SeededRng::new(42);

        for _ in 0..100 {
            assert_eq!(rng1.next_u32(), rng2.next_u32());
        }
    }

    #[test]
    fn test_rng_next_f32_range() {
        let mut rng = SeededRng::new(12345);

        for _ in 0..1000 {
            let val = rng.next_f32();
            assert!((0.0..1.0).contains(&val));
        }
    }

    #[test]
    fn test_rng_gen_range_f32() {
        let mut rng = SeededRng::new(67890);

        for _ in 0..1000 {
            let val = rng.gen_range_f32(-1.0, 1.0);
            assert!((-1.0..1.0).contains(&val));
        }
    }

    #[test]
    fn test_rng_gen_range_degenerate() {
        let mut rng = SeededRng::new(1);
        assert_eq!(rng.gen_range_f32(0.5, 0.5), 0.5);
    }

    #[test]
    fn test_rng_gen_usize_zero() {
        let mut rng = SeededRng::new(22222);
        assert_eq!(rng.gen_usize(0), 0);
    }

    #[test]
    fn test_fork_is_deterministic() {
        let mut a = SeededRng::new(7);
        let mut b = SeededRng::new(7);
        let mut fa = a.fork();
        let mut fb = b.fork();
        assert_eq!(fa.next_u32(), fb.next_u32());
        // parent advanced identically
        assert_eq!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn test_streams_differ() {
        let mut a = SeededRng::with_stream(5, 0);
        let mut b = SeededRng::with_stream(5, 1);
        let xs: Vec<u32> = (0..4).map(|_| a.next_u32()).collect();
        let ys: Vec<u32> = (0..4).map(|_| b.next_u32()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_shuffle_usize_is_permutation() {
        let mut rng = SeededRng::new(33333);
        let mut data: Vec<usize> = (0..10).collect();
        let original = data.clone();

        rng.shuffle_usize(&mut data);

        let mut sorted = data.clone();
        sorted.sort();
        assert_eq!(sorted, original);
    }
}

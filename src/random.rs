//! Random number generation, on top of the "rand" crate

use crate::numeric::Float;
use rand::{Rng, SeedableRng};

// Select random number generation engine in use
#[cfg(feature = "f32")]
type Engine = rand_xoshiro::Xoshiro128Plus;
#[cfg(not(feature = "f32"))]
type Engine = rand_xoshiro::Xoshiro256Plus;

/// Random number generator of the toy event source
#[derive(Clone)]
pub struct RandomGenerator {
    rng: Engine,
}
//
impl RandomGenerator {
    /// Spawn a new random number generator
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Engine::seed_from_u64(seed),
        }
    }

    /// Generate a random floating-point number in [0, 1)
    pub fn random(&mut self) -> Float {
        self.rng.gen()
    }

    /// Generate a random floating-point number in (0, 1], suitable for
    /// taking logarithms
    pub fn random_positive(&mut self) -> Float {
        1. - self.random()
    }

    /// Generate an array of random numbers in [0, 1)
    pub fn random_array<const N: usize>(&mut self) -> [Float; N] {
        self.rng.gen()
    }
}

//! Randomized window-placement offsets.
//!
//! Jitter is the only source of non-determinism in the slicing core, so it
//! is injected rather than drawn from ambient process-wide state. Tests and
//! reproducible runs use [`NoJitter`] or a seeded [`RandomJitter`].

use rand::{rngs::StdRng, RngExt, SeedableRng};

/// A source of window-placement offsets.
pub trait Jitter {
    /// Draw an integer offset in `[-slack, slack]`.
    fn draw(&mut self, slack: i64) -> i64;
}

/// Uniform random offsets from a dedicated RNG.
pub struct RandomJitter {
    rng: StdRng,
}

impl RandomJitter {
    /// Creates a jitter source with a fixed seed; a given seed reproduces
    /// the same window placements for the same inputs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Creates a jitter source seeded from thread-local entropy.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }
}

impl Jitter for RandomJitter {
    fn draw(&mut self, slack: i64) -> i64 {
        if slack <= 0 {
            return 0;
        }
        self.rng.random_range(-slack..=slack)
    }
}

/// Always-zero offsets; every window sits flush on its seed box.
pub struct NoJitter;

impl Jitter for NoJitter {
    fn draw(&mut self, _slack: i64) -> i64 {
        0
    }
}

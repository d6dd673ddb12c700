//! Seeded random source for the simulation.
//!
//! Every stochastic decision in the engine (event probability draws, AI
//! choices, battle variance, capture rolls) goes through one [`SeededRng`]
//! instance. Identical seed plus identical call sequence produces an
//! identical value stream, which is what makes whole campaigns replayable.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic uniform-random source.
#[derive(Debug)]
pub struct SeededRng {
    seed: u64,
    rng: StdRng,
}

impl SeededRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The seed this source was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Bernoulli draw with probability `p` (clamped to [0, 1]).
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p.clamp(0.0, 1.0)
    }

    /// Uniform integer in `lo..=hi`. Degenerate ranges return `lo`.
    ///
    /// The draw is mapped from a single [0, 1) value so the consumed
    /// stream length does not depend on the range width.
    pub fn int_in(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo + 1) as f64;
        lo + (self.next_f64() * span) as i64
    }
}

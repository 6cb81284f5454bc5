//! The single deterministic random stream of a run.

use log::warn;
use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::schema::RngState;

use super::hash::djb_str;

/// Algorithm tag written into checkpoints.
pub const RNG_ALGORITHM: &str = "pcg64";

/// Random number generator shared by every stochastic stage of a population.
///
/// Consumption order is part of the reproducibility contract: the population
/// draws from it only in the fixed order of its generation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRng {
    rng: Pcg64,
}

impl EngineRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: Pcg64::from_entropy(),
        }
    }

    /// Uniform value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.rng.r#gen::<f64>()
    }

    /// Uniform index in [low, high). `low < high` is required.
    pub fn index(&mut self, low: usize, high: usize) -> usize {
        self.rng.gen_range(low..high)
    }

    /// Uniform value in [0, upper).
    pub fn below(&mut self, upper: f64) -> f64 {
        self.next_f64() * upper
    }

    /// Bernoulli trial with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Save the stream position.
    pub fn state(&self) -> RngState {
        RngState {
            algorithm: RNG_ALGORITHM.to_string(),
            // Serializing a plain PCG state cannot fail.
            state: serde_json::to_string(&self.rng).unwrap_or_default(),
        }
    }

    /// Restore a saved stream.
    ///
    /// A state written by another algorithm, or one that cannot be read, seeds
    /// a fresh stream from the djb hash of the saved state string instead.
    pub fn restore(saved: &RngState) -> Self {
        if saved.algorithm == RNG_ALGORITHM {
            match serde_json::from_str::<Pcg64>(&saved.state) {
                Ok(rng) => return Self { rng },
                Err(e) => warn!("Unreadable {} state ({e}), reseeding from its hash", saved.algorithm),
            }
        } else {
            warn!(
                "Saved random generator is {:?}, current is {RNG_ALGORITHM:?}: reseeding from its hash",
                saved.algorithm
            );
        }
        Self::new(djb_str(&saved.state))
    }
}

impl RngCore for EngineRng {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

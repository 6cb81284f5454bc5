//! Offspring generation hook for external variation operators.

use crate::schema::CandidateKind;

use super::rng::EngineRng;

/// State handed to a breeder for one call.
pub struct BreedContext<'a> {
    /// The population's random stream.
    pub rng: &'a mut EngineRng,
    /// Current self-adapted mutation strength (0.0-1.0).
    pub sigma: f64,
    pub generation: u32,
}

/// External variation operators (mutation, crossover, ...).
pub trait Breeder<G> {
    /// Number of parents selected for each call.
    fn parents_required(&self) -> usize {
        1
    }

    /// Signed selection pressure used to choose parents. Negative selects the worst.
    fn pressure(&self) -> f64 {
        1.0
    }

    /// Produce children from `parents`. An empty result counts as a failed call.
    fn breed(
        &mut self,
        parents: &[&CandidateKind<G>],
        context: &mut BreedContext<'_>,
    ) -> Vec<CandidateKind<G>>;
}

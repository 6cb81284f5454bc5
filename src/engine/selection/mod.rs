//! Pressure-driven selection strategies.
//!
//! Every strategy shares the same contract, implemented once in
//! [`Selector::select`]:
//!
//! - `count == 0` returns nothing.
//! - Only live candidates are eligible; if there are no more of them than
//!   requested, all of them are returned.
//! - A negative pressure selects the worst instead of the best.
//! - A pressure of 0 samples uniformly without replacement, an infinite one
//!   takes the best `count`; any other value runs the strategy's own method.

mod ranking;
mod tournament;

use log::warn;

use crate::schema::{OperatorPerformance, SelectionConfig};

use super::candidate::{Candidate, Genome};
use super::hooks::PopulationHooks;
use super::rng::EngineRng;

pub use ranking::RankingSelector;
pub use tournament::TournamentSelector;

/// What a selector may look at besides the pool.
pub struct SelectionContext<'a, G: Genome> {
    pub hooks: &'a dyn PopulationHooks<G>,
    /// Number of candidates in the population, used by relative tournament sizes.
    pub population_size: usize,
}

/// A selection strategy with self-adapting pressure parameters.
pub trait Selector<G: Genome> {
    fn name(&self) -> &'static str;

    /// Best `count` candidates of `pool`, which is sorted by id and larger than `count`.
    fn infinite_pressure<'c>(
        &self,
        pool: Vec<&'c Candidate<G>>,
        count: usize,
        reverse: bool,
        context: &SelectionContext<'_, G>,
        rng: &mut EngineRng,
    ) -> Vec<&'c Candidate<G>>;

    /// Strategy-specific selection of `count` candidates with finite,
    /// positive `pressure`. `pool` is sorted by id and larger than `count`.
    fn custom<'c>(
        &self,
        pool: Vec<&'c Candidate<G>>,
        count: usize,
        pressure: f64,
        reverse: bool,
        context: &SelectionContext<'_, G>,
        rng: &mut EngineRng,
    ) -> Vec<&'c Candidate<G>>;

    /// Move internal parameters toward a target derived from the last
    /// generation's operator outcomes.
    fn update_endogenous_parameters(&mut self, performance: &OperatorPerformance, inertia: f64);

    /// Current parameters, for checkpoints.
    fn config(&self) -> SelectionConfig;

    /// Select up to `count` live candidates from `pool` with `pressure`.
    fn select<'c>(
        &self,
        pool: &[&'c Candidate<G>],
        count: usize,
        pressure: f64,
        context: &SelectionContext<'_, G>,
        rng: &mut EngineRng,
    ) -> Vec<&'c Candidate<G>> {
        if count == 0 {
            return Vec::new();
        }

        let mut selectable: Vec<&'c Candidate<G>> =
            pool.iter().copied().filter(|c| c.is_alive()).collect();
        selectable.sort_by_key(|c| c.id());

        if selectable.len() <= count {
            warn!(
                "{} selection of {} candidates from a pool of {}: returning the whole pool",
                self.name(),
                count,
                selectable.len()
            );
            return selectable;
        }

        let reverse = pressure < 0.0;
        let pressure = pressure.abs();
        if pressure == 0.0 {
            uniform_without_replacement(selectable, count, rng)
        } else if pressure.is_infinite() {
            self.infinite_pressure(selectable, count, reverse, context, rng)
        } else {
            self.custom(selectable, count, pressure, reverse, context, rng)
        }
    }
}

/// Partial Fisher-Yates shuffle over a copy of the pool.
pub fn uniform_without_replacement<'c, G>(
    mut pool: Vec<&'c Candidate<G>>,
    count: usize,
    rng: &mut EngineRng,
) -> Vec<&'c Candidate<G>> {
    let count = count.min(pool.len());
    for i in 0..count {
        let j = rng.index(i, pool.len());
        pool.swap(i, j);
    }
    pool.truncate(count);
    pool
}

/// Build the selector described by `config`.
pub fn build_selector<G: Genome>(config: &SelectionConfig) -> Box<dyn Selector<G>> {
    match config {
        SelectionConfig::Ranking(ranking) => Box::new(RankingSelector::new(ranking.clone())),
        SelectionConfig::Tournament(tournament) => {
            Box::new(TournamentSelector::new(tournament.clone(), false))
        }
        SelectionConfig::TwoStepTournament(tournament) => {
            Box::new(TournamentSelector::new(tournament.clone(), true))
        }
    }
}


#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use super::test_support::ladder;
    use super::*;
    use crate::engine::hooks::ScalarHooks;
    use crate::schema::{CandidateId, RankingConfig, TournamentConfig};
    use crate::engine::bitstring::BitString;

    fn selectors() -> Vec<Box<dyn Selector<BitString>>> {
        vec![
            build_selector(&SelectionConfig::Ranking(RankingConfig::default())),
            build_selector(&SelectionConfig::Tournament(TournamentConfig::default())),
            build_selector(&SelectionConfig::TwoStepTournament(TournamentConfig::default())),
        ]
    }

    #[test]
    fn test_zero_count_is_empty() {
        let candidates = ladder(5);
        let pool: Vec<_> = candidates.iter().collect();
        let hooks = ScalarHooks;
        let context = SelectionContext {
            hooks: &hooks,
            population_size: pool.len(),
        };
        let mut rng = EngineRng::new(1);
        for selector in selectors() {
            assert!(selector.select(&pool, 0, 1.0, &context, &mut rng).is_empty());
        }
    }

    #[test]
    fn test_small_pool_returns_everything() {
        let candidates = ladder(4);
        let pool: Vec<_> = candidates.iter().collect();
        let hooks = ScalarHooks;
        let context = SelectionContext {
            hooks: &hooks,
            population_size: pool.len(),
        };
        let mut rng = EngineRng::new(1);
        let expected: BTreeSet<CandidateId> = candidates.iter().map(|c| c.id()).collect();
        for selector in selectors() {
            for pressure in [0.0, 1.0, -1.0, f64::INFINITY] {
                let picked: BTreeSet<CandidateId> = selector
                    .select(&pool, 6, pressure, &context, &mut rng)
                    .iter()
                    .map(|c| c.id())
                    .collect();
                assert_eq!(picked, expected);
            }
        }
    }

    #[test]
    fn test_infinite_pressure_takes_best_or_worst() {
        let candidates = ladder(6);
        let pool: Vec<_> = candidates.iter().collect();
        let hooks = ScalarHooks;
        let context = SelectionContext {
            hooks: &hooks,
            population_size: pool.len(),
        };
        let mut rng = EngineRng::new(3);
        for selector in selectors() {
            let best = selector.select(&pool, 2, f64::INFINITY, &context, &mut rng);
            let fitness: Vec<f64> = best.iter().map(|c| c.fitness().primary()).collect();
            assert_eq!(fitness, vec![5.0, 4.0], "{}", selector.name());

            let worst = selector.select(&pool, 2, f64::NEG_INFINITY, &context, &mut rng);
            let fitness: Vec<f64> = worst.iter().map(|c| c.fitness().primary()).collect();
            assert_eq!(fitness, vec![0.0, 1.0], "{}", selector.name());
        }
    }

    #[test]
    fn test_selection_skips_dead_and_zombies() {
        use crate::engine::candidate::PopulationView;

        let mut candidates = ladder(5);
        let view = PopulationView {
            generation: 0,
            maximum_age: 0,
            preserved: &[],
        };
        candidates[4].set_death(0, &view).unwrap();
        let pool: Vec<_> = candidates.iter().collect();
        let hooks = ScalarHooks;
        let context = SelectionContext {
            hooks: &hooks,
            population_size: pool.len(),
        };
        let mut rng = EngineRng::new(3);
        for selector in selectors() {
            let picked = selector.select(&pool, 4, 1.0, &context, &mut rng);
            assert_eq!(picked.len(), 4);
            assert!(picked.iter().all(|c| c.is_alive()));
        }
    }

    #[test]
    fn test_selection_without_replacement() {
        let candidates = ladder(10);
        let pool: Vec<_> = candidates.iter().collect();
        let hooks = ScalarHooks;
        let context = SelectionContext {
            hooks: &hooks,
            population_size: pool.len(),
        };
        let mut rng = EngineRng::new(5);
        for selector in selectors() {
            for pressure in [0.0, 1.0, 1.7, -1.0] {
                let picked = selector.select(&pool, 7, pressure, &context, &mut rng);
                let unique: BTreeSet<CandidateId> = picked.iter().map(|c| c.id()).collect();
                assert_eq!(picked.len(), 7);
                assert_eq!(unique.len(), 7);
            }
        }
    }

    #[test]
    fn test_zero_pressure_is_uniform() {
        let candidates = ladder(5);
        let pool: Vec<_> = candidates.iter().collect();
        let hooks = ScalarHooks;
        let context = SelectionContext {
            hooks: &hooks,
            population_size: pool.len(),
        };
        let mut rng = EngineRng::new(11);
        let trials = 20_000;
        for selector in selectors() {
            let mut counts: HashMap<CandidateId, usize> = HashMap::new();
            for _ in 0..trials {
                for c in selector.select(&pool, 2, 0.0, &context, &mut rng) {
                    *counts.entry(c.id()).or_default() += 1;
                }
            }
            // Each candidate is expected in 2/5 of the trials.
            let expected = trials as f64 * 2.0 / 5.0;
            for candidate in &candidates {
                let observed = counts.get(&candidate.id()).copied().unwrap_or(0) as f64;
                assert!(
                    (observed - expected).abs() < expected * 0.05,
                    "{}: {} vs {}",
                    selector.name(),
                    observed,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_same_seed_same_selection() {
        let candidates = ladder(12);
        let pool: Vec<_> = candidates.iter().collect();
        let hooks = ScalarHooks;
        let context = SelectionContext {
            hooks: &hooks,
            population_size: pool.len(),
        };
        for selector in selectors() {
            let run = |seed| {
                let mut rng = EngineRng::new(seed);
                selector
                    .select(&pool, 5, 1.3, &context, &mut rng)
                    .iter()
                    .map(|c| c.id())
                    .collect::<Vec<_>>()
            };
            assert_eq!(run(9), run(9));
        }
    }
}

//! Offspring generation and the statistics that drive self-adaptation.

use log::{debug, trace, warn};

use crate::schema::{CandidateId, CandidateKind, OperatorPerformance};

use crate::engine::breeder::BreedContext;
use crate::engine::candidate::{Candidate, Genome};
use crate::engine::error::Result;
use crate::engine::selection::SelectionContext;
use crate::engine::statistics::{blend, classify};

use super::Population;

/// Breeder calls allowed per requested success before giving up.
const ATTEMPTS_PER_CHILD: usize = 10;

impl<G: Genome> Population<G> {
    /// Call the breeder until `lambda` calls have produced at least one valid
    /// child. Returns the ids of the newborn candidates.
    pub(super) fn breed(&mut self) -> Result<Vec<CandidateId>> {
        let Some(breeder) = self.breeder.as_mut() else {
            return Ok(Vec::new());
        };

        let lambda = self.config.population.lambda;
        let max_attempts = lambda * ATTEMPTS_PER_CHILD;
        let pool: Vec<&Candidate<G>> = self.candidates.iter().filter(|c| c.is_alive()).collect();
        let context = SelectionContext {
            hooks: self.hooks.as_ref(),
            population_size: pool.len(),
        };

        let mut children: Vec<Candidate<G>> = Vec::new();
        let mut successes = 0;
        let mut attempts = 0;
        while successes < lambda {
            if attempts >= max_attempts {
                warn!(
                    "{}: only {} of {} breeding calls succeeded after {} attempts",
                    self.name, successes, lambda, attempts
                );
                break;
            }
            attempts += 1;

            let parents = self.selector.select(
                &pool,
                breeder.parents_required(),
                breeder.pressure(),
                &context,
                &mut self.rng,
            );
            let Some(first) = parents.first() else {
                warn!("{}: no parents available for breeding", self.name);
                break;
            };
            let tag = first.allopatric_tag();
            let parent_ids: Vec<CandidateId> = parents.iter().map(|p| p.id()).collect();
            let kinds: Vec<&CandidateKind<G>> = parents.iter().map(|p| p.kind()).collect();

            let mut breed_context = BreedContext {
                rng: &mut self.rng,
                sigma: self.sigma,
                generation: self.generation,
            };
            let mut produced = 0;
            for kind in breeder.breed(&kinds, &mut breed_context) {
                if !kind.validate() {
                    warn!("{}: discarding an invalid child of {:?}", self.name, parent_ids);
                    continue;
                }
                children.push(Candidate::with_lineage(
                    kind,
                    &mut self.ids,
                    self.generation,
                    tag,
                    parent_ids.clone(),
                ));
                produced += 1;
            }
            if produced > 0 {
                successes += 1;
            }
        }

        let newborn: Vec<CandidateId> = children.iter().map(Candidate::id).collect();
        debug!(
            "{}: {} children from {} breeding calls",
            self.name,
            newborn.len(),
            attempts
        );
        self.candidates.append(&mut children);
        Ok(newborn)
    }

    /// Grade the newborn candidates against the last committed best and worst
    /// and against their parents still alive.
    pub(super) fn update_operator_statistics(&mut self, newborn: &[CandidateId]) {
        let hooks = self.hooks.as_ref();
        let best = self.best_scaled();
        let worst = self.worst_scaled();

        let mut performance = OperatorPerformance::default();
        for child in newborn.iter().filter_map(|id| self.candidate(*id)) {
            if child.is_dead() {
                continue;
            }
            let parents: Vec<&Candidate<G>> = child
                .parents()
                .iter()
                .filter_map(|id| self.candidate(*id))
                .filter(|parent| parent.is_alive())
                .collect();
            let outcome = classify(hooks, child, best, worst, &parents);
            trace!("{} graded {:?}", child, outcome);
            performance.record(outcome);
        }

        debug!(
            "{}: offspring {} very good, {} good, {} normal, {} bad, {} very bad",
            self.name,
            performance.very_good,
            performance.good,
            performance.normal,
            performance.bad,
            performance.very_bad
        );
        self.performance = performance;
    }

    /// Raise the mutation strength after a breakthrough, lower it when few
    /// children improve on their parents.
    pub(super) fn update_sigma(&mut self) {
        let lambda = self.config.population.lambda as f64;
        let target = if self.performance.very_good >= 1 {
            0.99
        } else if (self.performance.good as f64) <= 0.1 * lambda {
            0.01
        } else {
            self.sigma
        };
        self.sigma = blend(self.sigma, target, self.config.population.inertia);
        trace!("{}: sigma {:.4}", self.name, self.sigma);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::super::test_support::{config, population_of};
    use super::*;
    use crate::engine::bitstring::{BitFlipBreeder, BitString};
    use crate::engine::breeder::Breeder;

    /// Returns a copy of its first parent with every bit set.
    struct Saturate;

    impl Breeder<BitString> for Saturate {
        fn breed(
            &mut self,
            parents: &[&CandidateKind<BitString>],
            _context: &mut BreedContext<'_>,
        ) -> Vec<CandidateKind<BitString>> {
            match parents.first() {
                Some(CandidateKind::Individual(bits)) => {
                    let full = "1".repeat(bits.len());
                    vec![CandidateKind::Individual(BitString::parse(&full))]
                }
                _ => Vec::new(),
            }
        }
    }

    /// Never produces anything and counts its calls.
    struct Barren(Rc<Cell<usize>>);

    impl Breeder<BitString> for Barren {
        fn breed(
            &mut self,
            _parents: &[&CandidateKind<BitString>],
            _context: &mut BreedContext<'_>,
        ) -> Vec<CandidateKind<BitString>> {
            self.0.set(self.0.get() + 1);
            Vec::new()
        }
    }

    #[test]
    fn test_breed_produces_lambda_children() {
        let population = population_of(config(10, 4, 3), &["1000", "0100", "0010", "0001"]);
        let mut population = population.with_breeder(BitFlipBreeder::default());
        let newborn = population.breed().unwrap();
        assert_eq!(newborn.len(), 3);
        assert_eq!(population.total_count(), 7);

        for id in &newborn {
            let child = population.candidate(*id).unwrap();
            assert_eq!(child.parents().len(), 2);
            assert!(!child.has_valid_fitness());
            let first = population.candidate(child.parents()[0]).unwrap();
            assert_eq!(child.allopatric_tag(), first.allopatric_tag());
        }
        let ids: Vec<CandidateId> = population.candidates().iter().map(|c| c.id()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_breed_without_breeder_is_empty() {
        let mut population = population_of(config(10, 2, 3), &["10", "01"]);
        assert!(population.breed().unwrap().is_empty());
        assert_eq!(population.total_count(), 2);
    }

    #[test]
    fn test_barren_breeder_gives_up() {
        let calls = Rc::new(Cell::new(0));
        let population = population_of(config(10, 2, 3), &["10", "01"]);
        let mut population = population.with_breeder(Barren(Rc::clone(&calls)));
        assert!(population.breed().unwrap().is_empty());
        assert_eq!(calls.get(), 3 * ATTEMPTS_PER_CHILD);
    }

    #[test]
    fn test_improving_child_is_very_good() {
        let population = population_of(config(10, 3, 2), &["1000", "1100", "0000"]);
        let mut population = population.with_breeder(Saturate);
        let newborn = population.breed().unwrap();
        population.evaluate().unwrap();
        population.update_operator_statistics(&newborn);
        assert_eq!(population.operator_performance().very_good, 2);
        assert_eq!(population.operator_performance().total(), 2);
    }

    #[test]
    fn test_sigma_follows_performance() {
        let mut config = config(10, 2, 10);
        config.population.inertia = 0.5;
        config.population.sigma = 0.5;
        let mut population = population_of(config, &["10", "01"]);

        population.performance = OperatorPerformance {
            very_good: 1,
            ..Default::default()
        };
        population.update_sigma();
        assert!((population.sigma() - 0.745).abs() < 1e-12);

        population.performance = OperatorPerformance {
            good: 1,
            ..Default::default()
        };
        population.update_sigma();
        assert!((population.sigma() - 0.3775).abs() < 1e-12);

        population.performance = OperatorPerformance {
            good: 5,
            ..Default::default()
        };
        let before = population.sigma();
        population.update_sigma();
        assert!((population.sigma() - before).abs() < 1e-12);
    }
}

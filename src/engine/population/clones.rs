//! Clone detection: genotype-equal candidates are grouped and penalized.

use std::collections::HashMap;

use log::{debug, trace};

use crate::engine::candidate::{Genome, HashPurpose};

use super::Population;

impl<G: Genome> Population<G> {
    /// Group not-dead candidates by genotype and let the hooks scale every
    /// member of each group, master included.
    ///
    /// Candidates are bucketed by genotype hash and compared with the first
    /// member of each group in the bucket only. Groups are handled in
    /// ascending order of their master's id.
    pub(super) fn detect_and_handle_clones(&mut self) {
        let mut buckets: HashMap<u64, Vec<Vec<usize>>> = HashMap::new();
        for (index, candidate) in self.candidates.iter().enumerate() {
            if candidate.is_dead() {
                continue;
            }
            let groups = buckets
                .entry(candidate.hash(HashPurpose::Genotype))
                .or_default();
            let existing = groups
                .iter_mut()
                .find(|group| self.candidates[group[0]].is_genotype_equal(candidate));
            match existing {
                Some(group) => group.push(index),
                None => groups.push(vec![index]),
            }
        }

        let unique_hashes = buckets.len();
        let hooks = self.hooks.as_ref();
        let mut groups: Vec<Vec<usize>> = buckets.into_values().flatten().collect();
        for group in &mut groups {
            group.sort_by(|a, b| hooks.compare_clones(&self.candidates[*a], &self.candidates[*b]));
        }
        groups.sort_by_key(|group| self.candidates[group[0]].id());

        self.log_collision_rate(groups.len(), unique_hashes);

        let scaling_factor = self.config.population.clone_scaling_factor;
        let mut clones = 0;
        for group in &groups {
            let master = self.candidates[group[0]].id();
            if group.len() > 1 {
                clones += group.len() - 1;
                trace!(
                    "Clones of {}: {:?}",
                    master,
                    group
                        .iter()
                        .skip(1)
                        .map(|i| self.candidates[*i].to_string())
                        .collect::<Vec<_>>()
                );
            }
            for (rank, &index) in group.iter().enumerate() {
                hooks.handle_clone(
                    master,
                    &mut self.candidates[index],
                    rank,
                    group.len(),
                    scaling_factor,
                );
            }
        }
        debug!(
            "{}: {} clone groups, {} clones",
            self.name,
            groups.len(),
            clones
        );
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    use super::super::test_support::{config, population_of};
    use super::*;
    use crate::engine::bitstring::BitString;
    use crate::engine::candidate::Candidate;
    use crate::engine::entropy::Message;
    use crate::engine::error::EvaluationError;
    use crate::engine::evaluator::{FitnessFunction, StopFlag};
    use crate::engine::fitness::{Fitness, ScalingCause};
    use crate::engine::hooks::PopulationHooks;
    use crate::schema::{CandidateId, CandidateKind};

    #[test]
    fn test_clones_are_scaled_by_rank() {
        let population = population_of(config(10, 4, 1), &["1100", "1100", "1100", "0111"]);
        let factors: Vec<f64> = population
            .candidates()
            .iter()
            .map(|c| c.fitness().factor(ScalingCause::Clone, 0))
            .collect();
        // Same birth for all three clones: the master is the smallest id.
        let expected = [1.0, 0.9, 0.81, 1.0];
        for (factor, expected) in factors.iter().zip(expected) {
            assert!((factor - expected).abs() < 1e-12);
        }
        assert!(
            population.candidates()[0]
                .fitness()
                .description()
                .contains("master of 3 clones")
        );
    }

    #[test]
    fn test_younger_clone_is_master() {
        let mut population = population_of(config(10, 2, 1), &["1010"]);
        population.generation = 3;
        population
            .insert(CandidateKind::Individual(BitString::parse("1010")))
            .unwrap();
        population.prepare().unwrap();
        let old = &population.candidates()[0];
        let young = &population.candidates()[1];
        assert_eq!(young.fitness().factor(ScalingCause::Clone, 0), 1.0);
        assert_eq!(old.fitness().factor(ScalingCause::Clone, 0), 0.9);
    }

    /// Genome whose genotype hash is constant, so every candidate collides.
    #[derive(Debug, Clone)]
    struct Colliding(BitString);

    impl Genome for Colliding {
        fn validate(&self) -> bool {
            self.0.validate()
        }
        fn is_genotype_equal(&self, other: &Self) -> bool {
            self.0.is_genotype_equal(&other.0)
        }
        fn compute_normalized_phenotype(&self) -> String {
            self.0.compute_normalized_phenotype()
        }
        fn compute_hash(&self, _purpose: HashPurpose) -> u64 {
            7
        }
        fn compute_entropy_message(&self) -> Message {
            self.0.compute_entropy_message()
        }
    }

    struct CollidingOnes;

    impl FitnessFunction<Colliding> for CollidingOnes {
        fn evaluate(
            &self,
            candidate: &CandidateKind<Colliding>,
            _phenotype: &str,
            _stop: &StopFlag,
        ) -> Result<Fitness, EvaluationError> {
            let ones = match candidate {
                CandidateKind::Individual(genome) => genome.0.ones(),
                CandidateKind::Group(_) => 0,
            };
            Ok(Fitness::new(vec![ones as f64]))
        }
    }

    /// Records every `handle_clone` call.
    #[derive(Default)]
    struct Recording {
        calls: RefCell<Vec<(CandidateId, CandidateId, usize, usize)>>,
    }

    impl PopulationHooks<Colliding> for Rc<Recording> {
        fn handle_clone(
            &self,
            master: CandidateId,
            member: &mut Candidate<Colliding>,
            rank: usize,
            group_size: usize,
            _scaling_factor: f64,
        ) {
            self.calls
                .borrow_mut()
                .push((master, member.id(), rank, group_size));
        }
    }

    fn colliding_population(genomes: &[&str]) -> (Population<Colliding>, Rc<Recording>) {
        let recording = Rc::new(Recording::default());
        let mut population =
            Population::new("colliding", config(10, 4, 1), Arc::new(CollidingOnes))
                .unwrap()
                .with_hooks(Rc::clone(&recording));
        for bits in genomes {
            population
                .insert(CandidateKind::Individual(Colliding(BitString::parse(bits))))
                .unwrap();
        }
        population.prepare().unwrap();
        (population, recording)
    }

    #[test]
    fn test_hash_collisions_are_not_grouped() {
        let (population, recording) = colliding_population(&["10", "01", "10", "11"]);
        let ids: Vec<CandidateId> = population.candidates().iter().map(|c| c.id()).collect();
        let calls = recording.calls.borrow().clone();
        assert_eq!(
            calls,
            vec![
                (ids[0], ids[0], 0, 2),
                (ids[0], ids[2], 1, 2),
                (ids[1], ids[1], 0, 1),
                (ids[3], ids[3], 0, 1),
            ]
        );
    }

    #[test]
    fn test_handle_clone_order_is_stable() {
        let genomes = ["11", "00", "11", "00", "01"];
        let (_, first) = colliding_population(&genomes);
        let (_, second) = colliding_population(&genomes);
        assert_eq!(*first.calls.borrow(), *second.calls.borrow());
        let masters: Vec<CandidateId> = first
            .calls
            .borrow()
            .iter()
            .filter(|call| call.2 == 0)
            .map(|call| call.0)
            .collect();
        let mut sorted = masters.clone();
        sorted.sort();
        assert_eq!(masters, sorted);
        assert_eq!(first.calls.borrow().len(), genomes.len());
    }

    #[test]
    fn test_plain_one_max_population_has_no_clone_penalty() {
        let population = population_of(config(10, 3, 1), &["1", "0", "11"]);
        assert!(
            population
                .candidates()
                .iter()
                .all(|c| c.fitness().factor(ScalingCause::Clone, 0) == 1.0)
        );
    }
}

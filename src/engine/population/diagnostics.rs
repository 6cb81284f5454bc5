//! Consistency checks over the whole population.

use log::{debug, warn};

use crate::engine::candidate::{Genome, HashPurpose};

use super::Population;

impl<G: Genome> Population<G> {
    /// Share of distinct genotypes that landed in an already used hash bucket.
    pub(super) fn log_collision_rate(&self, unique_individuals: usize, unique_hashes: usize) {
        if unique_individuals == 0 {
            return;
        }
        let collisions = unique_individuals.saturating_sub(unique_hashes);
        debug!(
            "{}: {} distinct genotypes in {} hash buckets ({:.2}% collisions)",
            self.name,
            unique_individuals,
            unique_hashes,
            100.0 * collisions as f64 / unique_individuals as f64
        );
    }

    /// Cross-check every pair of not-dead candidates: genotype-equal
    /// candidates must share phenotype and hashes. Returns the number of
    /// inconsistent pairs.
    pub(super) fn check_consistency(&self) -> usize {
        let standing: Vec<_> = self.candidates.iter().filter(|c| !c.is_dead()).collect();
        let mut inconsistent = 0;
        for (i, a) in standing.iter().enumerate() {
            for b in &standing[i + 1..] {
                if !a.is_genotype_equal(b) {
                    continue;
                }
                let same = a.normalized_phenotype() == b.normalized_phenotype()
                    && a.hash(HashPurpose::Genotype) == b.hash(HashPurpose::Genotype)
                    && a.hash(HashPurpose::Entropy) == b.hash(HashPurpose::Entropy);
                if !same {
                    warn!(
                        "{}: {} and {} are genotype-equal but differ in phenotype or hash",
                        self.name, a, b
                    );
                    inconsistent += 1;
                }
            }
        }
        debug!(
            "{}: consistency check over {} candidates found {} problems",
            self.name,
            standing.len(),
            inconsistent
        );
        debug_assert_eq!(inconsistent, 0, "inconsistent genome implementation");
        inconsistent
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{config, population_of};

    #[test]
    fn test_consistent_population() {
        let population = population_of(config(10, 4, 1), &["1010", "1010", "0110", "1111"]);
        assert_eq!(population.check_consistency(), 0);
    }

    #[test]
    fn test_consistency_check_runs_during_step() {
        let mut config = config(10, 3, 1);
        config.diagnostics.full_consistency_check = true;
        let mut population = population_of(config, &["1", "1", "0"]);
        assert!(population.step().unwrap());
    }

    #[test]
    fn test_collision_rate_handles_empty_population() {
        let population = population_of(config(10, 1, 1), &[]);
        population.log_collision_rate(0, 0);
        population.log_collision_rate(4, 3);
    }
}

//! Bundled fixed-length bit-string representation with its OneMax problem
//! and a bit-flip breeder. Used by the binary, the benchmarks and the tests.

use std::fmt;

use rand::Rng;
use rand_distr::Poisson;
use serde::{Deserialize, Serialize};

use crate::schema::CandidateKind;

use super::breeder::{BreedContext, Breeder};
use super::candidate::{Genome, HashPurpose};
use super::entropy::Message;
use super::error::EvaluationError;
use super::evaluator::{FitnessFunction, StopFlag};
use super::fitness::Fitness;
use super::hash::{djb_mix, djb_str};
use super::rng::EngineRng;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitString {
    bits: Vec<bool>,
}

impl BitString {
    /// `'1'` is a set bit, anything else a cleared one.
    pub fn parse(text: &str) -> Self {
        Self {
            bits: text.chars().map(|c| c == '1').collect(),
        }
    }

    pub fn random(length: usize, rng: &mut EngineRng) -> Self {
        Self {
            bits: (0..length).map(|_| rng.chance(0.5)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn ones(&self) -> usize {
        self.bits.iter().filter(|bit| **bit).count()
    }

    pub fn flip(&mut self, index: usize) {
        if let Some(bit) = self.bits.get_mut(index) {
            *bit = !*bit;
        }
    }

    /// Head of `self` up to `cut`, tail of `other` after it.
    pub fn splice(&self, other: &Self, cut: usize) -> Self {
        let cut = cut.min(self.len()).min(other.len());
        let mut bits = self.bits[..cut].to_vec();
        bits.extend_from_slice(&other.bits[cut..]);
        Self { bits }
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in &self.bits {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl Genome for BitString {
    fn validate(&self) -> bool {
        !self.bits.is_empty()
    }

    fn is_genotype_equal(&self, other: &Self) -> bool {
        self.bits == other.bits
    }

    fn compute_normalized_phenotype(&self) -> String {
        self.to_string()
    }

    fn compute_hash(&self, purpose: HashPurpose) -> u64 {
        let text = djb_str(&self.to_string());
        match purpose {
            HashPurpose::Genotype => text,
            HashPurpose::Entropy => djb_mix(text, &[self.ones() as u64]),
        }
    }

    fn compute_entropy_message(&self) -> Message {
        let sequence: Vec<u64> = self.bits.iter().map(|bit| u64::from(*bit)).collect();
        Message::from_sequence(&sequence)
    }
}

/// Number of set bits. Groups score the mean over their members.
#[derive(Debug, Clone, Copy, Default)]
pub struct OneMax;

impl FitnessFunction<BitString> for OneMax {
    fn evaluate(
        &self,
        candidate: &CandidateKind<BitString>,
        _phenotype: &str,
        _stop: &StopFlag,
    ) -> Result<Fitness, EvaluationError> {
        let (ones, length) = match candidate {
            CandidateKind::Individual(bits) => (bits.ones() as f64, bits.len()),
            CandidateKind::Group(members) => {
                let count = members.len().max(1) as f64;
                let ones: f64 = members.iter().map(|m| m.ones() as f64).sum();
                let length = members.first().map_or(0, BitString::len);
                (ones / count, length)
            }
        };
        Ok(Fitness::new(vec![ones]).with_description(format!("{ones}/{length} ones")))
    }
}

/// One-point crossover of two parents followed by random bit flips.
///
/// The number of flips is `1 + Poisson(sigma · length / 8)`.
#[derive(Debug, Clone, Copy)]
pub struct BitFlipBreeder {
    /// Probability of recombining both parents before mutation.
    pub crossover_rate: f64,
}

impl Default for BitFlipBreeder {
    fn default() -> Self {
        Self {
            crossover_rate: 0.5,
        }
    }
}

impl BitFlipBreeder {
    fn mutate(&self, bits: &mut BitString, context: &mut BreedContext<'_>) {
        if bits.is_empty() {
            return;
        }
        let mean = context.sigma * bits.len() as f64 / 8.0;
        let extra = match Poisson::new(mean) {
            Ok(poisson) => context.rng.sample::<f64, _>(poisson) as usize,
            Err(_) => 0,
        };
        for _ in 0..=extra {
            let index = context.rng.index(0, bits.len());
            bits.flip(index);
        }
    }
}

impl Breeder<BitString> for BitFlipBreeder {
    fn parents_required(&self) -> usize {
        2
    }

    fn breed(
        &mut self,
        parents: &[&CandidateKind<BitString>],
        context: &mut BreedContext<'_>,
    ) -> Vec<CandidateKind<BitString>> {
        let Some(first) = parents.first() else {
            return Vec::new();
        };

        let child = match (*first, parents.get(1)) {
            (CandidateKind::Individual(a), Some(CandidateKind::Individual(b)))
                if context.rng.chance(self.crossover_rate) && a.len() > 1 =>
            {
                let cut = context.rng.index(1, a.len());
                let mut child = a.splice(b, cut);
                self.mutate(&mut child, context);
                CandidateKind::Individual(child)
            }
            (CandidateKind::Individual(a), _) => {
                let mut child = a.clone();
                self.mutate(&mut child, context);
                CandidateKind::Individual(child)
            }
            (CandidateKind::Group(members), _) => {
                if members.is_empty() {
                    return Vec::new();
                }
                let mut members = members.clone();
                let index = context.rng.index(0, members.len());
                self.mutate(&mut members[index], context);
                CandidateKind::Group(members)
            }
        };
        vec![child]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let bits = BitString::parse("0110");
        assert_eq!(bits.to_string(), "0110");
        assert_eq!(bits.ones(), 2);
        assert!(bits.validate());
        assert!(!BitString::parse("").validate());
    }

    #[test]
    fn test_hash_follows_genotype() {
        let a = BitString::parse("0110");
        let b = BitString::parse("0110");
        let c = BitString::parse("0111");
        assert_eq!(
            a.compute_hash(HashPurpose::Genotype),
            b.compute_hash(HashPurpose::Genotype)
        );
        assert_ne!(
            a.compute_hash(HashPurpose::Genotype),
            c.compute_hash(HashPurpose::Genotype)
        );
    }

    #[test]
    fn test_splice() {
        let a = BitString::parse("0000");
        let b = BitString::parse("1111");
        assert_eq!(a.splice(&b, 1).to_string(), "0111");
        assert_eq!(a.splice(&b, 10).to_string(), "0000");
    }

    #[test]
    fn test_one_max() {
        let fitness = OneMax
            .evaluate(
                &CandidateKind::Individual(BitString::parse("1101")),
                "1101",
                &StopFlag::new(),
            )
            .unwrap();
        assert_eq!(fitness.values, vec![3.0]);
        assert_eq!(fitness.description, "3/4 ones");
    }

    #[test]
    fn test_breeder_changes_child() {
        let mut rng = EngineRng::new(5);
        let mut breeder = BitFlipBreeder {
            crossover_rate: 0.0,
        };
        let parent = CandidateKind::Individual(BitString::parse("00000000"));
        let mut context = BreedContext {
            rng: &mut rng,
            sigma: 0.0,
            generation: 1,
        };
        let children = breeder.breed(&[&parent, &parent], &mut context);
        assert_eq!(children.len(), 1);
        match &children[0] {
            // Exactly one flip with zero mutation strength.
            CandidateKind::Individual(child) => assert_eq!(child.ones(), 1),
            CandidateKind::Group(_) => panic!("expected an individual"),
        }
    }
}

//! Checkpoints: save a population to JSON and resume it later.

use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use log::{info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::schema::{ENGINE_VERSION, PopulationSnapshot};

use crate::engine::candidate::{Candidate, Genome};
use crate::engine::error::Result;
use crate::engine::ids::IdGenerator;
use crate::engine::rng::EngineRng;
use crate::engine::selection::build_selector;

use super::Population;

impl<G: Genome> Population<G> {
    /// Capture the committed state of the population.
    pub fn snapshot(&self) -> PopulationSnapshot<G> {
        PopulationSnapshot {
            version: ENGINE_VERSION.to_string(),
            name: self.name.clone(),
            generation: self.generation,
            steady_state_generations: self.steady_state_generations,
            previous_best: self.previous_best.clone(),
            sigma: self.sigma,
            selection: self.selector.config(),
            elapsed_secs: self.elapsed().as_secs_f64(),
            evaluations: self.evaluator.total_evaluations(),
            ids: self.ids.counters(),
            rng: self.rng.state(),
            candidates: self
                .candidates
                .iter()
                .filter(|c| !c.is_dead())
                .map(Candidate::to_snapshot)
                .collect(),
        }
    }

    /// Replace the current state with `snapshot` and bring the population to
    /// a committed state. Candidates saved without fitness are re-evaluated.
    pub fn resume(&mut self, snapshot: PopulationSnapshot<G>) -> Result<()> {
        if snapshot.version != ENGINE_VERSION {
            warn!(
                "{}: checkpoint written by version {}, running {}",
                self.name, snapshot.version, ENGINE_VERSION
            );
        }

        let mut ids = IdGenerator::new();
        ids.resume_from(snapshot.ids)?;
        let mut candidates: Vec<Candidate<G>> = snapshot
            .candidates
            .into_iter()
            .map(Candidate::from_snapshot)
            .collect();
        candidates.sort_by_key(Candidate::id);
        for candidate in &candidates {
            ids.reserve_past(candidate.id(), candidate.allopatric_tag());
        }

        self.ids = ids;
        self.candidates = candidates;
        self.rng = EngineRng::restore(&snapshot.rng);
        self.selector = build_selector(&snapshot.selection);
        self.config.selection = snapshot.selection;
        self.generation = snapshot.generation;
        self.steady_state_generations = snapshot.steady_state_generations;
        self.previous_best = snapshot.previous_best;
        self.sigma = snapshot.sigma;
        self.carried = Duration::from_secs_f64(snapshot.elapsed_secs.max(0.0));
        self.started = Instant::now();
        self.evaluator.restore_stats(snapshot.evaluations);
        self.preserved.clear();

        info!(
            "{}: resumed {} candidates at generation {}",
            self.name,
            self.candidates.len(),
            self.generation
        );
        self.prepare()
    }

    /// Write a checkpoint as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()>
    where
        G: Serialize,
    {
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path.as_ref(), json)?;
        info!("{}: checkpoint saved to {:?}", self.name, path.as_ref());
        Ok(())
    }

    /// Read a checkpoint and resume from it.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()>
    where
        G: DeserializeOwned,
    {
        let content = fs::read_to_string(path.as_ref())?;
        let snapshot: PopulationSnapshot<G> = serde_json::from_str(&content)?;
        self.resume(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::config;
    use super::*;
    use crate::engine::bitstring::{BitFlipBreeder, BitString, OneMax};
    use crate::schema::{CandidateKind, EngineConfig, SelectionConfig};

    fn one_max(config: EngineConfig) -> Population<BitString> {
        Population::new("checkpoint", config, Arc::new(OneMax))
            .unwrap()
            .with_breeder(BitFlipBreeder::default())
    }

    #[test]
    fn test_resume_continues_identically() {
        let mut original = one_max(config(6, 8, 4));
        original
            .setup(|rng| CandidateKind::Individual(BitString::random(20, rng)))
            .unwrap();
        for _ in 0..3 {
            original.step().unwrap();
        }
        let snapshot = original.snapshot();

        let mut resumed = one_max(config(6, 8, 4));
        resumed.resume(snapshot).unwrap();
        assert_eq!(resumed.generation(), 3);
        assert_eq!(resumed.sigma(), original.sigma());

        for _ in 0..3 {
            original.step().unwrap();
            resumed.step().unwrap();
        }
        let genomes = |p: &Population<BitString>| -> Vec<(u64, String)> {
            p.candidates()
                .iter()
                .map(|c| (c.id().0, c.normalized_phenotype().to_string()))
                .collect()
        };
        assert_eq!(genomes(&original), genomes(&resumed));
    }

    #[test]
    fn test_snapshot_keeps_adapted_selector() {
        let mut population = one_max(config(6, 8, 4));
        population
            .setup(|rng| CandidateKind::Individual(BitString::random(20, rng)))
            .unwrap();
        population.step().unwrap();
        let snapshot = population.snapshot();
        assert_eq!(snapshot.candidates.len(), population.total_count());
        assert!(matches!(snapshot.selection, SelectionConfig::Tournament(_)));
        assert_eq!(snapshot.ids, population.ids.counters());
    }

    #[test]
    fn test_resume_keeps_issuing_fresh_ids() {
        let mut population = one_max(config(6, 8, 4));
        population
            .setup(|rng| CandidateKind::Individual(BitString::random(20, rng)))
            .unwrap();
        let mut snapshot = population.snapshot();
        snapshot.ids.next_candidate = 0;

        let mut resumed = one_max(config(6, 8, 4));
        resumed.resume(snapshot).unwrap();
        let highest = resumed.candidates().iter().map(|c| c.id()).max().unwrap();
        let id = resumed
            .insert(CandidateKind::Individual(BitString::parse("1")))
            .unwrap();
        assert!(id > highest);
    }
}

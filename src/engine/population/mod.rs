//! The generational population: owns every candidate and drives them through
//! the fixed generation pipeline.
//!
//! Each [`Population::step`] runs, in this order:
//!
//! 1. offspring generation (`lambda` breeder calls),
//! 2. evaluation of every not-dead candidate lacking a raw fitness,
//! 3. clone detection, delta entropy and fitness sharing,
//! 4. operator statistics,
//! 5. choice of the candidates to preserve,
//! 6. hero promotion and aging,
//! 7. allopatric and mu selection,
//! 8. zombie reconciliation and corpse removal,
//! 9. commit of the best and worst candidates, then self-adaptation.
//!
//! The random stream is consumed only by stages 1 and 7 (through the
//! breeder and the selector), in that order, so a run is reproducible from
//! its seed.

mod clones;
mod diagnostics;
mod lifecycle;
mod offspring;
mod sharing;
mod snapshot;
mod stop;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::schema::{
    CandidateId, CandidateKind, EngineConfig, EvaluatorStats, OperatorPerformance,
    PopulationCensus,
};

use super::breeder::Breeder;
use super::candidate::{Candidate, Genome};
use super::error::Result;
use super::evaluator::{Evaluator, FitnessFunction, StopFlag};
use super::hooks::{PopulationHooks, ScalarHooks};
use super::ids::IdGenerator;
use super::rng::EngineRng;
use super::selection::{Selector, build_selector};

/// A population of candidates evolving over discrete generations.
///
/// Candidates live in a single arena kept sorted by id; dead candidates are
/// compacted away at the end of every generation.
pub struct Population<G: Genome> {
    name: String,
    config: EngineConfig,
    generation: u32,
    candidates: Vec<Candidate<G>>,
    preserved: Vec<CandidateId>,
    steady_state_generations: u32,
    previous_best: Option<Vec<f64>>,
    entropy: f64,
    sigma: f64,
    best_raw: Option<CandidateId>,
    worst_raw: Option<CandidateId>,
    best_scaled: Option<CandidateId>,
    worst_scaled: Option<CandidateId>,
    performance: OperatorPerformance,
    ids: IdGenerator,
    rng: EngineRng,
    evaluator: Evaluator<G>,
    selector: Box<dyn Selector<G>>,
    hooks: Box<dyn PopulationHooks<G>>,
    breeder: Option<Box<dyn Breeder<G>>>,
    started: Instant,
    carried: Duration,
}

impl<G: Genome> Population<G> {
    /// Create an empty population. The configuration is validated first.
    pub fn new(
        name: impl Into<String>,
        config: EngineConfig,
        function: Arc<dyn FitnessFunction<G>>,
    ) -> Result<Self> {
        config.validate()?;

        let rng = match config.random_seed {
            Some(seed) => EngineRng::new(seed),
            None => EngineRng::random(),
        };
        let evaluator = Evaluator::new(
            function,
            config.evaluation.clone(),
            config.population.fitness_components,
        );
        let selector = build_selector(&config.selection);

        Ok(Self {
            name: name.into(),
            sigma: config.population.sigma,
            config,
            generation: 0,
            candidates: Vec::new(),
            preserved: Vec::new(),
            steady_state_generations: 0,
            previous_best: None,
            entropy: 0.0,
            best_raw: None,
            worst_raw: None,
            best_scaled: None,
            worst_scaled: None,
            performance: OperatorPerformance::default(),
            ids: IdGenerator::new(),
            rng,
            evaluator,
            selector,
            hooks: Box::new(ScalarHooks),
            breeder: None,
            started: Instant::now(),
            carried: Duration::ZERO,
        })
    }

    /// Replace the default comparators and clone policy.
    pub fn with_hooks(mut self, hooks: impl PopulationHooks<G> + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Attach the variation operators used to create offspring.
    pub fn with_breeder(mut self, breeder: impl Breeder<G> + 'static) -> Self {
        self.breeder = Some(Box::new(breeder));
        self
    }

    /// Fill the population with `nu` random candidates, then evaluate and
    /// commit them. Invalid candidates are discarded.
    pub fn setup<F>(&mut self, mut factory: F) -> Result<()>
    where
        F: FnMut(&mut EngineRng) -> CandidateKind<G>,
    {
        let nu = self.config.population.nu;
        let mut discarded = 0;
        for _ in 0..nu {
            let kind = factory(&mut self.rng);
            if self.insert(kind).is_none() {
                discarded += 1;
            }
        }
        if discarded > 0 {
            warn!("{}: discarded {} invalid random candidates", self.name, discarded);
        }
        info!(
            "{}: created {} random candidates",
            self.name,
            self.candidates.len()
        );
        self.prepare()
    }

    /// Add a candidate born in the current generation. Returns `None` if it
    /// does not validate.
    pub fn insert(&mut self, kind: CandidateKind<G>) -> Option<CandidateId> {
        if !kind.validate() {
            return None;
        }
        let candidate = Candidate::new(kind, &mut self.ids, self.generation);
        let id = candidate.id();
        self.candidates.push(candidate);
        Some(id)
    }

    /// Bring the population to a committed state without advancing the
    /// generation: evaluate, handle clones, drop corpses and commit.
    pub fn prepare(&mut self) -> Result<()> {
        self.evaluate()?;
        self.detect_and_handle_clones();
        self.remove_corpses();
        self.prepare_for_commit()?;
        self.commit();
        Ok(())
    }

    /// Run one generation. Returns `false` when the population is extinct.
    pub fn step(&mut self) -> Result<bool> {
        self.generation += 1;
        debug!("{}: generation {}", self.name, self.generation);

        if self.candidates.is_empty() {
            warn!("{}: the population is empty", self.name);
            return Ok(false);
        }

        let newborn = self.breed()?;

        if self.config.population.invalidate_fitness_after_generation {
            self.discard_fitness();
        }

        self.evaluate()?;
        self.detect_and_handle_clones();
        self.update_delta_entropy()?;
        self.share_fitness();

        #[cfg(debug_assertions)]
        self.check_fitness_validity();
        if self.config.diagnostics.full_consistency_check {
            self.check_consistency();
        }

        self.update_operator_statistics(&newborn);
        self.select_preserved();
        self.promote_heroes_and_age()?;
        self.slaughter()?;
        self.handle_zombies();
        self.remove_corpses();

        if self.live_count() == 0 {
            warn!(
                "{}: extinct at generation {}",
                self.name, self.generation
            );
            return Ok(false);
        }

        self.prepare_for_commit()?;
        self.commit();
        self.update_steady_state();

        self.update_sigma();
        let inertia = self.config.population.inertia;
        self.selector
            .update_endogenous_parameters(&self.performance, inertia);

        self.describe("End of generation");
        debug_assert!(self.live_count() <= self.config.population.mu);
        Ok(true)
    }

    /// Send every not-dead candidate without raw fitness to the evaluator and
    /// store the results. Returns the number of requests.
    fn evaluate(&mut self) -> Result<usize> {
        let mut requests = 0;
        for candidate in &self.candidates {
            if !candidate.is_dead() && !candidate.has_valid_fitness() {
                self.evaluator.evaluate(candidate);
                requests += 1;
            }
        }

        let name = &self.name;
        let resolved = self.evaluator.flush(&mut |done, total| {
            debug!("{}: evaluated {}/{}", name, done, total);
        })?;
        self.evaluator.step(self.generation + 1);

        for (id, fitness) in resolved {
            if let Some(candidate) = self.candidate_mut(id) {
                candidate.set_raw_fitness(&fitness);
            }
        }
        if requests == 0 {
            debug!(
                "{}: nothing to evaluate at generation {}",
                self.name, self.generation
            );
        }
        Ok(requests)
    }

    /// Forget the raw fitness of every candidate, zombies included.
    fn discard_fitness(&mut self) {
        for candidate in self.candidates.iter_mut().filter(|c| !c.is_dead()) {
            candidate.invalidate_fitness();
        }
    }

    #[cfg(debug_assertions)]
    fn check_fitness_validity(&self) {
        for candidate in &self.candidates {
            debug_assert!(
                candidate.is_dead() || candidate.has_valid_fitness(),
                "{candidate} is not dead but has no valid fitness"
            );
        }
    }

    fn position(&self, id: CandidateId) -> Option<usize> {
        self.candidates.binary_search_by_key(&id, Candidate::id).ok()
    }

    fn candidate_mut(&mut self, id: CandidateId) -> Option<&mut Candidate<G>> {
        let index = self.position(id)?;
        self.candidates.get_mut(index)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Global entropy of the live candidates at the last commit.
    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    /// Current self-adapted mutation strength.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Every candidate, sorted by id.
    pub fn candidates(&self) -> &[Candidate<G>] {
        &self.candidates
    }

    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate<G>> {
        self.position(id).map(|index| &self.candidates[index])
    }

    /// Candidates protected from death during the current generation.
    pub fn preserved(&self) -> &[CandidateId] {
        &self.preserved
    }

    /// Alive and hero candidates.
    pub fn live_count(&self) -> usize {
        self.candidates.iter().filter(|c| c.is_alive()).count()
    }

    pub fn total_count(&self) -> usize {
        self.candidates.len()
    }

    pub fn best_raw(&self) -> Option<&Candidate<G>> {
        self.best_raw.and_then(|id| self.candidate(id))
    }

    pub fn worst_raw(&self) -> Option<&Candidate<G>> {
        self.worst_raw.and_then(|id| self.candidate(id))
    }

    pub fn best_scaled(&self) -> Option<&Candidate<G>> {
        self.best_scaled.and_then(|id| self.candidate(id))
    }

    pub fn worst_scaled(&self) -> Option<&Candidate<G>> {
        self.worst_scaled.and_then(|id| self.candidate(id))
    }

    /// Generations since the best raw fitness last improved.
    pub fn steady_state_generations(&self) -> u32 {
        self.steady_state_generations
    }

    pub fn reset_steady_state(&mut self) {
        self.steady_state_generations = 0;
    }

    /// Outcome tallies of the last generation's offspring.
    pub fn operator_performance(&self) -> &OperatorPerformance {
        &self.performance
    }

    pub fn evaluator_stats(&self) -> EvaluatorStats {
        self.evaluator.stats()
    }

    /// Handle the fitness function can use to stop the run.
    pub fn stop_flag(&self) -> StopFlag {
        self.evaluator.stop_flag()
    }

    /// Wall-clock time spent, including time before a resume.
    pub fn elapsed(&self) -> Duration {
        self.carried + self.started.elapsed()
    }

    pub fn selector(&self) -> &dyn Selector<G> {
        self.selector.as_ref()
    }

    /// Component-wise mean raw fitness of the not-dead candidates.
    pub fn average_raw_fitness(&self) -> Option<Vec<f64>> {
        let mut sum = vec![0.0; self.config.population.fitness_components];
        let mut count = 0usize;
        for raw in self
            .candidates
            .iter()
            .filter(|c| !c.is_dead())
            .filter_map(|c| c.raw_fitness())
        {
            for (total, value) in sum.iter_mut().zip(&raw.values) {
                *total += value;
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(sum.into_iter().map(|total| total / count as f64).collect())
    }

    pub fn average_age(&self) -> f64 {
        self.average(|c| f64::from(c.age()))
    }

    pub fn average_delta_entropy(&self) -> f64 {
        self.average(Candidate::delta_entropy)
    }

    /// Mean over live candidates, accumulated in id order.
    fn average(&self, value: impl Fn(&Candidate<G>) -> f64) -> f64 {
        let (sum, count) = self
            .candidates
            .iter()
            .filter(|c| c.is_alive())
            .fold((0.0, 0usize), |(sum, count), c| (sum + value(c), count + 1));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    pub fn census(&self) -> PopulationCensus {
        let mut census = PopulationCensus::default();
        for candidate in &self.candidates {
            if candidate.is_hero() {
                census.heroes += 1;
            } else if candidate.is_zombie() {
                census.zombies += 1;
            } else if candidate.is_dead() {
                census.dead += 1;
            } else {
                census.alive += 1;
            }
        }
        census
    }

    /// Log the census at debug level.
    pub fn describe(&self, context: &str) {
        let census = self.census();
        debug!(
            "{} ({}): {} alive including {} heroes, {} zombies, {} dead",
            context,
            self.name,
            census.alive + census.heroes,
            census.heroes,
            census.zombies,
            census.dead
        );
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::engine::bitstring::{BitString, OneMax};
    use crate::schema::{CandidateKind, EngineConfig, PopulationConfig};

    use super::Population;

    pub fn config(mu: usize, nu: usize, lambda: usize) -> EngineConfig {
        EngineConfig {
            population: PopulationConfig {
                mu,
                nu,
                lambda,
                ..Default::default()
            },
            random_seed: Some(42),
            ..Default::default()
        }
    }

    /// OneMax population holding the given bit strings, evaluated and committed.
    pub fn population_of(config: EngineConfig, genomes: &[&str]) -> Population<BitString> {
        let mut population = Population::new("test", config, Arc::new(OneMax)).unwrap();
        for bits in genomes {
            population
                .insert(CandidateKind::Individual(BitString::parse(bits)))
                .unwrap();
        }
        population.prepare().unwrap();
        population
    }
}

//! Evaluator: queues fitness requests, caches results by phenotype and runs
//! the actual fitness function on a bounded worker pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, trace};
use rayon::prelude::*;

use crate::schema::{CandidateId, CandidateKind, EvaluatorConfig, EvaluatorStats};

use super::candidate::{Candidate, Genome};
use super::error::{EngineError, EvaluationError, Result};
use super::fitness::Fitness;

/// Cooperative stop request raised by a fitness function.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop at the next generation boundary.
    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// The external mechanism computing raw fitness.
///
/// Called from worker threads; may request a stop through `stop`.
pub trait FitnessFunction<G>: Send + Sync {
    fn evaluate(
        &self,
        candidate: &CandidateKind<G>,
        phenotype: &str,
        stop: &StopFlag,
    ) -> Result<Fitness, EvaluationError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    fitness: Option<Fitness>,
    created: u32,
    last_used: u32,
}

struct Job<G> {
    phenotype: String,
    kind: CandidateKind<G>,
}

/// Progress callback: `(completed, total)` evaluations of the current flush.
pub type FlushProgress<'a> = &'a mut dyn FnMut(usize, usize);

/// Queues evaluations and resolves them at [`Evaluator::flush`].
pub struct Evaluator<G> {
    function: Arc<dyn FitnessFunction<G>>,
    config: EvaluatorConfig,
    components: usize,
    cache: HashMap<String, CacheEntry>,
    jobs: Vec<Job<G>>,
    requests: Vec<(CandidateId, String)>,
    generation: u32,
    stats: EvaluatorStats,
    stop: StopFlag,
    pool: Option<rayon::ThreadPool>,
}

impl<G: Genome> Evaluator<G> {
    /// Create an evaluator expecting fitness vectors of `components` values.
    pub fn new(
        function: Arc<dyn FitnessFunction<G>>,
        config: EvaluatorConfig,
        components: usize,
    ) -> Self {
        Self {
            function,
            config,
            components,
            cache: HashMap::new(),
            jobs: Vec::new(),
            requests: Vec::new(),
            generation: 0,
            stats: EvaluatorStats::default(),
            stop: StopFlag::new(),
            pool: None,
        }
    }

    /// Handle shared with the fitness function.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    pub fn stats(&self) -> EvaluatorStats {
        self.stats
    }

    /// Fitness function invocations so far.
    pub fn total_evaluations(&self) -> u64 {
        self.stats.evaluations
    }

    pub(crate) fn restore_stats(&mut self, evaluations: u64) {
        self.stats.evaluations = evaluations;
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Number of requests waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.requests.len()
    }

    /// Queue `candidate`. Never blocks; the result is delivered by the next flush.
    pub fn evaluate(&mut self, candidate: &Candidate<G>) {
        let phenotype = candidate.normalized_phenotype();
        match self.cache.get_mut(phenotype) {
            Some(entry) => {
                if entry.created == self.generation {
                    self.stats.duplicates += 1;
                } else {
                    self.stats.cache_hits += 1;
                }
                entry.last_used = self.generation;
                trace!("{} resolved by cache", candidate);
            }
            None => {
                self.cache.insert(
                    phenotype.to_string(),
                    CacheEntry {
                        fitness: None,
                        created: self.generation,
                        last_used: self.generation,
                    },
                );
                self.jobs.push(Job {
                    phenotype: phenotype.to_string(),
                    kind: candidate.kind().clone(),
                });
            }
        }
        self.requests.push((candidate.id(), phenotype.to_string()));
    }

    /// Run every queued evaluation and return the fitness of every request,
    /// in request order. Returns only when all of them completed.
    ///
    /// At most `concurrent_evaluations` run at once. On failure the queue is
    /// dropped and no pending entry is left in the cache.
    pub fn flush(&mut self, progress: FlushProgress<'_>) -> Result<Vec<(CandidateId, Fitness)>> {
        let started = Instant::now();
        let result = self.run_jobs(progress);
        self.stats.elapsed_secs += started.elapsed().as_secs_f64();

        if let Err(e) = result {
            self.jobs.clear();
            self.requests.clear();
            self.cache.retain(|_, entry| entry.fitness.is_some());
            return Err(e);
        }

        let mut resolved = Vec::with_capacity(self.requests.len());
        for (id, phenotype) in std::mem::take(&mut self.requests) {
            let fitness = self
                .cache
                .get(&phenotype)
                .and_then(|entry| entry.fitness.clone())
                .ok_or(EngineError::MissingFitness(id))?;
            resolved.push((id, fitness));
        }
        Ok(resolved)
    }

    fn run_jobs(&mut self, progress: FlushProgress<'_>) -> Result<()> {
        let jobs = std::mem::take(&mut self.jobs);
        if jobs.is_empty() {
            return Ok(());
        }

        let limit = self.config.concurrent_evaluations.max(1);
        if limit > 1 && self.pool.is_none() {
            self.pool = Some(rayon::ThreadPoolBuilder::new().num_threads(limit).build()?);
        }

        let total = jobs.len();
        let mut completed = 0;
        debug!("Evaluating {} phenotypes, {} at a time", total, limit);

        for chunk in jobs.chunks(limit) {
            let function = &self.function;
            let stop = &self.stop;
            let evaluate = |job: &Job<G>| function.evaluate(&job.kind, &job.phenotype, stop);
            let results: Vec<Result<Fitness, EvaluationError>> = match &self.pool {
                Some(pool) => pool.install(|| chunk.par_iter().map(evaluate).collect()),
                None => chunk.iter().map(evaluate).collect(),
            };

            for (job, result) in chunk.iter().zip(results) {
                let fitness = result?;
                if fitness.values.len() != self.components {
                    return Err(EngineError::InvalidFitness {
                        expected: self.components,
                        actual: fitness.values.len(),
                    });
                }
                if let Some(entry) = self.cache.get_mut(&job.phenotype) {
                    entry.fitness = Some(fitness);
                }
            }

            self.stats.evaluations += chunk.len() as u64;
            completed += chunk.len();
            progress(completed, total);
        }
        Ok(())
    }

    /// Per-generation cache housekeeping.
    ///
    /// With a cache size of 0 everything is forgotten; otherwise the least
    /// recently used entries are evicted until the cache fits.
    pub fn step(&mut self, next_generation: u32) {
        self.generation = next_generation;

        if self.config.cache_size == 0 {
            self.cache.clear();
            return;
        }

        let excess = self.cache.len().saturating_sub(self.config.cache_size);
        if excess == 0 {
            return;
        }

        let mut entries: Vec<(u32, String)> = self
            .cache
            .iter()
            .map(|(phenotype, entry)| (entry.last_used, phenotype.clone()))
            .collect();
        entries.sort();
        for (_, phenotype) in entries.into_iter().take(excess) {
            self.cache.remove(&phenotype);
        }
        debug!("Evicted {} cache entries", excess);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::engine::bitstring::{BitString, OneMax};
    use crate::engine::ids::IdGenerator;

    fn candidate(bits: &str, ids: &mut IdGenerator) -> Candidate<BitString> {
        Candidate::new(CandidateKind::Individual(BitString::parse(bits)), ids, 0)
    }

    fn config(cache_size: usize, concurrent_evaluations: usize) -> EvaluatorConfig {
        EvaluatorConfig {
            cache_size,
            concurrent_evaluations,
        }
    }

    /// Records phenotypes it was asked to evaluate.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl FitnessFunction<BitString> for Recorder {
        fn evaluate(
            &self,
            _candidate: &CandidateKind<BitString>,
            phenotype: &str,
            _stop: &StopFlag,
        ) -> Result<Fitness, EvaluationError> {
            self.seen.lock().unwrap().push(phenotype.to_string());
            Ok(Fitness::new(vec![phenotype.len() as f64]))
        }
    }

    struct Failing;

    impl FitnessFunction<BitString> for Failing {
        fn evaluate(
            &self,
            _candidate: &CandidateKind<BitString>,
            phenotype: &str,
            stop: &StopFlag,
        ) -> Result<Fitness, EvaluationError> {
            stop.request();
            Err(EvaluationError::new(phenotype, "boom"))
        }
    }

    #[test]
    fn test_flush_resolves_all_requests() {
        let mut ids = IdGenerator::new();
        let mut evaluator: Evaluator<BitString> = Evaluator::new(Arc::new(OneMax), config(10, 1), 1);
        let a = candidate("1100", &mut ids);
        let b = candidate("1111", &mut ids);
        evaluator.evaluate(&a);
        evaluator.evaluate(&b);
        let results = evaluator.flush(&mut |_, _| {}).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], (a.id(), Fitness::new(vec![2.0])));
        assert_eq!(results[1], (b.id(), Fitness::new(vec![4.0])));
        assert_eq!(evaluator.total_evaluations(), 2);
    }

    #[test]
    fn test_duplicates_share_one_evaluation() {
        let mut ids = IdGenerator::new();
        let recorder = Arc::new(Recorder::default());
        let mut evaluator: Evaluator<BitString> = Evaluator::new(recorder.clone(), config(10, 1), 1);
        evaluator.evaluate(&candidate("101", &mut ids));
        evaluator.evaluate(&candidate("101", &mut ids));
        let results = evaluator.flush(&mut |_, _| {}).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
        assert_eq!(evaluator.stats().duplicates, 1);
    }

    #[test]
    fn test_cache_hit_in_later_generation() {
        let mut ids = IdGenerator::new();
        let recorder = Arc::new(Recorder::default());
        let mut evaluator: Evaluator<BitString> = Evaluator::new(recorder.clone(), config(10, 1), 1);
        evaluator.evaluate(&candidate("101", &mut ids));
        evaluator.flush(&mut |_, _| {}).unwrap();
        evaluator.step(1);
        evaluator.evaluate(&candidate("101", &mut ids));
        evaluator.flush(&mut |_, _| {}).unwrap();
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);
        assert_eq!(evaluator.stats().cache_hits, 1);
    }

    #[test]
    fn test_zero_cache_size_forgets() {
        let mut ids = IdGenerator::new();
        let recorder = Arc::new(Recorder::default());
        let mut evaluator: Evaluator<BitString> = Evaluator::new(recorder.clone(), config(0, 1), 1);
        evaluator.evaluate(&candidate("101", &mut ids));
        evaluator.flush(&mut |_, _| {}).unwrap();
        evaluator.step(1);
        assert_eq!(evaluator.cached(), 0);
        evaluator.evaluate(&candidate("101", &mut ids));
        evaluator.flush(&mut |_, _| {}).unwrap();
        assert_eq!(recorder.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_lru_eviction() {
        let mut ids = IdGenerator::new();
        let mut evaluator: Evaluator<BitString> = Evaluator::new(Arc::new(OneMax), config(2, 1), 1);
        evaluator.evaluate(&candidate("1", &mut ids));
        evaluator.flush(&mut |_, _| {}).unwrap();
        evaluator.step(1);
        evaluator.evaluate(&candidate("11", &mut ids));
        evaluator.evaluate(&candidate("111", &mut ids));
        evaluator.flush(&mut |_, _| {}).unwrap();
        evaluator.step(2);
        assert_eq!(evaluator.cached(), 2);
        assert!(!evaluator.cache.contains_key("1"));
    }

    #[test]
    fn test_concurrent_flush_reports_progress() {
        let mut ids = IdGenerator::new();
        let mut evaluator: Evaluator<BitString> = Evaluator::new(Arc::new(OneMax), config(100, 3), 1);
        let candidates: Vec<_> = (1..=7)
            .map(|n| candidate(&"1".repeat(n), &mut ids))
            .collect();
        for c in &candidates {
            evaluator.evaluate(c);
        }
        let mut steps = Vec::new();
        let results = evaluator
            .flush(&mut |done, total| steps.push((done, total)))
            .unwrap();
        assert_eq!(steps, vec![(3, 7), (6, 7), (7, 7)]);
        for (c, (id, fitness)) in candidates.iter().zip(&results) {
            assert_eq!(c.id(), *id);
            assert_eq!(fitness.values[0], c.normalized_phenotype().len() as f64);
        }
    }

    #[test]
    fn test_failure_clears_queue_and_sets_stop() {
        let mut ids = IdGenerator::new();
        let mut evaluator: Evaluator<BitString> = Evaluator::new(Arc::new(Failing), config(10, 1), 1);
        evaluator.evaluate(&candidate("1", &mut ids));
        let result = evaluator.flush(&mut |_, _| {});
        assert!(matches!(result, Err(EngineError::Evaluation(_))));
        assert_eq!(evaluator.pending(), 0);
        assert_eq!(evaluator.cached(), 0);
        assert!(evaluator.stop_requested());
    }

    #[test]
    fn test_wrong_component_count_rejected() {
        let mut ids = IdGenerator::new();
        let mut evaluator: Evaluator<BitString> = Evaluator::new(Arc::new(OneMax), config(10, 1), 2);
        evaluator.evaluate(&candidate("1", &mut ids));
        assert!(matches!(
            evaluator.flush(&mut |_, _| {}),
            Err(EngineError::InvalidFitness {
                expected: 2,
                actual: 1
            })
        ));
    }
}

//! Stop conditions, reports and the run loop.

use log::info;

use crate::schema::{GenerationReport, RunSummary, StopReason};

use crate::engine::candidate::Genome;
use crate::engine::error::Result;

use super::Population;

impl<G: Genome> Population<G> {
    /// First satisfied stop condition, if any. Checked at generation boundaries.
    pub fn check_stop_condition(&self) -> Option<StopReason> {
        let stop = &self.config.stop;
        let best = self.best_raw().and_then(|c| c.raw_fitness());

        let reason = if stop
            .max_generations
            .is_some_and(|max| self.generation >= max)
        {
            Some(StopReason::MaxGenerations)
        } else if stop
            .max_evaluations
            .is_some_and(|max| self.evaluator.total_evaluations() >= max)
        {
            Some(StopReason::MaxEvaluations)
        } else if stop
            .max_time_secs
            .is_some_and(|max| self.elapsed().as_secs_f64() >= max)
        {
            Some(StopReason::TimeBudget)
        } else if self.evaluator.stop_requested() {
            Some(StopReason::ExternalStop)
        } else if let (Some(target), Some(best)) = (&stop.target_fitness, best)
            && best.reaches(target)
        {
            Some(StopReason::TargetReached)
        } else if stop
            .max_steady_state_generations
            .is_some_and(|max| self.steady_state_generations >= max)
        {
            Some(StopReason::SteadyState)
        } else {
            None
        };

        if let Some(reason) = reason {
            info!(
                "{}: stopping at generation {}: {:?}",
                self.name, self.generation, reason
            );
        }
        reason
    }

    /// Summary of the committed population.
    pub fn report(&self) -> GenerationReport {
        let best = self.best_raw();
        GenerationReport {
            generation: self.generation,
            census: self.census(),
            best_raw: best
                .and_then(|c| c.raw_fitness())
                .map(|f| f.values.clone()),
            best_id: best.map(|c| c.id()),
            average_raw: self
                .average_raw_fitness()
                .and_then(|values| values.first().copied()),
            average_age: self.average_age(),
            entropy: self.entropy,
            sigma: self.sigma,
            steady_state_generations: self.steady_state_generations,
            evaluator: self.evaluator.stats(),
            operators: self.performance,
        }
    }

    /// Step until a stop condition holds or the population dies out.
    /// `on_generation` receives the report of every completed generation.
    pub fn run<F>(&mut self, mut on_generation: F) -> Result<RunSummary>
    where
        F: FnMut(&GenerationReport),
    {
        info!(
            "{}: running from generation {} with {} candidates",
            self.name,
            self.generation,
            self.candidates.len()
        );
        let stop_reason = loop {
            if let Some(reason) = self.check_stop_condition() {
                break reason;
            }
            if !self.step()? {
                info!("{}: extinct at generation {}", self.name, self.generation);
                break StopReason::Extinction;
            }
            on_generation(&self.report());
        };

        let best = self.best_raw();
        let summary = RunSummary {
            generations: self.generation,
            stop_reason,
            best_id: best.map(|c| c.id()),
            best_raw: best
                .and_then(|c| c.raw_fitness())
                .map(|f| f.values.clone()),
            evaluator: self.evaluator.stats(),
            elapsed_secs: self.elapsed().as_secs_f64(),
        };
        info!(
            "{}: finished after {} generations ({:?}), best {:?}",
            self.name, summary.generations, summary.stop_reason, summary.best_raw
        );
        Ok(summary)
    }
}

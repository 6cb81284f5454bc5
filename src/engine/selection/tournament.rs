//! Tournament selection, with optional fitness hole and two-step diversity picks.

use log::{debug, trace};

use crate::engine::candidate::{Candidate, Genome};
use crate::engine::hooks::oriented;
use crate::engine::rng::EngineRng;
use crate::engine::statistics::{adapted_target, blend};
use crate::schema::{OperatorPerformance, SelectionConfig, TournamentConfig};

use super::{SelectionContext, Selector};

#[derive(Debug, Clone)]
pub struct TournamentSelector {
    config: TournamentConfig,
    two_step: bool,
}

impl TournamentSelector {
    /// With `two_step`, every pick after the first favors candidates far from
    /// the ones already picked.
    pub fn new(config: TournamentConfig, two_step: bool) -> Self {
        Self { config, two_step }
    }

    pub fn tau(&self) -> f64 {
        self.config.tau
    }

    pub fn meta_tau(&self) -> f64 {
        self.config.meta_tau
    }

    /// Tournament size for one draw. The fractional part is resolved by a
    /// Bernoulli trial, which is consumed even for integral sizes.
    fn actual_tau(&self, population_size: usize, multiplier: f64, rng: &mut EngineRng) -> usize {
        let multiplied = if self.config.meta_tau > 0.0 {
            multiplier * self.config.meta_tau * population_size as f64
        } else {
            multiplier * self.config.tau
        };
        let integral = multiplied.floor();
        let extra = rng.chance(multiplied - integral);
        let tau = integral as usize + usize::from(extra);
        tau.max(1)
    }

    /// Index into `remaining` of the winner of one tournament.
    fn tournament<G: Genome>(
        &self,
        remaining: &[&Candidate<G>],
        multiplier: f64,
        reverse: bool,
        use_hole: bool,
        context: &SelectionContext<'_, G>,
        rng: &mut EngineRng,
    ) -> usize {
        let tau = self.actual_tau(context.population_size, multiplier, rng);

        let entrants: Vec<usize> = if remaining.len() <= tau {
            trace!(
                "Tournament of {} with only {} candidates: using all of them",
                tau,
                remaining.len()
            );
            (0..remaining.len()).collect()
        } else {
            let mut indices: Vec<usize> = (0..remaining.len()).collect();
            for i in 0..tau {
                let j = rng.index(i, indices.len());
                indices.swap(i, j);
            }
            indices.truncate(tau);
            indices
        };

        let hooks = context.hooks;
        let compare = |a: &usize, b: &usize| {
            let (a, b) = (remaining[*a], remaining[*b]);
            let ordering = if use_hole {
                hooks.compare_for_fitness_hole(a, b)
            } else {
                hooks.compare_for_selection(a, b)
            };
            oriented(ordering, reverse)
        };
        entrants
            .iter()
            .copied()
            .min_by(|a, b| compare(a, b))
            .unwrap_or(0)
    }

    fn sorted<'c, G: Genome>(
        mut pool: Vec<&'c Candidate<G>>,
        reverse: bool,
        use_hole: bool,
        context: &SelectionContext<'_, G>,
    ) -> Vec<&'c Candidate<G>> {
        pool.sort_by(|a, b| {
            let ordering = if use_hole {
                context.hooks.compare_for_fitness_hole(a, b)
            } else {
                context.hooks.compare_for_selection(a, b)
            };
            oriented(ordering, reverse)
        });
        pool
    }

    fn single_step<'c, G: Genome>(
        &self,
        mut remaining: Vec<&'c Candidate<G>>,
        count: usize,
        multiplier: f64,
        reverse: bool,
        context: &SelectionContext<'_, G>,
        rng: &mut EngineRng,
    ) -> Vec<&'c Candidate<G>> {
        let mut picks = Vec::with_capacity(count);
        while picks.len() < count && !remaining.is_empty() {
            let use_hole = rng.chance(self.config.fitness_hole);
            let winner = self.tournament(&remaining, multiplier, reverse, use_hole, context, rng);
            picks.push(remaining.remove(winner));
        }
        picks
    }

    fn two_step<'c, G: Genome>(
        &self,
        mut remaining: Vec<&'c Candidate<G>>,
        count: usize,
        multiplier: f64,
        reverse: bool,
        context: &SelectionContext<'_, G>,
        rng: &mut EngineRng,
    ) -> Vec<&'c Candidate<G>> {
        let mut picks: Vec<&'c Candidate<G>> = Vec::with_capacity(count);
        while picks.len() < count && !remaining.is_empty() {
            if picks.is_empty() {
                let winner = self.tournament(&remaining, multiplier, reverse, false, context, rng);
                picks.push(remaining.remove(winner));
                continue;
            }

            // Second stage: several tournament winners, then the one farthest
            // on average from what is already picked.
            let stage_size = remaining
                .len()
                .min(self.actual_tau(context.population_size, multiplier, rng));
            let mut scratch = remaining.clone();
            let mut finalists = Vec::with_capacity(stage_size);
            while finalists.len() < stage_size && !scratch.is_empty() {
                let winner = self.tournament(&scratch, multiplier, reverse, false, context, rng);
                finalists.push(scratch.remove(winner));
            }

            let mut best: Option<(f64, &'c Candidate<G>)> = None;
            for finalist in finalists {
                let total: f64 = picks
                    .iter()
                    .map(|picked| picked.message().entropic_distance(finalist.message()))
                    .sum();
                let mean = total / picks.len() as f64;
                if best.is_none_or(|(distance, _)| mean > distance) {
                    best = Some((mean, finalist));
                }
            }

            let Some((distance, chosen)) = best else {
                break;
            };
            trace!("{} picked at mean distance {:.3}", chosen, distance);
            if let Some(position) = remaining.iter().position(|c| c.id() == chosen.id()) {
                remaining.remove(position);
            }
            picks.push(chosen);
        }
        picks
    }
}

impl<G: Genome> Selector<G> for TournamentSelector {
    fn name(&self) -> &'static str {
        if self.two_step {
            "Two-step tournament"
        } else {
            "Tournament"
        }
    }

    fn infinite_pressure<'c>(
        &self,
        pool: Vec<&'c Candidate<G>>,
        count: usize,
        reverse: bool,
        context: &SelectionContext<'_, G>,
        rng: &mut EngineRng,
    ) -> Vec<&'c Candidate<G>> {
        let use_hole = rng.chance(self.config.fitness_hole);
        let mut ordered = Self::sorted(pool, reverse, use_hole, context);
        ordered.truncate(count);
        ordered
    }

    fn custom<'c>(
        &self,
        pool: Vec<&'c Candidate<G>>,
        count: usize,
        pressure: f64,
        reverse: bool,
        context: &SelectionContext<'_, G>,
        rng: &mut EngineRng,
    ) -> Vec<&'c Candidate<G>> {
        if self.two_step && count > 1 {
            self.two_step(pool, count, pressure, reverse, context, rng)
        } else {
            self.single_step(pool, count, pressure, reverse, context, rng)
        }
    }

    fn update_endogenous_parameters(&mut self, performance: &OperatorPerformance, inertia: f64) {
        let config = &mut self.config;
        let tau = adapted_target(config.tau, config.tau_min, config.tau_max, performance);
        let meta_tau = adapted_target(
            config.meta_tau,
            config.meta_tau_min,
            config.meta_tau_max,
            performance,
        );
        config.tau = blend(config.tau, tau, inertia);
        config.meta_tau = blend(config.meta_tau, meta_tau, inertia);
        debug!(
            "Tournament adapted: tau {:.4} [{}, {}], meta tau {:.4} [{}, {}]",
            config.tau,
            config.tau_min,
            config.tau_max,
            config.meta_tau,
            config.meta_tau_min,
            config.meta_tau_max
        );
    }

    fn config(&self) -> SelectionConfig {
        if self.two_step {
            SelectionConfig::TwoStepTournament(self.config.clone())
        } else {
            SelectionConfig::Tournament(self.config.clone())
        }
    }
}

//! Linear ranking selection.

use log::debug;

use crate::engine::candidate::{Candidate, Genome};
use crate::engine::hooks::oriented;
use crate::engine::rng::EngineRng;
use crate::engine::statistics::{adapted_target, blend};
use crate::schema::{OperatorPerformance, RankingConfig, SelectionConfig};

use super::{SelectionContext, Selector};

/// Roulette over ranks: with `N` candidates sorted best first, rank `k`
/// weighs `2 − p + 2(p − 1)(N − 1 − k)/(N − 1)` for pressure `p ∈ [1, 2]`.
#[derive(Debug, Clone)]
pub struct RankingSelector {
    config: RankingConfig,
}

impl RankingSelector {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    pub fn pressure(&self) -> f64 {
        self.config.pressure
    }

    fn sorted<'c, G: Genome>(
        mut pool: Vec<&'c Candidate<G>>,
        reverse: bool,
        context: &SelectionContext<'_, G>,
    ) -> Vec<&'c Candidate<G>> {
        pool.sort_by(|a, b| oriented(context.hooks.compare_for_selection(a, b), reverse));
        pool
    }

    /// Draw one rank out of `n`.
    fn draw_rank(&self, n: usize, rng: &mut EngineRng) -> usize {
        if n <= 1 {
            return 0;
        }
        let p = self.config.pressure;
        let span = (n - 1) as f64;
        let weights: Vec<f64> = (0..n)
            .map(|k| 2.0 - p + 2.0 * (p - 1.0) * (n - 1 - k) as f64 / span)
            .collect();
        let total: f64 = weights.iter().sum();

        let choice = rng.below(total);
        let mut cumulative = 0.0;
        for (k, weight) in weights.iter().enumerate() {
            cumulative += weight;
            if choice < cumulative {
                return k;
            }
        }
        n - 1
    }
}

impl<G: Genome> Selector<G> for RankingSelector {
    fn name(&self) -> &'static str {
        "Ranking"
    }

    fn infinite_pressure<'c>(
        &self,
        pool: Vec<&'c Candidate<G>>,
        count: usize,
        reverse: bool,
        context: &SelectionContext<'_, G>,
        _rng: &mut EngineRng,
    ) -> Vec<&'c Candidate<G>> {
        let mut ordered = Self::sorted(pool, reverse, context);
        ordered.truncate(count);
        ordered
    }

    fn custom<'c>(
        &self,
        pool: Vec<&'c Candidate<G>>,
        count: usize,
        _pressure: f64,
        reverse: bool,
        context: &SelectionContext<'_, G>,
        rng: &mut EngineRng,
    ) -> Vec<&'c Candidate<G>> {
        let mut remaining = Self::sorted(pool, reverse, context);
        let mut picks = Vec::with_capacity(count);
        while picks.len() < count && !remaining.is_empty() {
            let rank = self.draw_rank(remaining.len(), rng);
            picks.push(remaining.remove(rank));
        }
        picks
    }

    fn update_endogenous_parameters(&mut self, performance: &OperatorPerformance, inertia: f64) {
        let config = &mut self.config;
        let target = adapted_target(
            config.pressure,
            config.pressure_min,
            config.pressure_max,
            performance,
        );
        config.pressure = blend(config.pressure, target, inertia);
        debug!(
            "Ranking pressure adapted to {:.4} [{}, {}]",
            config.pressure, config.pressure_min, config.pressure_max
        );
    }

    fn config(&self) -> SelectionConfig {
        SelectionConfig::Ranking(self.config.clone())
    }
}

//! Lifecycle stages: preservation, heroes, aging, slaughtering, zombies
//! and the end-of-generation commit.

use std::cmp::Ordering;

use log::{debug, trace};

use crate::engine::candidate::{Candidate, Genome, PopulationView};
use crate::engine::error::Result;
use crate::engine::fitness::compare_values;

use super::Population;

impl<G: Genome> Population<G> {
    /// Choose the candidates that must survive this generation. They become
    /// zombies instead of dying.
    pub(super) fn select_preserved(&mut self) {
        let pool: Vec<&Candidate<G>> = self.candidates.iter().filter(|c| !c.is_dead()).collect();
        let preserved = self.hooks.select_preserved(&pool);
        trace!("{}: preserving {:?}", self.name, preserved);
        self.preserved = preserved;
    }

    /// Promote the best `elite_cardinality` live candidates to heroes, demote
    /// the others, then age everybody not dead. Nothing changes on failure.
    pub(super) fn promote_heroes_and_age(&mut self) -> Result<()> {
        let hooks = self.hooks.as_ref();
        let mut order: Vec<usize> = (0..self.candidates.len())
            .filter(|&i| !self.candidates[i].is_dead())
            .collect();
        order.sort_by(|a, b| hooks.compare_heroes(&self.candidates[*a], &self.candidates[*b]));

        let view = PopulationView {
            generation: self.generation,
            maximum_age: self.config.population.maximum_age,
            preserved: &self.preserved,
        };
        let mut quota = self.config.population.elite_cardinality;
        let plan: Vec<(usize, Option<bool>)> = order
            .into_iter()
            .map(|index| {
                let hero = self.candidates[index].is_alive().then(|| {
                    let hero = quota > 0;
                    if hero {
                        quota -= 1;
                    }
                    hero
                });
                (index, hero)
            })
            .collect();

        // Only demoted candidates age.
        for &(index, hero) in &plan {
            if hero == Some(false) {
                self.candidates[index].check_aging(&view)?;
            }
        }
        for (index, hero) in plan {
            let candidate = &mut self.candidates[index];
            if let Some(hero) = hero {
                candidate.set_hero(hero);
            }
            candidate.step(true, &view)?;
        }
        Ok(())
    }

    /// Allopatric selection when enabled, then mu selection.
    pub(super) fn slaughter(&mut self) -> Result<()> {
        self.describe("Before slaughtering");
        if self.config.population.allopatric_selection {
            self.allopatric_selection()?;
        }
        self.simple_selection(self.config.population.mu)?;
        self.describe("After slaughtering");
        Ok(())
    }

    /// Kill every live candidate ranked below the first `mu` by the selection
    /// ordering. Returns the number of kills.
    pub(crate) fn simple_selection(&mut self, mu: usize) -> Result<usize> {
        let hooks = self.hooks.as_ref();
        let mut live: Vec<usize> = (0..self.candidates.len())
            .filter(|&i| self.candidates[i].is_alive())
            .collect();
        if live.len() <= mu {
            trace!("Skipping mu selection: {} live candidates", live.len());
            return Ok(0);
        }

        live.sort_by(|a, b| hooks.compare_for_selection(&self.candidates[*a], &self.candidates[*b]));
        let view = PopulationView {
            generation: self.generation,
            maximum_age: self.config.population.maximum_age,
            preserved: &self.preserved,
        };
        let doomed = &live[mu..];
        for &index in doomed {
            self.candidates[index].check_death(self.generation)?;
        }
        for &index in doomed {
            self.candidates[index].set_death(self.generation, &view)?;
        }
        debug!(
            "{}: mu selection killed {} of {}",
            self.name,
            doomed.len(),
            live.len()
        );
        Ok(doomed.len())
    }

    /// Keep only the best live candidate of each allopatric tag. Returns the
    /// number of kills.
    pub(crate) fn allopatric_selection(&mut self) -> Result<usize> {
        let hooks = self.hooks.as_ref();
        let mut live: Vec<usize> = (0..self.candidates.len())
            .filter(|&i| self.candidates[i].is_alive())
            .collect();
        if live.len() < 2 {
            trace!("Skipping allopatric selection: {} live candidates", live.len());
            return Ok(0);
        }

        live.sort_by(|a, b| {
            let (a, b) = (&self.candidates[*a], &self.candidates[*b]);
            match a.allopatric_tag().cmp(&b.allopatric_tag()) {
                Ordering::Equal => hooks.compare_for_selection(a, b),
                ordering => ordering,
            }
        });

        let view = PopulationView {
            generation: self.generation,
            maximum_age: self.config.population.maximum_age,
            preserved: &self.preserved,
        };
        let doomed: Vec<usize> = live
            .iter()
            .enumerate()
            .filter(|&(position, &index)| {
                position > 0
                    && self.candidates[live[position - 1]].allopatric_tag()
                        == self.candidates[index].allopatric_tag()
            })
            .map(|(_, &index)| index)
            .collect();
        for &index in &doomed {
            self.candidates[index].check_death(self.generation)?;
        }
        for &index in &doomed {
            self.candidates[index].set_death(self.generation, &view)?;
        }
        debug!(
            "{}: allopatric selection killed {} of {}",
            self.name,
            doomed.len(),
            live.len()
        );
        Ok(doomed.len())
    }

    /// Zombies no longer preserved die for good.
    pub(super) fn handle_zombies(&mut self) {
        for candidate in &mut self.candidates {
            if candidate.is_zombie() && !self.preserved.contains(&candidate.id()) {
                trace!("Zombie {} released", candidate);
                candidate.bury();
            }
        }
    }

    /// Drop dead candidates from the arena.
    pub(super) fn remove_corpses(&mut self) {
        let before = self.candidates.len();
        self.candidates.retain(|c| !c.is_dead());
        let removed = before - self.candidates.len();
        if removed > 0 {
            trace!("{}: removed {} corpses", self.name, removed);
        }
    }

    /// Record the best and worst candidates by raw and by scaled fitness.
    pub(super) fn commit(&mut self) {
        let hooks = self.hooks.as_ref();
        let standing = || self.candidates.iter().filter(|c| !c.is_dead());

        self.best_raw = standing()
            .min_by(|a, b| hooks.compare_raw_best_worst(a, b))
            .map(Candidate::id);
        self.worst_raw = standing()
            .max_by(|a, b| hooks.compare_raw_best_worst(a, b))
            .map(Candidate::id);
        self.best_scaled = standing()
            .min_by(|a, b| hooks.compare_scaled_best_worst(a, b))
            .map(Candidate::id);
        self.worst_scaled = standing()
            .max_by(|a, b| hooks.compare_scaled_best_worst(a, b))
            .map(Candidate::id);

        if let Some(best) = self.best_raw() {
            debug!(
                "{}: best raw {} {:?}, entropy {:.4}",
                self.name,
                best,
                best.raw_fitness().map(|f| &f.values),
                self.entropy
            );
        }
    }

    /// Count generations without improvement of the best raw fitness.
    pub(super) fn update_steady_state(&mut self) {
        let best = self
            .best_raw()
            .and_then(|c| c.raw_fitness())
            .map(|f| f.values.clone());
        let Some(best) = best else {
            return;
        };
        let improved = self
            .previous_best
            .as_ref()
            .is_none_or(|previous| compare_values(&best, previous) == Ordering::Greater);
        if improved {
            self.previous_best = Some(best);
            self.steady_state_generations = 0;
        } else {
            self.steady_state_generations += 1;
        }
    }
}

//! Diversity measures: delta entropy and fitness sharing.

use log::{debug, trace};

use crate::engine::candidate::Genome;
use crate::engine::distance;
use crate::engine::entropy::Message;
use crate::engine::error::Result;
use crate::engine::fitness::ScalingCause;

use super::Population;

impl<G: Genome> Population<G> {
    /// Recompute the global entropy of the live candidates and how much
    /// entropy each one contributes to it.
    pub(super) fn update_delta_entropy(&mut self) -> Result<()> {
        let live: Vec<usize> = (0..self.candidates.len())
            .filter(|&i| self.candidates[i].is_alive())
            .collect();

        let mut total = Message::new();
        for &index in &live {
            total += self.candidates[index].message();
        }
        let total_entropy = total.entropy();

        for &index in &live {
            let message = self.candidates[index].message().clone();
            total.subtract(&message)?;
            let delta = total_entropy - total.entropy();
            total += &message;
            self.candidates[index].set_delta_entropy(delta);
        }

        self.entropy = total_entropy;
        trace!("{}: entropy {:.4}", self.name, total_entropy);
        Ok(())
    }

    /// Classical fitness sharing among live candidates with positive fitness.
    ///
    /// Each neighbor closer than the radius adds `1 − d/r` to `m`; when
    /// `m > 1` the candidate's fitness is divided by `m`. Clones of a
    /// candidate are not its neighbors. Factors are computed from the state
    /// before the stage, so the result does not depend on iteration order.
    pub(super) fn share_fitness(&mut self) {
        let Some(sharing) = self.config.population.fitness_sharing.clone() else {
            return;
        };

        for candidate in self.candidates.iter_mut().filter(|c| !c.is_dead()) {
            candidate.fitness_mut().reset(ScalingCause::Sharing);
            candidate.fitness_mut().set_note(ScalingCause::Sharing, "");
        }

        let members: Vec<usize> = (0..self.candidates.len())
            .filter(|&i| {
                let candidate = &self.candidates[i];
                candidate.is_alive() && candidate.fitness().primary() > 0.0
            })
            .collect();

        let mut shared = Vec::new();
        for &i in &members {
            let current = &self.candidates[i];
            let mut m = 0.0;
            let mut neighbours = 0;
            for &j in &members {
                let other = &self.candidates[j];
                if i == j || other.is_genotype_equal(current) {
                    continue;
                }
                let apport = 1.0 - distance::between(sharing.distance, current, other) / sharing.radius;
                if apport > 0.0 {
                    m += apport;
                    neighbours += 1;
                }
            }
            if m > 1.0 {
                shared.push((i, m, neighbours));
            }
        }

        for &(index, m, neighbours) in &shared {
            let fitness = self.candidates[index].fitness_mut();
            fitness.set_factor(ScalingCause::Sharing, 1.0 / m);
            fitness.set_note(
                ScalingCause::Sharing,
                format!("[{:.4} sharing, {} neighbours]", 1.0 / m, neighbours),
            );
        }
        debug!(
            "{}: fitness shared by {} of {} candidates",
            self.name,
            shared.len(),
            members.len()
        );
    }

    /// Entropy and sharing reflecting the surviving candidates.
    pub(super) fn prepare_for_commit(&mut self) -> Result<()> {
        self.update_delta_entropy()?;
        self.share_fitness();
        Ok(())
    }
}

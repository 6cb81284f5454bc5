//! Strategy hooks of a population: candidate orderings, clone penalty and
//! the choice of candidates to preserve.
//!
//! Every comparator returns [`Ordering::Less`] when `a` ranks before `b`, so
//! sorting with it puts the preferred candidate first. They must stay strict
//! total orders: the default ones fall back to the older candidate, then to
//! the smaller id.

use std::cmp::Ordering;

use crate::schema::CandidateId;

use super::candidate::{Candidate, Genome};
use super::fitness::{ScalingCause, compare_values};

/// Resolve a tie by birth generation (older first), then by id.
pub fn tie_break<G>(result: Ordering, a: &Candidate<G>, b: &Candidate<G>) -> Ordering
where
    G: Genome,
{
    result
        .then_with(|| a.birth().cmp(&b.birth()))
        .then_with(|| a.id().cmp(&b.id()))
}

/// Higher raw fitness first; candidates without fitness last.
fn raw_order<G: Genome>(a: &Candidate<G>, b: &Candidate<G>) -> Ordering {
    match (a.raw_fitness(), b.raw_fitness()) {
        (Some(x), Some(y)) => compare_values(&y.values, &x.values),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Higher scaled fitness first.
fn scaled_order<G: Genome>(a: &Candidate<G>, b: &Candidate<G>) -> Ordering {
    b.fitness().compare(a.fitness())
}

/// Reverse an ordering when selecting the worst instead of the best.
pub fn oriented(ordering: Ordering, reverse: bool) -> Ordering {
    if reverse { ordering.reverse() } else { ordering }
}

/// Overridable behavior of a population.
pub trait PopulationHooks<G: Genome> {
    /// Ordering used by selectors and slaughtering.
    fn compare_for_selection(&self, a: &Candidate<G>, b: &Candidate<G>) -> Ordering {
        tie_break(scaled_order(a, b), a, b)
    }

    /// Ordering used to pick heroes.
    fn compare_heroes(&self, a: &Candidate<G>, b: &Candidate<G>) -> Ordering {
        tie_break(scaled_order(a, b), a, b)
    }

    /// Ordering inside a clone group; the first one becomes the master.
    /// Live before zombie, then younger before older.
    fn compare_clones(&self, a: &Candidate<G>, b: &Candidate<G>) -> Ordering {
        a.is_zombie()
            .cmp(&b.is_zombie())
            .then_with(|| b.birth().cmp(&a.birth()))
            .then_with(|| a.id().cmp(&b.id()))
    }

    /// Secondary ordering used by the tournament fitness hole: larger
    /// contribution to diversity first.
    fn compare_for_fitness_hole(&self, a: &Candidate<G>, b: &Candidate<G>) -> Ordering {
        tie_break(b.delta_entropy().total_cmp(&a.delta_entropy()), a, b)
    }

    fn compare_raw_best_worst(&self, a: &Candidate<G>, b: &Candidate<G>) -> Ordering {
        tie_break(raw_order(a, b), a, b)
    }

    fn compare_scaled_best_worst(&self, a: &Candidate<G>, b: &Candidate<G>) -> Ordering {
        tie_break(scaled_order(a, b), a, b)
    }

    /// Whether `a` did better than `b` when grading operator outcomes.
    /// Not a total order: candidates with equal fitness and delta entropy are `Equal`.
    fn compare_operator_performance(&self, a: &Candidate<G>, b: &Candidate<G>) -> Ordering {
        scaled_order(a, b).then_with(|| b.delta_entropy().total_cmp(&a.delta_entropy()))
    }

    /// Apply the clone penalty to `member`, ranked `rank` in a group of
    /// `group_size` genotype-equal candidates led by `master` (rank 0).
    fn handle_clone(
        &self,
        master: CandidateId,
        member: &mut Candidate<G>,
        rank: usize,
        group_size: usize,
        scaling_factor: f64,
    ) {
        let fitness = member.fitness_mut();
        if rank == 0 {
            fitness.set_factor(ScalingCause::Clone, 1.0);
            let note = if group_size > 1 {
                format!("[master of {group_size} clones]")
            } else {
                String::new()
            };
            fitness.set_note(ScalingCause::Clone, note);
        } else {
            let exponent = i32::try_from(rank).unwrap_or(i32::MAX);
            fitness.set_factor(ScalingCause::Clone, scaling_factor.powi(exponent));
            fitness.set_note(ScalingCause::Clone, format!("[clone #{rank} of {master}]"));
        }
    }

    /// Candidates that must not die this generation. `candidates` holds every
    /// not-dead candidate sorted by id. Defaults to the single best by raw fitness.
    fn select_preserved(&self, candidates: &[&Candidate<G>]) -> Vec<CandidateId> {
        candidates
            .iter()
            .min_by(|a, b| self.compare_raw_best_worst(a, b))
            .map(|best| vec![best.id()])
            .unwrap_or_default()
    }
}

/// Single-objective defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarHooks;

impl<G: Genome> PopulationHooks<G> for ScalarHooks {}

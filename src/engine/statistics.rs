//! Grading of newborn candidates, feeding self-adaptation.

use std::cmp::Ordering;

use crate::schema::OperatorPerformance;

use super::candidate::{Candidate, Genome};
use super::hooks::PopulationHooks;

/// Outcome class of one newborn candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Performance {
    VeryGood,
    Good,
    Normal,
    Bad,
    VeryBad,
}

/// Grade `child` against the previous best and worst candidates and its live parents.
///
/// Without live parents a child that is neither very good nor very bad is `Normal`.
pub fn classify<G: Genome>(
    hooks: &dyn PopulationHooks<G>,
    child: &Candidate<G>,
    best: Option<&Candidate<G>>,
    worst: Option<&Candidate<G>>,
    parents: &[&Candidate<G>],
) -> Performance {
    let better = |a: &Candidate<G>, b: &Candidate<G>| {
        hooks.compare_operator_performance(a, b) == Ordering::Less
    };

    if let Some(best) = best
        && better(child, best)
    {
        return Performance::VeryGood;
    }
    if let Some(worst) = worst
        && !better(child, worst)
    {
        return Performance::VeryBad;
    }
    if parents.is_empty() {
        return Performance::Normal;
    }

    let beaten = parents.iter().filter(|parent| better(child, **parent)).count();
    if beaten == parents.len() {
        Performance::Good
    } else if beaten == 0 {
        Performance::Bad
    } else {
        Performance::Normal
    }
}

impl OperatorPerformance {
    pub fn record(&mut self, performance: Performance) {
        match performance {
            Performance::VeryGood => self.very_good += 1,
            Performance::Good => self.good += 1,
            Performance::Normal => self.normal += 1,
            Performance::Bad => self.bad += 1,
            Performance::VeryBad => self.very_bad += 1,
        }
    }

    /// Bad and very bad outcomes together.
    pub fn failures(&self) -> usize {
        self.bad + self.very_bad
    }
}

/// `inertia·old + (1 − inertia)·target`.
pub fn blend(old: f64, target: f64, inertia: f64) -> f64 {
    inertia * old + (1.0 - inertia) * target
}

/// Target for a parameter bounded by `[min, max]`: the maximum after a very
/// good outcome, halfway back to the minimum after a good one, the minimum
/// after failures only, otherwise unchanged.
pub fn adapted_target(current: f64, min: f64, max: f64, performance: &OperatorPerformance) -> f64 {
    if performance.very_good > 0 {
        max
    } else if performance.good > 0 {
        min + (current - min) / 2.0
    } else if performance.failures() > 0 {
        min
    } else {
        current
    }
}

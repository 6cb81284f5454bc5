//! Raw and scaled fitness values.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Fitness vector exactly as returned by the evaluator. Higher is better.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fitness {
    pub values: Vec<f64>,
    #[serde(default)]
    pub description: String,
}

impl Fitness {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// First component, the one used by sharing and averages.
    pub fn primary(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    /// Lexicographic comparison over the shared components.
    pub fn compare(&self, other: &Self) -> Ordering {
        compare_values(&self.values, &other.values)
    }

    /// True if the values are lexicographically at least `target`.
    pub fn reaches(&self, target: &[f64]) -> bool {
        compare_values(&self.values, target) != Ordering::Less
    }
}

/// Lexicographic comparison over the shared components with a total order on floats.
pub fn compare_values(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Why a scaled fitness differs from the raw one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingCause {
    /// Penalty applied to clones of a master.
    Clone,
    /// Fitness sharing with close neighbors.
    Sharing,
    /// Contribution of an individual to its groups.
    Contribution,
}

impl ScalingCause {
    pub const ALL: [Self; 3] = [Self::Clone, Self::Sharing, Self::Contribution];

    fn index(self) -> usize {
        match self {
            Self::Clone => 0,
            Self::Sharing => 1,
            Self::Contribution => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Scaling {
    /// Component-wise factors; the last one repeats for longer fitness vectors.
    factors: Vec<f64>,
    note: String,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            factors: vec![1.0],
            note: String::new(),
        }
    }
}

impl Scaling {
    fn factor(&self, component: usize) -> f64 {
        self.factors
            .get(component)
            .or_else(|| self.factors.last())
            .copied()
            .unwrap_or(1.0)
    }
}

/// Raw fitness multiplied by independent per-cause factors.
///
/// Scaled values are always recomputed as `raw × ∏factors` whenever the raw
/// values or a factor change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScaledFitness {
    raw: Option<Fitness>,
    scalings: [Scaling; 3],
    values: Vec<f64>,
}

impl ScaledFitness {
    /// Replace the raw baseline and reapply the current factors.
    pub fn set_raw(&mut self, raw: &Fitness) {
        self.raw = Some(raw.clone());
        self.rescale();
    }

    /// Drop raw and scaled values. Factors are kept.
    pub fn invalidate(&mut self) {
        self.raw = None;
        self.values.clear();
    }

    pub fn is_valid(&self) -> bool {
        self.raw.is_some()
    }

    /// Unscaled baseline.
    pub fn raw(&self) -> Option<&Fitness> {
        self.raw.as_ref()
    }

    /// Set the same factor on every component.
    pub fn set_factor(&mut self, cause: ScalingCause, factor: f64) {
        self.set_factors(cause, vec![factor]);
    }

    /// Set component-wise factors for one cause.
    pub fn set_factors(&mut self, cause: ScalingCause, factors: Vec<f64>) {
        let scaling = &mut self.scalings[cause.index()];
        scaling.factors = if factors.is_empty() { vec![1.0] } else { factors };
        self.rescale();
    }

    pub fn set_note(&mut self, cause: ScalingCause, note: impl Into<String>) {
        self.scalings[cause.index()].note = note.into();
    }

    /// Factor currently applied to `component` for `cause`.
    pub fn factor(&self, cause: ScalingCause, component: usize) -> f64 {
        self.scalings[cause.index()].factor(component)
    }

    /// Reset one cause to the neutral factor.
    pub fn reset(&mut self, cause: ScalingCause) {
        self.scalings[cause.index()] = Scaling::default();
        self.rescale();
    }

    /// Scaled values; empty while invalid.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn primary(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.0)
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        compare_values(&self.values, &other.values)
    }

    /// Raw description followed by every non-empty scaling note.
    pub fn description(&self) -> String {
        let mut text = self
            .raw
            .as_ref()
            .map(|raw| raw.description.clone())
            .unwrap_or_default();
        for scaling in &self.scalings {
            if !scaling.note.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&scaling.note);
            }
        }
        text
    }

    fn rescale(&mut self) {
        let Some(raw) = &self.raw else {
            self.values.clear();
            return;
        };
        self.values = raw
            .values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                self.scalings
                    .iter()
                    .fold(*value, |scaled, scaling| scaled * scaling.factor(i))
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_compare() {
        let a = Fitness::new(vec![1.0, 5.0]);
        let b = Fitness::new(vec![1.0, 3.0]);
        let c = Fitness::new(vec![2.0, 0.0]);
        assert_eq!(a.compare(&b), Ordering::Greater);
        assert_eq!(b.compare(&c), Ordering::Less);
        assert_eq!(a.compare(&a), Ordering::Equal);
        assert!(a.reaches(&[1.0, 5.0]));
        assert!(!b.reaches(&[1.0, 5.0]));
        // A later component below the target does not matter once an earlier one exceeds it.
        assert!(c.reaches(&[1.0, 5.0]));
    }

    #[test]
    fn test_scaled_is_raw_times_factors() {
        let mut scaled = ScaledFitness::default();
        scaled.set_raw(&Fitness::new(vec![10.0, 4.0]));
        assert_eq!(scaled.values(), &[10.0, 4.0]);

        scaled.set_factor(ScalingCause::Clone, 0.5);
        scaled.set_factors(ScalingCause::Sharing, vec![0.5, 1.0]);
        assert_eq!(scaled.values(), &[2.5, 2.0]);

        // New raw values keep the factors.
        scaled.set_raw(&Fitness::new(vec![4.0, 8.0]));
        assert_eq!(scaled.values(), &[1.0, 4.0]);

        scaled.reset(ScalingCause::Clone);
        assert_eq!(scaled.values(), &[2.0, 8.0]);
    }

    #[test]
    fn test_invalidate() {
        let mut scaled = ScaledFitness::default();
        scaled.set_raw(&Fitness::new(vec![1.0]));
        assert!(scaled.is_valid());
        scaled.invalidate();
        assert!(!scaled.is_valid());
        assert!(scaled.values().is_empty());
    }

    #[test]
    fn test_description_notes() {
        let mut scaled = ScaledFitness::default();
        scaled.set_raw(&Fitness::new(vec![1.0]).with_description("ok"));
        scaled.set_note(ScalingCause::Clone, "[master of 3 clones]");
        assert_eq!(scaled.description(), "ok [master of 3 clones]");
    }
}

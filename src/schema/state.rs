//! Identity, lifecycle, reporting and checkpoint types.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::SelectionConfig;

/// Engine version written into checkpoints.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Writes `value` in bijective base 32: `A`..`7`, then `AA`, `AB`, ...
///
/// Strings of equal length sort like the numbers they encode and longer
/// strings always encode larger numbers.
fn write_base32(f: &mut fmt::Formatter<'_>, value: u64) -> fmt::Result {
    let mut digits = Vec::new();
    let mut n = value as u128 + 1;
    while n > 0 {
        n -= 1;
        digits.push(BASE32_ALPHABET[(n % 32) as usize]);
        n /= 32;
    }
    digits.reverse();
    // Alphabet is ASCII.
    f.write_str(std::str::from_utf8(&digits).map_err(|_| fmt::Error)?)
}

/// Globally unique, monotonically issued candidate identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub u64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_base32(f, self.0)
    }
}

/// Niche identifier shared by a candidate and its direct offspring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AllopatricTag(pub u64);

impl fmt::Display for AllopatricTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("~")?;
        write_base32(f, self.0)
    }
}

/// Next values an id generator will issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounters {
    pub next_candidate: u64,
    pub next_tag: u64,
}

/// Lifecycle state of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CandidateState {
    #[default]
    Alive,
    /// Elite candidate, protected from aging.
    Hero,
    /// Slated for death but kept because it is on the preserve list.
    Zombie,
    Dead,
}

impl CandidateState {
    /// Alive or Hero.
    #[inline]
    pub fn is_alive(self) -> bool {
        matches!(self, Self::Alive | Self::Hero)
    }

    #[inline]
    pub fn is_dead(self) -> bool {
        self == Self::Dead
    }
}

/// Either a single genome or a group of genomes evolved as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CandidateKind<G> {
    Individual(G),
    Group(Vec<G>),
}

/// Random stream state: algorithm tag plus opaque serialized state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub algorithm: String,
    pub state: String,
}

/// Reason a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Reached maximum generations.
    MaxGenerations,
    /// Evaluation budget exhausted.
    MaxEvaluations,
    /// Wall-clock budget exhausted.
    TimeBudget,
    /// Fitness function requested a stop.
    ExternalStop,
    /// Best raw fitness reached the target.
    TargetReached,
    /// Best raw fitness did not improve for too long.
    SteadyState,
    /// No candidate survived a generation.
    Extinction,
}

/// Number of candidates in each lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationCensus {
    pub alive: usize,
    pub heroes: usize,
    pub zombies: usize,
    pub dead: usize,
}

/// Tallies of how newborn candidates compared with their context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorPerformance {
    /// Better than the best candidate of the previous generation.
    pub very_good: usize,
    /// Better than all of its live parents.
    pub good: usize,
    pub normal: usize,
    /// Better than none of its live parents.
    pub bad: usize,
    /// Not better than the worst candidate of the previous generation.
    pub very_bad: usize,
}

impl OperatorPerformance {
    pub fn total(&self) -> usize {
        self.very_good + self.good + self.normal + self.bad + self.very_bad
    }
}

/// Evaluator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorStats {
    /// Fitness function invocations.
    pub evaluations: u64,
    /// Requests resolved by an entry created in the same generation.
    pub duplicates: u64,
    /// Requests resolved by an entry from an earlier generation.
    pub cache_hits: u64,
    /// Wall time spent inside flushes.
    pub elapsed_secs: f64,
}

/// Per-generation summary for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub generation: u32,
    pub census: PopulationCensus,
    /// Best raw fitness of the committed population.
    pub best_raw: Option<Vec<f64>>,
    pub best_id: Option<CandidateId>,
    pub average_raw: Option<f64>,
    pub average_age: f64,
    pub entropy: f64,
    pub sigma: f64,
    pub steady_state_generations: u32,
    pub evaluator: EvaluatorStats,
    pub operators: OperatorPerformance,
}

/// Final result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub generations: u32,
    pub stop_reason: StopReason,
    pub best_id: Option<CandidateId>,
    pub best_raw: Option<Vec<f64>>,
    pub evaluator: EvaluatorStats,
    pub elapsed_secs: f64,
}

/// Persisted state of one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSnapshot<G> {
    pub id: CandidateId,
    pub allopatric_tag: AllopatricTag,
    pub kind: CandidateKind<G>,
    pub state: CandidateState,
    pub birth: u32,
    pub death: Option<u32>,
    pub age: u32,
    pub raw_fitness: Option<Vec<f64>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parents: Vec<CandidateId>,
}

/// Persisted state of a whole population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationSnapshot<G> {
    pub version: String,
    pub name: String,
    pub generation: u32,
    pub steady_state_generations: u32,
    pub previous_best: Option<Vec<f64>>,
    pub sigma: f64,
    /// Selector parameters after self-adaptation.
    pub selection: SelectionConfig,
    pub elapsed_secs: f64,
    pub evaluations: u64,
    pub ids: IdCounters,
    pub rng: RngState,
    pub candidates: Vec<CandidateSnapshot<G>>,
}

//! Configuration types for the generational population engine.

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Population sizing and lifecycle parameters.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Parent selection strategy.
    #[serde(default)]
    pub selection: SelectionConfig,
    /// Evaluator cache and concurrency settings.
    #[serde(default)]
    pub evaluation: EvaluatorConfig,
    /// Stop conditions checked at generation boundaries.
    #[serde(default)]
    pub stop: StopConfig,
    /// Extra consistency checks.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Population sizing and lifecycle parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of live candidates kept after slaughtering.
    #[serde(default = "default_mu")]
    pub mu: usize,
    /// Number of random candidates created at setup.
    #[serde(default = "default_nu")]
    pub nu: usize,
    /// Number of successful breeding calls per generation.
    #[serde(default = "default_lambda")]
    pub lambda: usize,
    /// Number of heroes promoted each generation.
    #[serde(default)]
    pub elite_cardinality: usize,
    /// Maximum age before a candidate dies. 0 means unlimited.
    #[serde(default)]
    pub maximum_age: u32,
    /// Blend factor between old and new self-adapted parameters (0.0-1.0).
    #[serde(default = "default_inertia")]
    pub inertia: f64,
    /// Initial mutation strength handed to the breeder (0.0-1.0).
    #[serde(default = "default_sigma")]
    pub sigma: f64,
    /// Base of the geometric penalty applied to clones (0.0-1.0).
    #[serde(default = "default_clone_scaling_factor")]
    pub clone_scaling_factor: f64,
    /// Keep only the best candidate of each allopatric niche before mu-selection.
    #[serde(default)]
    pub allopatric_selection: bool,
    /// Fitness sharing. Disabled when absent.
    #[serde(default)]
    pub fitness_sharing: Option<SharingConfig>,
    /// Throw away every raw fitness after each generation.
    #[serde(default)]
    pub invalidate_fitness_after_generation: bool,
    /// Number of components in every fitness vector.
    #[serde(default = "default_fitness_components")]
    pub fitness_components: usize,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            mu: default_mu(),
            nu: default_nu(),
            lambda: default_lambda(),
            elite_cardinality: 0,
            maximum_age: 0,
            inertia: default_inertia(),
            sigma: default_sigma(),
            clone_scaling_factor: default_clone_scaling_factor(),
            allopatric_selection: false,
            fitness_sharing: None,
            invalidate_fitness_after_generation: false,
            fitness_components: default_fitness_components(),
        }
    }
}

fn default_mu() -> usize {
    30
}
fn default_nu() -> usize {
    30
}
fn default_lambda() -> usize {
    20
}
fn default_inertia() -> f64 {
    0.9
}
fn default_sigma() -> f64 {
    0.9
}
fn default_clone_scaling_factor() -> f64 {
    0.9
}
fn default_fitness_components() -> usize {
    1
}

/// Fitness sharing (crowding) parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Neighborhood radius; candidates closer than this share fitness.
    pub radius: f64,
    /// Distance used to measure closeness.
    #[serde(default)]
    pub distance: DistanceKind,
}

/// Distance between two candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceKind {
    /// Symmetric difference of the entropy symbol sets.
    #[default]
    Entropic,
    /// Differing phenotype characters plus the length difference.
    Hamming,
    /// Edit distance between phenotypes.
    Levenshtein,
}

/// Parent selection strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum SelectionConfig {
    /// Linear ranking roulette.
    Ranking(RankingConfig),
    /// Tournament with optional fitness hole.
    Tournament(TournamentConfig),
    /// Tournament whose later picks favor distance from earlier ones.
    TwoStepTournament(TournamentConfig),
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self::Tournament(TournamentConfig::default())
    }
}

/// Ranking selection parameters. All values live in [1, 2].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_ranking_pressure")]
    pub pressure: f64,
    #[serde(default = "default_ranking_pressure_min")]
    pub pressure_min: f64,
    #[serde(default = "default_ranking_pressure_max")]
    pub pressure_max: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            pressure: default_ranking_pressure(),
            pressure_min: default_ranking_pressure_min(),
            pressure_max: default_ranking_pressure_max(),
        }
    }
}

fn default_ranking_pressure() -> f64 {
    1.5
}
fn default_ranking_pressure_min() -> f64 {
    1.0
}
fn default_ranking_pressure_max() -> f64 {
    2.0
}

/// Tournament selection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentConfig {
    /// Tournament size (>= 1).
    #[serde(default = "default_tau")]
    pub tau: f64,
    #[serde(default = "default_tau_min")]
    pub tau_min: f64,
    #[serde(default = "default_tau_max")]
    pub tau_max: f64,
    /// Tournament size as a fraction of the population (0.0-1.0). 0 disables it.
    #[serde(default)]
    pub meta_tau: f64,
    #[serde(default)]
    pub meta_tau_min: f64,
    #[serde(default)]
    pub meta_tau_max: f64,
    /// Probability of ranking a tournament by delta entropy instead of fitness.
    #[serde(default)]
    pub fitness_hole: f64,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            tau: default_tau(),
            tau_min: default_tau_min(),
            tau_max: default_tau_max(),
            meta_tau: 0.0,
            meta_tau_min: 0.0,
            meta_tau_max: 0.0,
            fitness_hole: 0.0,
        }
    }
}

fn default_tau() -> f64 {
    2.0
}
fn default_tau_min() -> f64 {
    1.0
}
fn default_tau_max() -> f64 {
    4.0
}

/// Evaluator cache and concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Maximum number of cached phenotypes. 0 disables caching across generations.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    /// Maximum number of evaluations in flight at once.
    #[serde(default = "default_concurrent_evaluations")]
    pub concurrent_evaluations: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            cache_size: default_cache_size(),
            concurrent_evaluations: default_concurrent_evaluations(),
        }
    }
}

fn default_cache_size() -> usize {
    1000
}
fn default_concurrent_evaluations() -> usize {
    1
}

/// Stop conditions. Any satisfied condition ends the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopConfig {
    #[serde(default)]
    pub max_generations: Option<u32>,
    #[serde(default)]
    pub max_evaluations: Option<u64>,
    /// Wall-clock budget in seconds, cumulative across resumes.
    #[serde(default)]
    pub max_time_secs: Option<f64>,
    /// Stop once the best raw fitness reaches this vector.
    #[serde(default)]
    pub target_fitness: Option<Vec<f64>>,
    /// Stop after this many generations without improvement of the best raw fitness.
    #[serde(default)]
    pub max_steady_state_generations: Option<u32>,
}

/// Extra consistency checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Cross-check genotype, phenotype and hash of every pair of candidates
    /// after each evaluation. Quadratic in the population size.
    #[serde(default)]
    pub full_consistency_check: bool,
}

impl EngineConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.population.validate()?;
        self.selection.validate()?;

        if self.evaluation.concurrent_evaluations == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        if let Some(target) = &self.stop.target_fitness
            && target.len() != self.population.fitness_components
        {
            return Err(ConfigError::TargetLength {
                expected: self.population.fitness_components,
                actual: target.len(),
            });
        }

        if let Some(secs) = self.stop.max_time_secs
            && !(secs > 0.0)
        {
            return Err(ConfigError::OutOfRange {
                name: "max_time_secs",
                value: secs,
                min: 0.0,
                max: f64::INFINITY,
            });
        }

        Ok(())
    }
}

impl PopulationConfig {
    /// Validate population parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mu == 0 {
            return Err(ConfigError::Zero("mu"));
        }
        if self.nu == 0 {
            return Err(ConfigError::Zero("nu"));
        }
        if self.lambda == 0 {
            return Err(ConfigError::Zero("lambda"));
        }
        if self.fitness_components == 0 {
            return Err(ConfigError::Zero("fitness_components"));
        }

        check_range("inertia", self.inertia, 0.0, 1.0)?;
        check_range("sigma", self.sigma, 0.0, 1.0)?;
        check_range("clone_scaling_factor", self.clone_scaling_factor, 0.0, 1.0)?;

        if let Some(sharing) = &self.fitness_sharing
            && !(sharing.radius > 0.0)
        {
            return Err(ConfigError::SharingRadius(sharing.radius));
        }

        Ok(())
    }
}

impl SelectionConfig {
    /// Validate selection parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Ranking(ranking) => ranking.validate(),
            Self::Tournament(tournament) | Self::TwoStepTournament(tournament) => {
                tournament.validate()
            }
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("pressure_min", self.pressure_min, 1.0, 2.0)?;
        check_range("pressure_max", self.pressure_max, self.pressure_min, 2.0)?;
        check_range("pressure", self.pressure, self.pressure_min, self.pressure_max)
    }
}

impl TournamentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("tau_min", self.tau_min, 1.0, f64::INFINITY)?;
        check_range("tau_max", self.tau_max, self.tau_min, f64::INFINITY)?;
        check_range("tau", self.tau, self.tau_min, self.tau_max)?;
        check_range("meta_tau_min", self.meta_tau_min, 0.0, 1.0)?;
        check_range("meta_tau_max", self.meta_tau_max, self.meta_tau_min, 1.0)?;
        check_range("meta_tau", self.meta_tau, self.meta_tau_min, self.meta_tau_max)?;
        check_range("fitness_hole", self.fitness_hole, 0.0, 1.0)
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be non-zero")]
    Zero(&'static str),
    #[error("{name} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Sharing radius must be positive, got {0}")]
    SharingRadius(f64),
    #[error("Concurrent evaluations must be at least 1")]
    ZeroConcurrency,
    #[error("Target fitness has {actual} components, expected {expected}")]
    TargetLength { expected: usize, actual: usize },
}

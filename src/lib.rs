//! evogen - Deterministic generational population engine for evolutionary computation.
//!
//! A [`Population`] owns every candidate of a run and advances them through
//! a fixed generation pipeline: offspring, evaluation, clone handling,
//! diversity measures, hero promotion and aging, slaughtering, commit and
//! self-adaptation. Given the same seed, configuration and fitness function
//! a run is fully reproducible, and it can be checkpointed and resumed.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, identity, reporting and checkpoint types
//! - `engine`: Candidates, fitness, evaluator, selection and the population
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use evogen::{
//!     engine::{BitFlipBreeder, BitString, OneMax, Population},
//!     schema::{CandidateKind, EngineConfig},
//! };
//!
//! let mut config = EngineConfig::default();
//! config.random_seed = Some(7);
//! config.stop.max_generations = Some(100);
//! config.stop.target_fitness = Some(vec![64.0]);
//!
//! let mut population = Population::new("one-max", config, Arc::new(OneMax))?
//!     .with_breeder(BitFlipBreeder::default());
//! population.setup(|rng| CandidateKind::Individual(BitString::random(64, rng)))?;
//!
//! let summary = population.run(|report| {
//!     println!("generation {}: best {:?}", report.generation, report.best_raw);
//! })?;
//! println!("stopped by {:?}", summary.stop_reason);
//! # Ok::<(), evogen::engine::EngineError>(())
//! ```

pub mod engine;
pub mod schema;

// Re-export commonly used types
pub use engine::{Breeder, EngineError, FitnessFunction, Genome, Population, PopulationHooks};
pub use schema::{EngineConfig, GenerationReport, RunSummary, StopReason};

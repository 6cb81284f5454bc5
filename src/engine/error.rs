//! Engine error types.

use crate::schema::{CandidateId, ConfigError, IdCounters};

/// Failure reported by a fitness function.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Evaluation of {phenotype:?} failed: {message}")]
pub struct EvaluationError {
    pub phenotype: String,
    pub message: String,
}

impl EvaluationError {
    pub fn new(phenotype: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            phenotype: phenotype.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the engine. Any of them aborts the current operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(
        "Candidate {id} cannot die at generation {death}: born at {birth} with age {age}"
    )]
    TemporalInconsistency {
        id: CandidateId,
        death: u32,
        birth: u32,
        age: u32,
    },
    #[error("Candidate {0} is already dead")]
    AlreadyDead(CandidateId),
    #[error("Id counters cannot move back from {current:?} to {requested:?}")]
    CounterRewind {
        current: IdCounters,
        requested: IdCounters,
    },
    #[error("Fitness has {actual} components, expected {expected}")]
    InvalidFitness { expected: usize, actual: usize },
    #[error("Symbol {0:#x} is not part of the message")]
    MissingSymbol(u64),
    #[error("Candidate {0} has no valid fitness")]
    MissingFitness(CandidateId),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Checkpoint serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Thread pool could not be built: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

//! Checkpoints written to disk resume into an identical run.

use std::sync::Arc;

use tempfile::tempdir;

use evogen::{
    engine::{BitFlipBreeder, BitString, OneMax, Population},
    schema::{CandidateKind, EngineConfig, PopulationConfig, SelectionConfig, TournamentConfig},
};

fn config() -> EngineConfig {
    EngineConfig {
        population: PopulationConfig {
            mu: 8,
            nu: 12,
            lambda: 6,
            elite_cardinality: 1,
            ..Default::default()
        },
        selection: SelectionConfig::Tournament(TournamentConfig {
            fitness_hole: 0.1,
            ..Default::default()
        }),
        random_seed: Some(2024),
        ..Default::default()
    }
}

fn population() -> Population<BitString> {
    Population::new("resume", config(), Arc::new(OneMax))
        .unwrap()
        .with_breeder(BitFlipBreeder::default())
}

fn genomes(population: &Population<BitString>) -> Vec<(String, String)> {
    population
        .candidates()
        .iter()
        .map(|c| (c.to_string(), c.normalized_phenotype().to_string()))
        .collect()
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("checkpoint.json");

    let mut original = population();
    original
        .setup(|rng| CandidateKind::Individual(BitString::random(24, rng)))
        .unwrap();
    for _ in 0..4 {
        original.step().unwrap();
    }
    original.save(&path).unwrap();
    assert!(path.exists());

    let mut restored = population();
    restored.load(&path).unwrap();
    assert_eq!(restored.generation(), original.generation());
    assert_eq!(genomes(&restored), genomes(&original));
    assert_eq!(
        restored.evaluator_stats().evaluations,
        original.evaluator_stats().evaluations
    );

    for _ in 0..5 {
        original.step().unwrap();
        restored.step().unwrap();
    }
    assert_eq!(genomes(&restored), genomes(&original));
    assert_eq!(restored.steady_state_generations(), original.steady_state_generations());
}

#[test]
fn test_load_missing_file_fails() {
    let dir = tempdir().unwrap();
    let mut restored = population();
    assert!(restored.load(dir.path().join("absent.json")).is_err());
}

#[test]
fn test_load_garbage_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.json");
    std::fs::write(&path, "{ not json").unwrap();
    let mut restored = population();
    assert!(restored.load(&path).is_err());
}

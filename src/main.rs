//! evogen CLI - Evolve OneMax bit strings from a JSON engine configuration.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use evogen::{
    engine::{BitFlipBreeder, BitString, OneMax, Population},
    schema::{CandidateKind, EngineConfig, SelectionConfig, TournamentConfig},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [length] [checkpoint.json]", args[0]);
        eprintln!();
        eprintln!("Evolve bit strings toward all ones.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json      Path to engine configuration file");
        eprintln!("  length           Number of bits per candidate (default: 64)");
        eprintln!("  checkpoint.json  Resumed from if present, written at the end");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let length: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(64);
    let checkpoint = args.get(3).map(PathBuf::from);

    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: EngineConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    println!("evogen OneMax");
    println!("=============");
    println!(
        "mu={} nu={} lambda={} bits={}",
        config.population.mu, config.population.nu, config.population.lambda, length
    );
    println!();

    let mut population = Population::new("one-max", config, Arc::new(OneMax))
        .unwrap_or_else(|e| {
            eprintln!("Error creating population: {}", e);
            std::process::exit(1);
        })
        .with_breeder(BitFlipBreeder::default());

    let started = match &checkpoint {
        Some(path) if path.exists() => population.load(path),
        _ => population.setup(|rng| CandidateKind::Individual(BitString::random(length, rng))),
    };
    if let Err(e) = started {
        eprintln!("Error initializing population: {}", e);
        std::process::exit(1);
    }

    let summary = population
        .run(|report| {
            if report.generation % 10 == 0 {
                println!(
                    "  Generation {}: best={:?}, mean={:.3}, entropy={:.3}, sigma={:.3}",
                    report.generation,
                    report.best_raw.as_deref().unwrap_or_default(),
                    report.average_raw.unwrap_or_default(),
                    report.entropy,
                    report.sigma
                );
            }
        })
        .unwrap_or_else(|e| {
            eprintln!("Error during run: {}", e);
            std::process::exit(1);
        });

    println!();
    println!("Stopped by {:?} after {} generations", summary.stop_reason, summary.generations);
    if let Some(best) = population.best_raw() {
        println!("Best: {} {}", best, best.fitness().description());
    }
    println!(
        "Evaluations: {} ({} cache hits), {:.2}s",
        summary.evaluator.evaluations, summary.evaluator.cache_hits, summary.elapsed_secs
    );

    if let Some(path) = checkpoint
        && let Err(e) = population.save(&path)
    {
        eprintln!("Error writing checkpoint: {}", e);
        std::process::exit(1);
    }
}

fn print_example_config() {
    let mut config = EngineConfig::default();
    config.selection = SelectionConfig::TwoStepTournament(TournamentConfig {
        fitness_hole: 0.1,
        ..Default::default()
    });
    config.stop.max_generations = Some(500);
    config.stop.target_fitness = Some(vec![64.0]);
    config.random_seed = Some(42);

    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}

//! Distances between phenotypes and candidates.

use crate::schema::DistanceKind;

use super::candidate::{Candidate, Genome};

/// Distance between two candidates as used by fitness sharing.
pub fn between<G: Genome>(kind: DistanceKind, a: &Candidate<G>, b: &Candidate<G>) -> f64 {
    match kind {
        DistanceKind::Entropic => a.message().entropic_distance(b.message()),
        DistanceKind::Hamming => hamming(a.normalized_phenotype(), b.normalized_phenotype()) as f64,
        DistanceKind::Levenshtein => {
            levenshtein(a.normalized_phenotype(), b.normalized_phenotype()) as f64
        }
    }
}

/// Number of differing characters plus the length difference.
pub fn hamming(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let differing = a.iter().zip(&b).filter(|(x, y)| x != y).count();
    differing + a.len().abs_diff(b.len())
}

/// Edit distance with unit costs.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, x) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, y) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(x != y);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

//! Entropy messages: multisets of symbols used to measure diversity.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use super::error::{EngineError, Result};
use super::hash::djb_mix;

/// Longest run of consecutive elements folded into a single symbol.
const MAX_TUPLE: usize = 3;

/// Multiset of symbols.
///
/// Symbols are kept ordered so entropy is always accumulated in the same
/// order, whatever order they were inserted in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    symbols: BTreeMap<u64, u32>,
    total: u64,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbols of a sequence of element hashes: each element keyed by its
    /// position, plus every run of two and three consecutive elements.
    pub fn from_sequence(sequence: &[u64]) -> Self {
        let mut message = Self::new();
        message.extract_symbols(sequence);
        message
    }

    pub fn extract_symbols(&mut self, sequence: &[u64]) {
        for (i, &element) in sequence.iter().enumerate() {
            self.add(djb_mix(element, &[i as u64]));
        }
        for offset in 1..MAX_TUPLE {
            for window in sequence.windows(offset + 1) {
                self.add(djb_mix(window[0], &window[1..]));
            }
        }
    }

    pub fn add(&mut self, symbol: u64) {
        *self.symbols.entry(symbol).or_insert(0) += 1;
        self.total += 1;
    }

    /// Remove one occurrence of `symbol`.
    pub fn remove(&mut self, symbol: u64) -> Result<()> {
        let count = self
            .symbols
            .get_mut(&symbol)
            .ok_or(EngineError::MissingSymbol(symbol))?;
        *count -= 1;
        if *count == 0 {
            self.symbols.remove(&symbol);
        }
        self.total -= 1;
        Ok(())
    }

    /// Remove every symbol of `other`. Leaves `self` untouched on failure.
    pub fn subtract(&mut self, other: &Message) -> Result<()> {
        for (symbol, count) in &other.symbols {
            if self.count(*symbol) < *count {
                return Err(EngineError::MissingSymbol(*symbol));
            }
        }
        for (symbol, count) in &other.symbols {
            if let Some(current) = self.symbols.get_mut(symbol) {
                *current -= count;
                if *current == 0 {
                    self.symbols.remove(symbol);
                }
            }
        }
        self.total -= other.total;
        Ok(())
    }

    pub fn count(&self, symbol: u64) -> u32 {
        self.symbols.get(&symbol).copied().unwrap_or(0)
    }

    /// Number of distinct symbols.
    pub fn distinct(&self) -> usize {
        self.symbols.len()
    }

    /// Number of symbols, repetitions included.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Shannon entropy `−Σ p ln p` of the symbol distribution.
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let total = self.total as f64;
        self.symbols
            .values()
            .map(|&count| {
                let p = f64::from(count) / total;
                -p * p.ln()
            })
            .sum()
    }

    /// Symmetric difference of the distinct symbol sets: `2·|a ∪ b| − |a| − |b|`.
    pub fn entropic_distance(&self, other: &Message) -> f64 {
        let shared = self
            .symbols
            .keys()
            .filter(|symbol| other.symbols.contains_key(symbol))
            .count();
        let union = self.distinct() + other.distinct() - shared;
        (2 * union - self.distinct() - other.distinct()) as f64
    }
}

impl AddAssign<&Message> for Message {
    fn add_assign(&mut self, other: &Message) {
        for (symbol, count) in &other.symbols {
            *self.symbols.entry(*symbol).or_insert(0) += count;
        }
        self.total += other.total;
    }
}

impl AddAssign<u64> for Message {
    fn add_assign(&mut self, symbol: u64) {
        self.add(symbol);
    }
}

//! Candidate id and allopatric tag generation.

use crate::schema::{AllopatricTag, CandidateId, IdCounters};

use super::error::{EngineError, Result};

/// Issues candidate ids and allopatric tags.
///
/// One generator is owned by each run; every candidate constructor takes it
/// explicitly.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    counters: IdCounters,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next candidate id.
    pub fn next_id(&mut self) -> CandidateId {
        let id = CandidateId(self.counters.next_candidate);
        self.counters.next_candidate += 1;
        id
    }

    /// Issue the next allopatric tag.
    pub fn next_tag(&mut self) -> AllopatricTag {
        let tag = AllopatricTag(self.counters.next_tag);
        self.counters.next_tag += 1;
        tag
    }

    pub fn counters(&self) -> IdCounters {
        self.counters
    }

    /// Continue issuing from saved counters. Never moves backwards.
    pub fn resume_from(&mut self, counters: IdCounters) -> Result<()> {
        if counters.next_candidate < self.counters.next_candidate
            || counters.next_tag < self.counters.next_tag
        {
            return Err(EngineError::CounterRewind {
                current: self.counters,
                requested: counters,
            });
        }
        self.counters = counters;
        Ok(())
    }

    /// Make sure counters are past values already present in a restored population.
    pub(crate) fn reserve_past(&mut self, id: CandidateId, tag: AllopatricTag) {
        self.counters.next_candidate = self.counters.next_candidate.max(id.0 + 1);
        self.counters.next_tag = self.counters.next_tag.max(tag.0 + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut ids = IdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(a < b);
        assert_eq!(ids.next_tag(), AllopatricTag(0));
        assert_eq!(ids.next_tag(), AllopatricTag(1));
    }

    #[test]
    fn test_resume_from() {
        let mut ids = IdGenerator::new();
        ids.resume_from(IdCounters {
            next_candidate: 100,
            next_tag: 7,
        })
        .unwrap();
        assert_eq!(ids.next_id(), CandidateId(100));
        assert_eq!(ids.next_tag(), AllopatricTag(7));
    }

    #[test]
    fn test_resume_rejects_rewind() {
        let mut ids = IdGenerator::new();
        for _ in 0..10 {
            ids.next_id();
        }
        let result = ids.resume_from(IdCounters {
            next_candidate: 5,
            next_tag: 0,
        });
        assert!(matches!(result, Err(EngineError::CounterRewind { .. })));
        assert_eq!(ids.next_id(), CandidateId(10));
    }

    #[test]
    fn test_reserve_past() {
        let mut ids = IdGenerator::new();
        ids.reserve_past(CandidateId(41), AllopatricTag(3));
        assert_eq!(ids.next_id(), CandidateId(42));
        assert_eq!(ids.next_tag(), AllopatricTag(4));
    }
}

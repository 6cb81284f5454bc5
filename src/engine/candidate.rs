//! Candidates: the entities under evolution and their lifecycle state machine.

use std::cell::OnceCell;
use std::fmt;

use log::trace;

use crate::schema::{AllopatricTag, CandidateId, CandidateKind, CandidateSnapshot, CandidateState};

use super::entropy::Message;
use super::error::{EngineError, Result};
use super::fitness::{Fitness, ScaledFitness};
use super::hash::djb_mix;
use super::ids::IdGenerator;

/// What a hash is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashPurpose {
    /// Pre-filter for clone detection.
    Genotype,
    /// Quantization for diversity measures.
    Entropy,
}

impl HashPurpose {
    fn seed(self) -> u64 {
        match self {
            Self::Genotype => 0x6765_6e6f,
            Self::Entropy => 0x656e_7472,
        }
    }
}

/// Services a representation must provide to be evolved.
pub trait Genome: Clone + Send + Sync {
    /// Whether the genome satisfies its constraints.
    fn validate(&self) -> bool;
    /// Structural equality used for clone detection.
    fn is_genotype_equal(&self, other: &Self) -> bool;
    /// Rendering invariant under non-coding differences. Used as evaluator cache key.
    fn compute_normalized_phenotype(&self) -> String;
    /// Hash consistent with [`Genome::is_genotype_equal`] for [`HashPurpose::Genotype`].
    fn compute_hash(&self, purpose: HashPurpose) -> u64;
    /// Symbols describing the genome for entropy measures.
    fn compute_entropy_message(&self) -> Message;
}

impl<G: Genome> CandidateKind<G> {
    pub fn validate(&self) -> bool {
        match self {
            Self::Individual(genome) => genome.validate(),
            Self::Group(members) => !members.is_empty() && members.iter().all(Genome::validate),
        }
    }

    /// Groups are equal when their members match one to one, in any order.
    pub fn is_genotype_equal(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Individual(a), Self::Individual(b)) => a.is_genotype_equal(b),
            (Self::Group(a), Self::Group(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                let mut matched = vec![false; b.len()];
                a.iter().all(|member| {
                    let found = b
                        .iter()
                        .enumerate()
                        .find(|(j, other)| !matched[*j] && member.is_genotype_equal(other));
                    match found {
                        Some((j, _)) => {
                            matched[j] = true;
                            true
                        }
                        None => false,
                    }
                })
            }
            _ => false,
        }
    }

    pub fn compute_normalized_phenotype(&self) -> String {
        match self {
            Self::Individual(genome) => genome.compute_normalized_phenotype(),
            Self::Group(members) => {
                let mut phenotypes: Vec<String> = members
                    .iter()
                    .map(Genome::compute_normalized_phenotype)
                    .collect();
                phenotypes.sort();
                format!("{{{}}}", phenotypes.join(";"))
            }
        }
    }

    pub fn compute_hash(&self, purpose: HashPurpose) -> u64 {
        match self {
            Self::Individual(genome) => genome.compute_hash(purpose),
            Self::Group(members) => {
                let mut hashes: Vec<u64> = members.iter().map(|m| m.compute_hash(purpose)).collect();
                hashes.sort_unstable();
                djb_mix(purpose.seed(), &hashes)
            }
        }
    }

    pub fn compute_entropy_message(&self) -> Message {
        match self {
            Self::Individual(genome) => genome.compute_entropy_message(),
            Self::Group(members) => {
                let mut message = Message::new();
                for member in members {
                    message += &member.compute_entropy_message();
                }
                message
            }
        }
    }
}

/// Read-only view of the owning population handed to lifecycle operations.
#[derive(Debug, Clone, Copy)]
pub struct PopulationView<'a> {
    pub generation: u32,
    /// 0 means unlimited.
    pub maximum_age: u32,
    /// Candidates that must not truly die this generation.
    pub preserved: &'a [CandidateId],
}

impl PopulationView<'_> {
    pub fn is_preserved(&self, id: CandidateId) -> bool {
        self.preserved.contains(&id)
    }
}

/// A candidate solution with its lifecycle, fitness and derived-value caches.
#[derive(Debug, Clone)]
pub struct Candidate<G> {
    id: CandidateId,
    allopatric_tag: AllopatricTag,
    kind: CandidateKind<G>,
    state: CandidateState,
    birth: u32,
    death: Option<u32>,
    age: u32,
    fitness: ScaledFitness,
    delta_entropy: f64,
    parents: Vec<CandidateId>,
    phenotype: OnceCell<String>,
    genotype_hash: OnceCell<u64>,
    entropy_hash: OnceCell<u64>,
    message: OnceCell<Message>,
}

impl<G: Genome> Candidate<G> {
    /// Create a candidate with a fresh id and allopatric tag.
    pub fn new(kind: CandidateKind<G>, ids: &mut IdGenerator, generation: u32) -> Self {
        let tag = ids.next_tag();
        Self::with_lineage(kind, ids, generation, tag, Vec::new())
    }

    /// Create an offspring that joins the niche `tag`.
    pub fn with_lineage(
        kind: CandidateKind<G>,
        ids: &mut IdGenerator,
        generation: u32,
        tag: AllopatricTag,
        parents: Vec<CandidateId>,
    ) -> Self {
        Self {
            id: ids.next_id(),
            allopatric_tag: tag,
            kind,
            state: CandidateState::Alive,
            birth: generation,
            death: None,
            age: 0,
            fitness: ScaledFitness::default(),
            delta_entropy: 0.0,
            parents,
            phenotype: OnceCell::new(),
            genotype_hash: OnceCell::new(),
            entropy_hash: OnceCell::new(),
            message: OnceCell::new(),
        }
    }

    /// Deep copy of the representation under a new identity and niche.
    /// No lifecycle state or fitness is carried over.
    pub fn clone_as_new(&self, ids: &mut IdGenerator, generation: u32) -> Self {
        Self::new(self.kind.clone(), ids, generation)
    }

    pub fn id(&self) -> CandidateId {
        self.id
    }

    pub fn allopatric_tag(&self) -> AllopatricTag {
        self.allopatric_tag
    }

    pub fn kind(&self) -> &CandidateKind<G> {
        &self.kind
    }

    /// Mutable access to the representation. Drops every cached value and the fitness.
    pub fn kind_mut(&mut self) -> &mut CandidateKind<G> {
        self.invalidate_caches();
        self.fitness.invalidate();
        &mut self.kind
    }

    pub fn state(&self) -> CandidateState {
        self.state
    }

    /// Alive or Hero.
    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    pub fn is_hero(&self) -> bool {
        self.state == CandidateState::Hero
    }

    pub fn is_zombie(&self) -> bool {
        self.state == CandidateState::Zombie
    }

    pub fn is_dead(&self) -> bool {
        self.state.is_dead()
    }

    pub fn birth(&self) -> u32 {
        self.birth
    }

    /// `None` while not dead.
    pub fn death(&self) -> Option<u32> {
        self.death
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn parents(&self) -> &[CandidateId] {
        &self.parents
    }

    pub fn raw_fitness(&self) -> Option<&Fitness> {
        self.fitness.raw()
    }

    pub fn fitness(&self) -> &ScaledFitness {
        &self.fitness
    }

    pub(crate) fn fitness_mut(&mut self) -> &mut ScaledFitness {
        &mut self.fitness
    }

    pub fn has_valid_fitness(&self) -> bool {
        self.fitness.is_valid()
    }

    /// Store a new raw fitness; scaled values are recomputed from it.
    pub fn set_raw_fitness(&mut self, fitness: &Fitness) {
        self.fitness.set_raw(fitness);
    }

    pub fn invalidate_fitness(&mut self) {
        self.fitness.invalidate();
    }

    pub fn delta_entropy(&self) -> f64 {
        self.delta_entropy
    }

    pub(crate) fn set_delta_entropy(&mut self, delta: f64) {
        self.delta_entropy = delta;
    }

    pub fn validate(&self) -> bool {
        self.kind.validate()
    }

    pub fn is_genotype_equal(&self, other: &Self) -> bool {
        self.kind.is_genotype_equal(&other.kind)
    }

    pub fn normalized_phenotype(&self) -> &str {
        self.phenotype
            .get_or_init(|| self.kind.compute_normalized_phenotype())
    }

    pub fn hash(&self, purpose: HashPurpose) -> u64 {
        let cell = match purpose {
            HashPurpose::Genotype => &self.genotype_hash,
            HashPurpose::Entropy => &self.entropy_hash,
        };
        *cell.get_or_init(|| self.kind.compute_hash(purpose))
    }

    pub fn message(&self) -> &Message {
        self.message
            .get_or_init(|| self.kind.compute_entropy_message())
    }

    /// Forget cached phenotype, hashes and message.
    pub fn invalidate_caches(&mut self) {
        self.phenotype.take();
        self.genotype_hash.take();
        self.entropy_hash.take();
        self.message.take();
    }

    pub(crate) fn set_hero(&mut self, hero: bool) {
        debug_assert!(self.is_alive());
        self.state = if hero {
            CandidateState::Hero
        } else {
            CandidateState::Alive
        };
    }

    /// Check that the candidate could die at `generation`, without changing it.
    pub fn check_death(&self, generation: u32) -> Result<()> {
        if self.is_dead() {
            return Err(EngineError::AlreadyDead(self.id));
        }
        if u64::from(generation) + 1 < u64::from(self.birth) + u64::from(self.age) {
            return Err(EngineError::TemporalInconsistency {
                id: self.id,
                death: generation,
                birth: self.birth,
                age: self.age,
            });
        }
        Ok(())
    }

    /// Check that aging an Alive candidate would not fail.
    pub(crate) fn check_aging(&self, view: &PopulationView<'_>) -> Result<()> {
        if view.maximum_age > 0 && self.age >= view.maximum_age {
            self.check_death(view.generation)?;
        }
        Ok(())
    }

    /// Record death at `generation`. Preserved candidates become zombies instead.
    ///
    /// Fails without touching the candidate if `generation + 1 < birth + age`.
    pub fn set_death(&mut self, generation: u32, view: &PopulationView<'_>) -> Result<()> {
        self.check_death(generation)?;

        if view.is_preserved(self.id) {
            trace!("{} preserved as zombie", self);
            self.state = CandidateState::Zombie;
        } else {
            if self.is_hero() {
                trace!("Hero {} killed", self);
            }
            self.mark_dead();
        }
        self.death = Some(generation);
        Ok(())
    }

    /// Turn a zombie that left the preserve list into a corpse.
    pub(crate) fn bury(&mut self) {
        debug_assert!(self.is_zombie());
        self.mark_dead();
    }

    fn mark_dead(&mut self) {
        self.state = CandidateState::Dead;
        #[cfg(debug_assertions)]
        self.fitness.invalidate();
    }

    /// Advance one generation. Only Alive, non-hero candidates age; reaching
    /// the maximum age kills them before the age is incremented.
    pub fn step(&mut self, age: bool, view: &PopulationView<'_>) -> Result<()> {
        if age && self.state == CandidateState::Alive {
            if view.maximum_age > 0 && self.age >= view.maximum_age {
                self.set_death(view.generation, view)?;
            }
            self.age += 1;
        }
        Ok(())
    }

    pub fn to_snapshot(&self) -> CandidateSnapshot<G> {
        CandidateSnapshot {
            id: self.id,
            allopatric_tag: self.allopatric_tag,
            kind: self.kind.clone(),
            state: self.state,
            birth: self.birth,
            death: self.death,
            age: self.age,
            raw_fitness: self.raw_fitness().map(|f| f.values.clone()),
            description: self
                .raw_fitness()
                .map(|f| f.description.clone())
                .unwrap_or_default(),
            parents: self.parents.clone(),
        }
    }

    pub fn from_snapshot(snapshot: CandidateSnapshot<G>) -> Self {
        let mut fitness = ScaledFitness::default();
        if let Some(values) = snapshot.raw_fitness {
            fitness.set_raw(&Fitness::new(values).with_description(snapshot.description));
        }
        Self {
            id: snapshot.id,
            allopatric_tag: snapshot.allopatric_tag,
            kind: snapshot.kind,
            state: snapshot.state,
            birth: snapshot.birth,
            death: snapshot.death,
            age: snapshot.age,
            fitness,
            delta_entropy: 0.0,
            parents: snapshot.parents,
            phenotype: OnceCell::new(),
            genotype_hash: OnceCell::new(),
            entropy_hash: OnceCell::new(),
            message: OnceCell::new(),
        }
    }
}

impl<G> fmt::Display for Candidate<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        match self.state {
            CandidateState::Hero => f.write_str("*"),
            CandidateState::Zombie => f.write_str("+"),
            _ => Ok(()),
        }
    }
}

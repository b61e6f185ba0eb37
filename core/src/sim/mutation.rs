//! Mutation records, the arena that owns them, and their stochastic generation

use rand::prelude::*;
use serde::Serialize;

use crate::cfg::{CoeffType, MutationConfig, RateType};
use crate::sim::distr;

/// Identifier of a mutation, unique and strictly increasing in creation order
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MutationId(u32);

impl MutationId {
    /// Numeric index of the mutation
    pub fn index(self) -> u32 {
        self.0
    }
}

/// The three mutation classes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum MutationKind {
    /// Multiplies the birth rate by `1 + s`
    Scalar,
    /// No fitness effect
    Neutral,
    /// No fitness effect, but tracked as the surface observable
    Neoantigen,
}

/// An immutable mutation record
///
/// Mutations are created only by a [`MutationGenerator`] and are never
/// destroyed; equality is identity through [`MutationId`].
#[derive(Debug, Copy, Clone)]
pub struct MutationRecord {
    /// Mutation class
    pub kind: MutationKind,
    /// Time step at which the mutation was minted
    pub origination_step: u32,
    /// Selection coefficient; zero for non-scalar kinds
    pub selection_coeff: f64,
}

impl MutationRecord {
    /// Multiplicative effect of this mutation on the birth rate
    pub fn fitness_factor(&self) -> f64 {
        match self.kind {
            MutationKind::Scalar => 1.0 + self.selection_coeff,
            MutationKind::Neutral | MutationKind::Neoantigen => 1.0,
        }
    }
}

/// Append-only storage for every mutation minted during a trial
#[derive(Debug, Default)]
pub struct MutationArena {
    records: Vec<MutationRecord>,
    scalar_count: u64,
    neutral_count: u64,
    neoantigen_count: u64,
}

impl MutationArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a new mutation, assigning the next index
    pub fn mint(&mut self, kind: MutationKind, selection_coeff: f64, step: u32) -> MutationId {
        let index = u32::try_from(self.records.len()).expect("mutation index overflow");

        self.records.push(MutationRecord {
            kind,
            origination_step: step,
            selection_coeff,
        });
        match kind {
            MutationKind::Scalar => self.scalar_count += 1,
            MutationKind::Neutral => self.neutral_count += 1,
            MutationKind::Neoantigen => self.neoantigen_count += 1,
        }

        MutationId(index)
    }

    /// Look up a mutation record
    pub fn get(&self, id: MutationId) -> &MutationRecord {
        &self.records[id.0 as usize]
    }

    /// Mutation class of `id`
    pub fn kind(&self, id: MutationId) -> MutationKind {
        self.get(id).kind
    }

    /// Total number of mutations minted so far
    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    /// Whether no mutation has been minted yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of mutations minted of `kind`
    pub fn count_of(&self, kind: MutationKind) -> u64 {
        match kind {
            MutationKind::Scalar => self.scalar_count,
            MutationKind::Neutral => self.neutral_count,
            MutationKind::Neoantigen => self.neoantigen_count,
        }
    }

    /// Iterate over `(id, record)` pairs in creation order
    pub fn iter(&self) -> impl Iterator<Item = (MutationId, &MutationRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(i, r)| (MutationId(i as u32), r))
    }
}

/// One enabled mutation class with its emission parameters
#[derive(Debug, Clone)]
struct MutationChannel {
    kind: MutationKind,
    rate_type: RateType,
    mean_rate: f64,
    coeff: CoeffSampler,
}

/// Distribution of the scalar selection coefficient
#[derive(Debug, Clone)]
enum CoeffSampler {
    /// Non-scalar kinds carry no coefficient
    None,
    Delta(f64),
    Exponential(f64),
}

impl CoeffSampler {
    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::None => 0.0,
            Self::Delta(s) => s,
            Self::Exponential(mean) => {
                if mean == 0.0 {
                    0.0
                } else {
                    rand_distr::Exp::new(mean.recip()).unwrap().sample(rng)
                }
            }
        }
    }
}

impl MutationChannel {
    /// Number of mutations of this class arising among `exposure` new cells
    fn sample_count<R: Rng>(&self, exposure: u64, rng: &mut R) -> u64 {
        if self.mean_rate == 0.0 || exposure == 0 {
            return 0;
        }

        match self.rate_type {
            RateType::Poisson => distr::poisson(self.mean_rate * exposure as f64, rng),
            RateType::Bernoulli => rand_distr::Binomial::new(exposure, self.mean_rate)
                .unwrap()
                .sample(rng),
        }
    }
}

/// Emits fresh mutations, called once per component advancement
///
/// The exposure is the number of cells created by the advancement; each
/// enabled class contributes an independent count at its configured rate.
#[derive(Debug, Clone)]
pub struct MutationGenerator {
    channels: Vec<MutationChannel>,
}

impl MutationGenerator {
    /// Build a generator from the mutation configuration
    pub fn from_config(cfg: &MutationConfig) -> Self {
        let coeff = match cfg.selection_coeff_type {
            CoeffType::Delta => CoeffSampler::Delta(cfg.selection_coeff),
            CoeffType::Exponential => CoeffSampler::Exponential(cfg.selection_coeff),
        };

        let channels = vec![
            MutationChannel {
                kind: MutationKind::Scalar,
                rate_type: cfg.selective_rate_type,
                mean_rate: cfg.selective_mean_rate,
                coeff,
            },
            MutationChannel {
                kind: MutationKind::Neutral,
                rate_type: cfg.neutral_rate_type,
                mean_rate: cfg.neutral_mean_rate,
                coeff: CoeffSampler::None,
            },
            MutationChannel {
                kind: MutationKind::Neoantigen,
                rate_type: cfg.neoantigen_rate_type,
                mean_rate: cfg.neoantigen_mean_rate,
                coeff: CoeffSampler::None,
            },
        ];

        Self { channels }
    }

    /// A generator that never emits, for tests and founder construction
    pub fn silent() -> Self {
        Self { channels: Vec::new() }
    }

    /// Mint the mutations arising among `exposure` new cells this step
    pub fn generate<R: Rng>(
        &self,
        exposure: u64,
        step: u32,
        arena: &mut MutationArena,
        rng: &mut R,
    ) -> Vec<MutationId> {
        let mut minted = Vec::new();

        for channel in &self.channels {
            let count = channel.sample_count(exposure, rng);
            for _ in 0..count {
                let s = channel.coeff.sample(rng);
                minted.push(arena.mint(channel.kind, s, step));
            }
        }

        minted
    }
}

/// Decorator that silences an inner generator past a step or count threshold
///
/// The first step on which the cutoff suppressed generation is retained for
/// reporting.
#[derive(Debug, Clone)]
pub struct CappedMutationGenerator {
    inner: MutationGenerator,
    max_mutation_count: Option<u64>,
    max_generation_step: Option<u32>,
    tripped_at: Option<u32>,
}

impl CappedMutationGenerator {
    /// Wrap `inner` with optional step and count cutoffs
    pub fn new(
        inner: MutationGenerator,
        max_mutation_count: Option<u64>,
        max_generation_step: Option<u32>,
    ) -> Self {
        Self {
            inner,
            max_mutation_count,
            max_generation_step,
            tripped_at: None,
        }
    }

    /// Build from the mutation configuration, cutoffs included
    pub fn from_config(cfg: &MutationConfig) -> Self {
        Self::new(
            MutationGenerator::from_config(cfg),
            cfg.max_mutation_count,
            cfg.max_generation_step,
        )
    }

    /// Step at which the cutoff first suppressed generation, if it has
    pub fn tripped_at(&self) -> Option<u32> {
        self.tripped_at
    }

    /// Mint mutations unless a cutoff is in force
    pub fn generate<R: Rng>(
        &mut self,
        exposure: u64,
        step: u32,
        arena: &mut MutationArena,
        rng: &mut R,
    ) -> Vec<MutationId> {
        let stop_by_step = self.max_generation_step.map_or(false, |max| step > max);
        let stop_by_count = self.max_mutation_count.map_or(false, |max| arena.len() >= max);

        if stop_by_step || stop_by_count {
            if self.tripped_at.is_none() {
                self.tripped_at = Some(step);
                log::warn!(
                    "mutation generation cut off at step {} ({} mutations)",
                    step,
                    arena.len()
                );
            }
            return Vec::new();
        }

        self.inner.generate(exposure, step, arena, rng)
    }
}

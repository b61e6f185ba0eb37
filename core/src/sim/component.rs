//! The three replicating component kinds: cells, lineages, and demes
//!
//! All three share a small capability set (cell count, death flag, genotype
//! access, advancement) but differ radically in storage, so they are a tagged
//! enum rather than a trait hierarchy. Advancement mutates the component in
//! place and reports births, deaths, and any daughter components; placement and
//! capacity reconciliation belong to the tumor scheduler.

use rand::prelude::*;
use serde::Serialize;

use crate::sim::distr;
use crate::sim::genotype::{GenotypeArena, GenotypeId};
use crate::sim::growth::{GrowthCount, GrowthRate};
use crate::sim::mutation::{CappedMutationGenerator, MutationArena};

/// Identifier of a component, strictly increasing in creation order
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Build an id from its numeric index
    pub fn new(index: u64) -> Self {
        Self(index)
    }

    /// Numeric index of the component
    pub fn index(self) -> u64 {
        self.0
    }
}

/// The short-lived value bundle handed to a component on each advancement
#[derive(Debug, Copy, Clone)]
pub struct LocalEnv {
    /// Net cell-count growth the local neighborhood can absorb this step
    pub growth_capacity: u64,
    /// Effective per-cell growth rate for this component
    pub growth_rate: GrowthRate,
}

/// Mutable simulation state a component may touch while advancing
pub struct AdvanceCtx<'a> {
    /// Mutation generator (shared, possibly capped)
    pub generator: &'a mut CappedMutationGenerator,
    /// Genotype ancestry arena
    pub genotypes: &'a mut GenotypeArena,
    /// Mutation arena
    pub mutations: &'a mut MutationArena,
    /// Current time step
    pub time_step: u32,
    /// Population size at or below which events are explicitly sampled
    pub sampling_limit: u64,
}

/// The outcome of one component advancement
#[derive(Debug, Default)]
pub struct Advancement {
    /// Birth and death counts this step
    pub count: GrowthCount,
    /// Daughter components to be placed by the scheduler
    pub daughters: Vec<Component>,
}

/// A single cell
#[derive(Debug, Clone)]
pub struct Cell {
    /// Genotype of the cell
    pub genotype: GenotypeId,
    alive: bool,
}

/// A multi-cell group sharing one genotype
#[derive(Debug, Clone)]
pub struct Lineage {
    /// Genotype shared by every cell of the lineage
    pub genotype: GenotypeId,
    /// Number of cells
    pub cell_count: u64,
}

/// One genotype group inside a deme
#[derive(Debug, Clone)]
pub struct DemeMember {
    /// Genotype of the group
    pub genotype: GenotypeId,
    /// Number of cells in the group
    pub cell_count: u64,
}

/// A multi-cell group with heterogeneous internal membership
///
/// A deme advances as a whole and never emits daughters; it divides only when
/// the scheduler splits it across two sites.
#[derive(Debug, Clone)]
pub struct Deme {
    members: Vec<DemeMember>,
}

/// A replicating unit: one of the three component kinds
#[derive(Debug, Clone)]
pub enum Component {
    /// A single cell
    Cell(Cell),
    /// A multi-cell single-genotype lineage
    Lineage(Lineage),
    /// A multi-cell heterogeneous deme
    Deme(Deme),
}

impl Component {
    /// A live founder cell
    pub fn founder_cell(genotype: GenotypeId) -> Self {
        Self::Cell(Cell { genotype, alive: true })
    }

    /// A founder lineage of `cell_count` cells
    pub fn founder_lineage(genotype: GenotypeId, cell_count: u64) -> Self {
        Self::Lineage(Lineage { genotype, cell_count })
    }

    /// A founder deme of `cell_count` cells in one member group
    pub fn founder_deme(genotype: GenotypeId, cell_count: u64) -> Self {
        Self::Deme(Deme {
            members: vec![DemeMember { genotype, cell_count }],
        })
    }

    /// Number of cells in the component
    pub fn cell_count(&self) -> u64 {
        match self {
            Self::Cell(cell) => u64::from(cell.alive),
            Self::Lineage(lineage) => lineage.cell_count,
            Self::Deme(deme) => deme.cell_count(),
        }
    }

    /// Whether the component holds no cells
    pub fn is_dead(&self) -> bool {
        self.cell_count() == 0
    }

    /// The genotype groups of the component, with their cell counts
    pub fn genotype_groups(&self) -> Vec<(GenotypeId, u64)> {
        match self {
            Self::Cell(cell) => {
                if cell.alive {
                    vec![(cell.genotype, 1)]
                } else {
                    Vec::new()
                }
            }
            Self::Lineage(lineage) => vec![(lineage.genotype, lineage.cell_count)],
            Self::Deme(deme) => deme
                .members
                .iter()
                .map(|m| (m.genotype, m.cell_count))
                .collect(),
        }
    }

    /// Cell-count-weighted mean fitness factor of the component
    pub fn fitness_factor(&self, genotypes: &GenotypeArena) -> f64 {
        let groups = self.genotype_groups();
        let total: u64 = groups.iter().map(|&(_, n)| n).sum();
        if total == 0 {
            return 1.0;
        }

        groups
            .iter()
            .map(|&(g, n)| genotypes.fitness_factor(g) * n as f64)
            .sum::<f64>()
            / total as f64
    }

    /// Advance the component through one time step
    ///
    /// Updates the component in place and returns its event counts and any
    /// daughter components; daughters of a lineage always hold one cell, and a
    /// deme never produces daughters.
    pub fn advance<R: Rng>(
        &mut self,
        env: &LocalEnv,
        ctx: &mut AdvanceCtx,
        rng: &mut R,
    ) -> Advancement {
        match self {
            Self::Cell(cell) => cell.advance(env, ctx, rng),
            Self::Lineage(lineage) => lineage.advance(env, ctx, rng),
            Self::Deme(deme) => deme.advance(env, ctx, rng),
        }
    }
}

impl Cell {
    fn advance<R: Rng>(&mut self, env: &LocalEnv, ctx: &mut AdvanceCtx, rng: &mut R) -> Advancement {
        assert!(self.alive, "advancing a dead cell");

        let count = env.growth_rate.sample_count(1, env.growth_capacity, rng);
        let mut daughters = Vec::new();

        if count.deaths == 1 {
            self.alive = false;
        } else if count.births == 1 {
            let minted = ctx
                .generator
                .generate(1, ctx.time_step, ctx.mutations, rng);
            let genotype = if minted.is_empty() {
                self.genotype
            } else {
                ctx.genotypes
                    .for_daughter(self.genotype, minted, ctx.mutations)
            };
            daughters.push(Component::Cell(Cell { genotype, alive: true }));
        }

        Advancement { count, daughters }
    }
}

impl Lineage {
    fn advance<R: Rng>(&mut self, env: &LocalEnv, ctx: &mut AdvanceCtx, rng: &mut R) -> Advancement {
        assert!(self.cell_count > 0, "advancing an empty lineage");

        let count = env.growth_rate.resolve_count(
            self.cell_count,
            env.growth_capacity,
            ctx.sampling_limit,
            rng,
        );
        self.cell_count = self
            .cell_count
            .checked_add(count.births)
            .expect("lineage cell count overflow")
            - count.deaths;

        // Each fresh mutation detaches one newborn into a size-1 daughter
        // carrying the child genotype; the parent keeps its genotype.
        let minted = ctx
            .generator
            .generate(count.births, ctx.time_step, ctx.mutations, rng);
        let mut daughters = Vec::new();
        for id in minted {
            if self.cell_count == 0 {
                break;
            }
            let genotype = ctx
                .genotypes
                .for_daughter(self.genotype, vec![id], ctx.mutations);
            daughters.push(Component::Lineage(Lineage { genotype, cell_count: 1 }));
            self.cell_count -= 1;
        }

        Advancement { count, daughters }
    }
}

impl Deme {
    /// Number of cells across all member groups
    pub fn cell_count(&self) -> u64 {
        self.members.iter().map(|m| m.cell_count).sum()
    }

    /// The internal genotype groups
    pub fn members(&self) -> &[DemeMember] {
        &self.members
    }

    fn advance<R: Rng>(&mut self, env: &LocalEnv, ctx: &mut AdvanceCtx, rng: &mut R) -> Advancement {
        let total = self.cell_count();
        assert!(total > 0, "advancing an empty deme");

        let count = env.growth_rate.resolve_count(
            total,
            env.growth_capacity,
            ctx.sampling_limit,
            rng,
        );

        let mut birth_alloc = self.allocate_events(count.births, rng);
        let death_alloc = self.allocate_events(count.deaths, rng);
        for (member, (&births, &deaths)) in self
            .members
            .iter_mut()
            .zip(birth_alloc.iter().zip(&death_alloc))
        {
            member.cell_count += births;
            member.cell_count -= deaths.min(member.cell_count);
        }

        // Mutations arise in newborns; each moves one newborn out of its
        // member group into a fresh single-cell member.
        let minted = ctx
            .generator
            .generate(count.births, ctx.time_step, ctx.mutations, rng);
        for id in minted {
            let Some(slot) = weighted_pick(&birth_alloc, rng) else {
                break;
            };
            let parent = self.members[slot].genotype;
            if self.members[slot].cell_count == 0 {
                continue;
            }
            birth_alloc[slot] -= 1;
            self.members[slot].cell_count -= 1;

            let genotype = ctx.genotypes.for_daughter(parent, vec![id], ctx.mutations);
            self.members.push(DemeMember { genotype, cell_count: 1 });
            birth_alloc.push(0);
        }

        self.members.retain(|m| m.cell_count > 0);

        Advancement { count, daughters: Vec::new() }
    }

    /// Allocate `events` among members in proportion to their cell counts
    fn allocate_events<R: Rng>(&self, events: u64, rng: &mut R) -> Vec<u64> {
        let mut alloc = vec![0u64; self.members.len()];
        let mut remaining_events = events;
        let mut remaining_cells = self.cell_count();

        for (slot, member) in self.members.iter().enumerate() {
            if remaining_events == 0 || remaining_cells == 0 {
                break;
            }
            let share = if member.cell_count == remaining_cells {
                remaining_events
            } else {
                let p = remaining_events as f64 / remaining_cells as f64;
                distr::discretize(member.cell_count as f64 * p.min(1.0), rng)
                    .min(member.cell_count)
                    .min(remaining_events)
            };
            alloc[slot] = share;
            remaining_events -= share;
            remaining_cells -= member.cell_count;
        }

        // Round-off may leave a remainder; spread it over members in order.
        if remaining_events > 0 {
            for (slot, member) in self.members.iter().enumerate() {
                if remaining_events == 0 {
                    break;
                }
                let headroom = member.cell_count.saturating_sub(alloc[slot]);
                let extra = headroom.min(remaining_events);
                alloc[slot] += extra;
                remaining_events -= extra;
            }
        }

        alloc
    }

    /// Split off a new deme holding between `min_transfer` and `max_transfer`
    /// cells, assigning cells to the clone with probability one half
    ///
    /// The stochastic pass is clamped to the transfer ceiling as it runs and
    /// topped up to the floor afterwards, so both bounds are honored exactly.
    /// `max_transfer < cell_count` guarantees the parent keeps a cell.
    pub fn split<R: Rng>(&mut self, min_transfer: u64, max_transfer: u64, rng: &mut R) -> Deme {
        let total = self.cell_count();
        assert!(min_transfer >= 1 && min_transfer <= max_transfer);
        assert!(max_transfer < total, "a deme split must leave a cell behind");

        let mut clone_members: Vec<DemeMember> = Vec::with_capacity(self.members.len());
        let mut transferred = 0u64;

        for member in &mut self.members {
            let headroom = max_transfer - transferred;
            let moved = rand_distr::Binomial::new(member.cell_count, 0.5)
                .unwrap()
                .sample(rng)
                .min(headroom);

            if moved > 0 {
                member.cell_count -= moved;
                transferred += moved;
                clone_members.push(DemeMember {
                    genotype: member.genotype,
                    cell_count: moved,
                });
            }
        }

        // Top up to the floor, drawing from the largest members first.
        while transferred < min_transfer {
            let donor = self
                .members
                .iter_mut()
                .filter(|m| m.cell_count > 0)
                .max_by_key(|m| m.cell_count)
                .expect("deme split cannot reach its minimum transfer");
            let moved = (min_transfer - transferred).min(donor.cell_count);
            donor.cell_count -= moved;
            transferred += moved;
            clone_members.push(DemeMember {
                genotype: donor.genotype,
                cell_count: moved,
            });
        }

        self.members.retain(|m| m.cell_count > 0);
        Deme { members: clone_members }
    }
}

/// Pick an index with probability proportional to `weights`
fn weighted_pick<R: Rng>(weights: &[u64], rng: &mut R) -> Option<usize> {
    let total: u64 = weights.iter().sum();
    if total == 0 {
        return None;
    }

    let mut ticket = distr::uniform_int(0, total as i64 - 1, rng) as u64;
    for (slot, &w) in weights.iter().enumerate() {
        if ticket < w {
            return Some(slot);
        }
        ticket -= w;
    }

    None
}

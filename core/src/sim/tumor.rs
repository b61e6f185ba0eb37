//! The tumor: lattice, live components, caches, and the per-step scheduler
//!
//! One `advance` call performs exactly one discrete time step: a migration
//! pass over the shuffled live set, then an advancement pass in the same
//! order. Per-site cell counts and the total cell count are cached and updated
//! atomically with every mutation of the component set; a transient
//! over-capacity is legal only inside a single component's reconciliation.

use hashbrown::HashMap;
use rand::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::cfg::{
    ComponentType, ExpansionSelectorType, MigrationType, NeighborhoodType, SimConfig, SpatialType,
};
use crate::sim::capacity::CapacityModel;
use crate::sim::component::{AdvanceCtx, Component, ComponentId, LocalEnv};
use crate::sim::distr;
use crate::sim::genotype::{GenotypeArena, GenotypeId};
use crate::sim::growth::{GrowthCount, GrowthRate};
use crate::sim::lattice::{Coord, Lattice, Occupancy, MOORE_OFFSETS};
use crate::sim::mutation::{CappedMutationGenerator, MutationArena};

/// Time steps between cache-consistency audits in debug builds
const CACHE_AUDIT_INTERVAL: u32 = 64;

/// An error raised while seeding the founder population
#[derive(Error, Debug)]
pub enum SeedError {
    /// No empty neighbor site was left for the next founder
    #[error("no empty neighbor site available for founder {index}")]
    NoFounderSite {
        /// Index of the founder that could not be placed
        index: u64,
    },
}

/// One row of the component ancestry ledger
#[derive(Debug, Copy, Clone, Serialize)]
pub struct AncestryRecord {
    /// Index of the component
    pub component: u64,
    /// Index of its parent; zero denotes a founder
    pub parent: u64,
}

/// Expansion-site selection distribution
#[derive(Debug, Clone)]
enum ExpansionSelector {
    /// Uniform over the configured neighborhood
    Uniform,
    /// Weighted over the Moore offsets, zero corner weight
    Spherical { cdf: Vec<f64> },
}

impl ExpansionSelector {
    fn from_config(selector: ExpansionSelectorType) -> Self {
        match selector {
            ExpansionSelectorType::Uniform => Self::Uniform,
            ExpansionSelectorType::Spherical => {
                // Face neighbors carry a fixed weight, edge neighbors share the
                // remainder, corners are never selected.
                let p_nn = 0.122;
                let p_nnn = (1.0 - 6.0 * p_nn) / 12.0;

                let mut cumulative = 0.0;
                let mut cdf: Vec<f64> = MOORE_OFFSETS
                    .iter()
                    .map(|o| {
                        cumulative += match o.x.abs() + o.y.abs() + o.z.abs() {
                            1 => p_nn,
                            2 => p_nnn,
                            _ => 0.0,
                        };
                        cumulative
                    })
                    .collect();
                *cdf.last_mut().unwrap() = 1.0;

                Self::Spherical { cdf }
            }
        }
    }
}

/// The simulated tumor and all state owned by its scheduler
pub struct Tumor {
    component_type: ComponentType,
    neighborhood: NeighborhoodType,
    expansion: ExpansionSelector,
    migration: MigrationType,
    capacity: CapacityModel,
    base_rate: GrowthRate,
    sampling_limit: u64,

    lattice: Lattice,
    generator: CappedMutationGenerator,
    genotypes: GenotypeArena,
    mutations: MutationArena,
    components: HashMap<ComponentId, Component>,

    /// Cached cell counts per occupied site, keyed by image coordinates
    site_cells: HashMap<Coord, u64>,
    /// Cached total cell count
    total_cells: u64,

    time_step: u32,
    next_index: u64,
    ancestry: Vec<AncestryRecord>,
    step_count: GrowthCount,
    cumulative_count: GrowthCount,
}

impl Tumor {
    /// Build a tumor and seed its founder population
    ///
    /// The first founder is placed at the origin; each additional founder
    /// cell component goes to a random empty Moore neighbor of the previously
    /// placed founder. `POINT` tumors stack every founder on the single site.
    pub fn seed<R: Rng>(cfg: &SimConfig, rng: &mut R) -> Result<Self, SeedError> {
        let occupancy = match cfg.component_type {
            ComponentType::Deme => Occupancy::Single,
            ComponentType::Cell | ComponentType::Lineage => Occupancy::Multi,
        };

        let base_rate = GrowthRate::new(cfg.growth.birth_rate, cfg.growth.death_rate)
            .expect("growth rates were validated with the configuration");

        let mut tumor = Self {
            component_type: cfg.component_type,
            neighborhood: cfg.lattice.neighborhood,
            expansion: ExpansionSelector::from_config(cfg.lattice.expansion_selector),
            migration: cfg.migration_model,
            capacity: CapacityModel::from_config(cfg),
            base_rate,
            sampling_limit: cfg.growth.explicit_sampling_limit,
            lattice: Lattice::new(cfg.effective_period(), occupancy),
            generator: CappedMutationGenerator::from_config(&cfg.mutation),
            genotypes: GenotypeArena::new(),
            mutations: MutationArena::new(),
            components: HashMap::new(),
            site_cells: HashMap::new(),
            total_cells: 0,
            time_step: 0,
            next_index: 0,
            ancestry: Vec::new(),
            step_count: GrowthCount::default(),
            cumulative_count: GrowthCount::default(),
        };

        let founder_genotype = tumor.genotypes.founder(Vec::new(), &tumor.mutations);
        tumor.place_founders(cfg, founder_genotype, rng)?;

        log::info!(
            "seeded {} {:?} founder component(s), {} cell(s)",
            tumor.components.len(),
            cfg.component_type,
            tumor.total_cells
        );

        Ok(tumor)
    }

    fn place_founders<R: Rng>(
        &mut self,
        cfg: &SimConfig,
        genotype: GenotypeId,
        rng: &mut R,
    ) -> Result<(), SeedError> {
        match cfg.component_type {
            ComponentType::Lineage => {
                self.insert_component(
                    Component::founder_lineage(genotype, cfg.initial_size),
                    Coord::origin(),
                    0,
                );
            }
            ComponentType::Deme => {
                self.insert_component(
                    Component::founder_deme(genotype, cfg.initial_size),
                    Coord::origin(),
                    0,
                );
            }
            ComponentType::Cell => {
                let mut previous = Coord::origin();
                for index in 0..cfg.initial_size {
                    let coord = if index == 0 || cfg.spatial_type == SpatialType::Point {
                        Coord::origin()
                    } else {
                        let empty: Vec<Coord> = NeighborhoodType::Moore
                            .neighbors(previous)
                            .filter(|&c| self.lattice.is_empty(c))
                            .collect();
                        *empty
                            .choose(rng)
                            .ok_or(SeedError::NoFounderSite { index })?
                    };
                    self.insert_component(Component::founder_cell(genotype), coord, 0);
                    previous = coord;
                }
            }
        }

        Ok(())
    }

    /// Advance every live component through exactly one discrete time step
    pub fn advance<R: Rng>(&mut self, rng: &mut R) {
        self.time_step += 1;

        // The randomized scan order is the only inter-component bias; without
        // it, geometric corner effects would skew spatial growth. Sorting
        // before the shuffle keeps runs reproducible under a fixed seed.
        let mut order: Vec<ComponentId> = self.components.keys().copied().collect();
        order.sort_unstable();
        order.shuffle(rng);

        self.migration_phase(&order, rng);

        let mut step_count = GrowthCount::default();
        for &id in &order {
            if !self.components.contains_key(&id) {
                continue;
            }
            let count = self.advance_component(id, rng);
            step_count.births += count.births;
            step_count.deaths += count.deaths;
        }

        self.step_count = step_count;
        self.cumulative_count.births += step_count.births;
        self.cumulative_count.deaths += step_count.deaths;

        if cfg!(debug_assertions) && self.time_step % CACHE_AUDIT_INTERVAL == 0 {
            self.audit_caches();
        }

        log::debug!(
            "step {}: {} cells, {} components, {} births, {} deaths",
            self.time_step,
            self.total_cells,
            self.components.len(),
            step_count.births,
            step_count.deaths
        );
    }

    fn migration_phase<R: Rng>(&mut self, order: &[ComponentId], rng: &mut R) {
        if self.migration == MigrationType::Pinned {
            return;
        }

        for &id in order {
            let Some(component) = self.components.get(&id) else {
                continue;
            };
            if component.is_dead() {
                continue;
            }

            let from = self
                .lattice
                .locate(id)
                .expect("live component is not on the lattice");
            let target = self.neighborhood.random_neighbor(from, rng);
            if self.is_available(target, component) {
                let cells = component.cell_count();
                self.lattice.relocate(id, target);
                self.debit_site(from, cells);
                self.credit_site(target, cells);
            }
        }
    }

    /// Whether `component` could be moved onto the site at `coord`
    fn is_available(&self, coord: Coord, component: &Component) -> bool {
        match component {
            Component::Deme(_) => {
                self.lattice.is_empty(coord)
                    && self.capacity.capacity(coord) >= component.cell_count()
            }
            Component::Cell(_) | Component::Lineage(_) => {
                self.free_cell_capacity(coord) >= component.cell_count()
            }
        }
    }

    fn advance_component<R: Rng>(&mut self, id: ComponentId, rng: &mut R) -> GrowthCount {
        let p_coord = self
            .lattice
            .locate(id)
            .expect("live component is not on the lattice");
        let e_coord = self.expansion_coord(p_coord, rng);

        let mut component = self.components.remove(&id).unwrap();
        assert!(!component.is_dead(), "dead component in the live set");

        let growth_capacity = (self.capacity.capacity(p_coord)
            + self.expansion_free_capacity(&component, e_coord))
        .saturating_sub(self.cells_at(p_coord));
        let growth_rate = self
            .base_rate
            .with_birth_factor_capped(component.fitness_factor(&self.genotypes));
        let env = LocalEnv { growth_capacity, growth_rate };

        let old_count = component.cell_count();
        let mut ctx = AdvanceCtx {
            generator: &mut self.generator,
            genotypes: &mut self.genotypes,
            mutations: &mut self.mutations,
            time_step: self.time_step,
            sampling_limit: self.sampling_limit,
        };
        let advancement = component.advance(&env, &mut ctx, rng);

        match component {
            Component::Cell(_) => {
                self.reconcile_cell(id, component, advancement.daughters, p_coord, e_coord)
            }
            Component::Lineage(_) => self.reconcile_lineage(
                id,
                component,
                old_count,
                advancement.daughters,
                p_coord,
                e_coord,
            ),
            Component::Deme(_) => self.reconcile_deme(
                id,
                component,
                old_count,
                advancement.daughters,
                p_coord,
                e_coord,
                rng,
            ),
        }

        advancement.count
    }

    /// Choose the expansion coordinate for a component at `coord`
    fn expansion_coord<R: Rng>(&self, coord: Coord, rng: &mut R) -> Coord {
        match &self.expansion {
            ExpansionSelector::Uniform => self.neighborhood.random_neighbor(coord, rng),
            ExpansionSelector::Spherical { cdf } => {
                coord.plus(MOORE_OFFSETS[distr::select_cdf(cdf, rng)])
            }
        }
    }

    /// Net growth the expansion site can absorb, by component kind
    ///
    /// Cells and demes may expand only onto an empty site; lineages share
    /// sites and may fill any remaining capacity.
    fn expansion_free_capacity(&self, component: &Component, e_coord: Coord) -> u64 {
        match component {
            Component::Cell(_) | Component::Deme(_) => {
                if self.lattice.is_empty(e_coord) {
                    self.capacity.capacity(e_coord)
                } else {
                    0
                }
            }
            Component::Lineage(_) => self.free_cell_capacity(e_coord),
        }
    }

    fn reconcile_cell(
        &mut self,
        id: ComponentId,
        component: Component,
        daughters: Vec<Component>,
        p_coord: Coord,
        e_coord: Coord,
    ) {
        if component.is_dead() {
            self.lattice.vacate(id);
            self.debit_site(p_coord, 1);
        } else {
            self.components.insert(id, component);
        }

        for daughter in daughters {
            let coord = if self.free_cell_capacity(p_coord) >= 1 {
                p_coord
            } else {
                e_coord
            };
            assert!(
                self.free_cell_capacity(coord) >= 1,
                "no capacity left for a daughter cell"
            );
            self.insert_component(daughter, coord, id.index());
        }
    }

    fn reconcile_lineage(
        &mut self,
        id: ComponentId,
        mut component: Component,
        old_count: u64,
        daughters: Vec<Component>,
        p_coord: Coord,
        e_coord: Coord,
    ) {
        let Component::Lineage(lineage) = &mut component else {
            unreachable!()
        };

        self.apply_count_change(p_coord, old_count, lineage.cell_count);

        if lineage.cell_count == 0 {
            self.lattice.vacate(id);
        } else {
            // Spill any excess above the parent-site capacity onto the
            // expansion site, merging into a same-genotype lineage if one is
            // already there.
            let excess = self
                .cells_at(p_coord)
                .saturating_sub(self.capacity.capacity(p_coord));
            if excess > 0 {
                assert!(
                    excess <= lineage.cell_count,
                    "site over capacity beyond this lineage's own cells"
                );
                let genotype = lineage.genotype;
                let moved = excess;
                lineage.cell_count -= moved;

                let target = self.lattice.occupants(e_coord).into_iter().find(|&cid| {
                    matches!(
                        self.components.get(&cid),
                        Some(Component::Lineage(other)) if other.genotype == genotype
                    )
                });

                self.debit_site(p_coord, moved);
                match target {
                    Some(target_id) => {
                        let Some(Component::Lineage(other)) = self.components.get_mut(&target_id)
                        else {
                            unreachable!()
                        };
                        other.cell_count += moved;
                        self.credit_site(e_coord, moved);
                    }
                    None if lineage.cell_count == 0 => {
                        // The whole lineage moved; relocate instead of cloning.
                        lineage.cell_count = moved;
                        self.lattice.relocate(id, e_coord);
                        self.credit_site(e_coord, moved);
                    }
                    None => {
                        self.insert_component(
                            Component::founder_lineage(genotype, moved),
                            e_coord,
                            id.index(),
                        );
                    }
                }
            }

            if lineage.cell_count == 0 {
                self.lattice.vacate(id);
            } else {
                self.components.insert(id, component);
            }
        }

        // Mutant daughters fill the parent site to capacity, remainder to the
        // expansion site.
        for daughter in daughters {
            let coord = if self.free_cell_capacity(p_coord) >= 1 {
                p_coord
            } else {
                e_coord
            };
            assert!(
                self.free_cell_capacity(coord) >= 1,
                "no capacity left for a daughter lineage"
            );
            self.insert_component(daughter, coord, id.index());
        }
    }

    fn reconcile_deme<R: Rng>(
        &mut self,
        id: ComponentId,
        mut component: Component,
        old_count: u64,
        daughters: Vec<Component>,
        p_coord: Coord,
        e_coord: Coord,
        rng: &mut R,
    ) {
        assert!(daughters.is_empty(), "a deme must not emit offspring");

        let Component::Deme(deme) = &mut component else {
            unreachable!()
        };

        let new_count = deme.cell_count();
        self.apply_count_change(p_coord, old_count, new_count);

        if new_count == 0 {
            self.lattice.vacate(id);
            return;
        }

        let excess = self
            .cells_at(p_coord)
            .saturating_sub(self.capacity.capacity(p_coord));
        if excess > 0 {
            let free = if self.lattice.is_empty(e_coord) {
                self.capacity.capacity(e_coord)
            } else {
                0
            };
            let max_transfer = free.min(new_count - 1);
            assert!(
                excess <= max_transfer,
                "deme split cannot restore the capacity invariant"
            );

            let clone = deme.split(excess, max_transfer, rng);
            let moved = clone.cell_count();
            self.debit_site(p_coord, moved);
            self.insert_component(Component::Deme(clone), e_coord, id.index());
        }

        self.components.insert(id, component);
    }

    /// Register a new component at `coord`, updating ledger and caches
    fn insert_component(&mut self, component: Component, coord: Coord, parent: u64) -> ComponentId {
        // Index zero is reserved for the virtual root of the ancestry ledger.
        self.next_index += 1;
        let id = ComponentId::new(self.next_index);

        let cells = component.cell_count();
        assert!(cells > 0, "inserting an empty component");

        self.ancestry.push(AncestryRecord {
            component: id.index(),
            parent,
        });
        self.lattice.occupy(id, coord);
        self.credit_site(coord, cells);
        self.components.insert(id, component);

        id
    }

    /// Cells the site at `coord` can still accept
    fn free_cell_capacity(&self, coord: Coord) -> u64 {
        self.capacity
            .capacity(coord)
            .saturating_sub(self.cells_at(coord))
    }

    fn apply_count_change(&mut self, coord: Coord, old_count: u64, new_count: u64) {
        if new_count >= old_count {
            self.credit_site(coord, new_count - old_count);
        } else {
            self.debit_site(coord, old_count - new_count);
        }
    }

    fn credit_site(&mut self, coord: Coord, cells: u64) {
        if cells == 0 {
            return;
        }
        let image = self.lattice.image(coord);
        *self.site_cells.entry(image).or_insert(0) += cells;
        self.total_cells += cells;
    }

    fn debit_site(&mut self, coord: Coord, cells: u64) {
        if cells == 0 {
            return;
        }
        let image = self.lattice.image(coord);
        let entry = self
            .site_cells
            .get_mut(&image)
            .expect("debiting an untracked site");
        assert!(*entry >= cells, "site cell-count cache underflow");
        *entry -= cells;
        if *entry == 0 {
            self.site_cells.remove(&image);
        }
        self.total_cells -= cells;
    }

    /// Recompute both caches from scratch and compare with the running values
    fn audit_caches(&self) {
        let mut total = 0u64;
        let mut per_site: HashMap<Coord, u64> = HashMap::new();

        for (id, coord) in self.lattice.iter() {
            let cells = self.components[&id].cell_count();
            total += cells;
            *per_site.entry(self.lattice.image(coord)).or_insert(0) += cells;
        }

        assert_eq!(total, self.total_cells, "total cell-count cache out of sync");
        assert_eq!(per_site, self.site_cells, "site cell-count cache out of sync");
    }

    /// Current time step
    pub fn time_step(&self) -> u32 {
        self.time_step
    }

    /// Total number of cells across all live components
    pub fn total_cell_count(&self) -> u64 {
        self.total_cells
    }

    /// Number of live components
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Component kind populating this tumor
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Neighborhood used for neighbor enumeration
    pub fn neighborhood(&self) -> NeighborhoodType {
        self.neighborhood
    }

    /// Birth and death totals of the most recent step
    pub fn step_growth_count(&self) -> GrowthCount {
        self.step_count
    }

    /// Birth and death totals accumulated over the whole trial
    pub fn cumulative_growth_count(&self) -> GrowthCount {
        self.cumulative_count
    }

    /// Cached number of cells at the site of `coord`
    pub fn cells_at(&self, coord: Coord) -> u64 {
        let image = self.lattice.image(coord);
        self.site_cells.get(&image).copied().unwrap_or(0)
    }

    /// The lattice
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// The capacity model
    pub fn capacity_model(&self) -> &CapacityModel {
        &self.capacity
    }

    /// The genotype arena
    pub fn genotypes(&self) -> &GenotypeArena {
        &self.genotypes
    }

    /// The mutation arena
    pub fn mutations(&self) -> &MutationArena {
        &self.mutations
    }

    /// Step at which the mutation-generation cutoff tripped, if it has
    pub fn mutation_cutoff_step(&self) -> Option<u32> {
        self.generator.tripped_at()
    }

    /// The component ancestry ledger, in creation order
    pub fn ancestry_records(&self) -> &[AncestryRecord] {
        &self.ancestry
    }

    /// Iterate over live components
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components.iter().map(|(&id, c)| (id, c))
    }

    /// Look up a live component
    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(&id)
    }

    /// Cell-count weights of every occupied site, keyed by true coordinates
    ///
    /// Built on demand for geometry and sampling; sampling steps only.
    pub fn occupied_site_weights(&self) -> HashMap<Coord, u64> {
        let mut weights: HashMap<Coord, u64> = HashMap::new();
        for (id, coord) in self.lattice.iter() {
            *weights.entry(coord).or_insert(0) += self.components[&id].cell_count();
        }
        weights
    }
}

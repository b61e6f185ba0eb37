//! Bulk samples and per-mutation variant allele frequencies
//!
//! A bulk sample is a frozen, read-only snapshot of the components inside a
//! breadth-first-expanded region around a surface site. Because genotypes are
//! arena-retained and immutable, a sample stays consistent while the tumor
//! keeps evolving.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};

use crate::sim::component::ComponentId;
use crate::sim::genotype::{GenotypeArena, GenotypeId};
use crate::sim::geometry;
use crate::sim::lattice::Coord;
use crate::sim::mutation::MutationId;
use crate::sim::tumor::Tumor;

/// One genotype group frozen into a sample
#[derive(Debug, Copy, Clone)]
pub struct SampleGroup {
    /// Genotype of the group
    pub genotype: GenotypeId,
    /// Number of sampled cells carrying it
    pub cell_count: u64,
}

/// A frozen bulk sample collected around a surface site
#[derive(Debug, Clone)]
pub struct BulkSample {
    center: Coord,
    groups: Vec<SampleGroup>,
    site_components: Vec<(Coord, ComponentId)>,
    total_cells: u64,
}

impl BulkSample {
    /// Collect a sample by breadth-first expansion from `center`
    ///
    /// Occupied neighbor sites are visited in breadth-first order, adding all
    /// of their occupants, until at least `target_size` cells have been
    /// accumulated or the connected region is exhausted.
    pub fn collect(tumor: &Tumor, center: Coord, target_size: u64) -> Self {
        let lattice = tumor.lattice();
        let neighborhood = tumor.neighborhood();

        let mut groups = Vec::new();
        let mut site_components = Vec::new();
        let mut total_cells = 0u64;

        let mut visited: HashSet<Coord> = HashSet::new();
        let mut queue: VecDeque<Coord> = VecDeque::new();
        visited.insert(lattice.image(center));
        queue.push_back(center);

        while let Some(site) = queue.pop_front() {
            for id in lattice.occupants(site) {
                let component = tumor
                    .component(id)
                    .expect("lattice occupant is not a live component");
                site_components.push((site, id));
                for (genotype, cell_count) in component.genotype_groups() {
                    groups.push(SampleGroup { genotype, cell_count });
                    total_cells += cell_count;
                }
            }

            if total_cells >= target_size {
                break;
            }

            for neighbor in neighborhood.neighbors(site) {
                if tumor.cells_at(neighbor) > 0 && visited.insert(lattice.image(neighbor)) {
                    queue.push_back(neighbor);
                }
            }
        }

        Self {
            center,
            groups,
            site_components,
            total_cells,
        }
    }

    /// Collect a sample around the surface site in `direction`
    ///
    /// Returns `None` when the surface walk finds no occupied site.
    pub fn collect_radial(
        tumor: &Tumor,
        center_of_mass: [f64; 3],
        direction: [f64; 3],
        target_size: u64,
        empty_shell: u64,
    ) -> Option<Self> {
        let center = geometry::surface_site(tumor, center_of_mass, direction, empty_shell)?;
        Some(Self::collect(tumor, center, target_size))
    }

    /// The surface site the sample grew from
    pub fn center(&self) -> Coord {
        self.center
    }

    /// Number of cells in the sample
    pub fn total_cell_count(&self) -> u64 {
        self.total_cells
    }

    /// Number of components the sample was drawn from
    pub fn component_count(&self) -> usize {
        self.site_components.len()
    }

    /// The frozen genotype groups
    pub fn groups(&self) -> &[SampleGroup] {
        &self.groups
    }

    /// The accumulation multimap: every `(site, component)` pair visited
    pub fn site_components(&self) -> &[(Coord, ComponentId)] {
        &self.site_components
    }

    /// Per-mutation cell counts and frequencies over the sample
    pub fn vaf(&self, genotypes: &GenotypeArena) -> Vaf {
        let mut counts: HashMap<MutationId, u64> = HashMap::new();
        for group in &self.groups {
            genotypes.tally_accumulated(group.genotype, group.cell_count, &mut counts);
        }

        Vaf {
            total_cells: self.total_cells,
            counts,
        }
    }

    /// Most recent common ancestor genotype of the sampled cells
    pub fn ancestor_genotype(&self, genotypes: &GenotypeArena) -> Option<GenotypeId> {
        let ids: Vec<GenotypeId> = self.groups.iter().map(|g| g.genotype).collect();
        genotypes.ancestor(&ids)
    }
}

/// Variant allele frequencies of a sample
#[derive(Debug, Clone)]
pub struct Vaf {
    total_cells: u64,
    counts: HashMap<MutationId, u64>,
}

/// Order statistics of a frequency vector
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VafSummary {
    /// Number of distinct mutations observed
    pub distinct_count: u64,
    /// Smallest frequency
    pub min: f64,
    /// Lower quartile
    pub q1: f64,
    /// Median frequency
    pub median: f64,
    /// Mean frequency
    pub mean: f64,
    /// Upper quartile
    pub q3: f64,
    /// Largest frequency
    pub max: f64,
}

impl Vaf {
    /// Number of cells the frequencies are normalized by
    pub fn total_cell_count(&self) -> u64 {
        self.total_cells
    }

    /// Frequency of mutation `m`, zero if unobserved
    pub fn frequency(&self, m: MutationId) -> f64 {
        match self.counts.get(&m) {
            Some(&count) => count as f64 / self.total_cells as f64,
            None => 0.0,
        }
    }

    /// All observed mutations, ascending by index
    pub fn distinct_mutations(&self) -> Vec<MutationId> {
        let mut ids: Vec<MutationId> = self.counts.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Mutations carried by every cell of the sample
    pub fn clonal_mutations(&self) -> Vec<MutationId> {
        let mut ids: Vec<MutationId> = self
            .counts
            .iter()
            .filter(|&(_, &count)| count == self.total_cells)
            .map(|(&m, _)| m)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// The observed mutations as a set
    pub fn mutation_set(&self) -> HashSet<MutationId> {
        self.counts.keys().copied().collect()
    }

    /// The clonal mutations as a set
    pub fn clonal_set(&self) -> HashSet<MutationId> {
        self.clonal_mutations().into_iter().collect()
    }

    /// Order statistics of the frequency vector
    ///
    /// Returns `None` when no mutation was observed.
    pub fn summary(&self) -> Option<VafSummary> {
        if self.counts.is_empty() {
            return None;
        }

        let mut frequencies: Vec<f64> = self
            .counts
            .values()
            .map(|&count| count as f64 / self.total_cells as f64)
            .collect();
        frequencies.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap());

        let mean = frequencies.iter().sum::<f64>() / frequencies.len() as f64;

        Some(VafSummary {
            distinct_count: frequencies.len() as u64,
            min: frequencies[0],
            q1: quantile(&frequencies, 0.25),
            median: quantile(&frequencies, 0.5),
            mean,
            q3: quantile(&frequencies, 0.75),
            max: frequencies[frequencies.len() - 1],
        })
    }
}

/// Linear-interpolation quantile of sorted `values`
fn quantile(values: &[f64], p: f64) -> f64 {
    assert!(!values.is_empty());
    let rank = p * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;

    values[lo] * (1.0 - weight) + values[hi] * weight
}

/// The symmetric distance between two mutation sets
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MutationalDistance {
    /// Number of mutations present in both sets
    pub shared: u64,
    /// Size of the symmetric difference
    pub int_distance: u64,
    /// Symmetric difference normalized by the total set sizes
    pub frac_distance: f64,
}

impl MutationalDistance {
    /// Distance between mutation sets `a` and `b`
    pub fn between(a: &HashSet<MutationId>, b: &HashSet<MutationId>) -> Self {
        let shared = a.intersection(b).count() as u64;
        let int_distance = a.len() as u64 + b.len() as u64 - 2 * shared;
        let denominator = a.len() + b.len();
        let frac_distance = if denominator == 0 {
            0.0
        } else {
            int_distance as f64 / denominator as f64
        };

        Self {
            shared,
            int_distance,
            frac_distance,
        }
    }
}

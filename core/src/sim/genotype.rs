//! The append-only genotype ancestry DAG
//!
//! Genotypes are nodes in an arena with upward-only parent references. A node
//! owns the small set of mutations minted at its creation; the accumulated set
//! is the union along the parent chain and is materialized on demand. Nodes are
//! never mutated after creation, so samples may hold genotype ids indefinitely
//! while the simulation continues.

use hashbrown::HashMap;
use serde::Serialize;

use crate::sim::mutation::{MutationArena, MutationId, MutationKind};

/// Identifier of a genotype node in the arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GenotypeId(u32);

impl GenotypeId {
    /// Numeric index of the genotype
    pub fn index(self) -> u32 {
        self.0
    }
}

/// One node of the ancestry DAG
#[derive(Debug, Clone)]
struct GenotypeNode {
    parent: Option<GenotypeId>,
    original: Vec<MutationId>,
    /// Number of ancestors above this node
    depth: u32,
    /// Product of `1 + s` over all accumulated scalar mutations
    fitness_factor: f64,
}

/// Arena storage for the genotype DAG
#[derive(Debug, Default)]
pub struct GenotypeArena {
    nodes: Vec<GenotypeNode>,
}

/// Per-kind counts of accumulated mutations
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct KindCounts {
    /// Accumulated scalar selective mutations
    pub scalar: u64,
    /// Accumulated neutral mutations
    pub neutral: u64,
    /// Accumulated neoantigen mutations
    pub neoantigen: u64,
}

impl KindCounts {
    /// Total accumulated mutations of all kinds
    pub fn total(&self) -> u64 {
        self.scalar + self.neutral + self.neoantigen
    }
}

impl GenotypeArena {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of genotypes created so far
    pub fn len(&self) -> u64 {
        self.nodes.len() as u64
    }

    /// Whether no genotype has been created yet
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a root genotype carrying `original` mutations
    pub fn founder(
        &mut self,
        original: Vec<MutationId>,
        mutations: &MutationArena,
    ) -> GenotypeId {
        let fitness_factor = Self::factor_of(&original, mutations);
        self.push(GenotypeNode {
            parent: None,
            original,
            depth: 0,
            fitness_factor,
        })
    }

    /// Create the daughter genotype of `parent` carrying `new_mutations`
    ///
    /// The originality invariant holds by construction: newly minted mutations
    /// cannot already appear on any ancestor.
    pub fn for_daughter(
        &mut self,
        parent: GenotypeId,
        new_mutations: Vec<MutationId>,
        mutations: &MutationArena,
    ) -> GenotypeId {
        let parent_node = &self.nodes[parent.0 as usize];
        let depth = parent_node.depth + 1;
        let fitness_factor =
            parent_node.fitness_factor * Self::factor_of(&new_mutations, mutations);

        self.push(GenotypeNode {
            parent: Some(parent),
            original: new_mutations,
            depth,
            fitness_factor,
        })
    }

    fn push(&mut self, node: GenotypeNode) -> GenotypeId {
        let index = u32::try_from(self.nodes.len()).expect("genotype index overflow");
        self.nodes.push(node);
        GenotypeId(index)
    }

    fn factor_of(ids: &[MutationId], mutations: &MutationArena) -> f64 {
        ids.iter()
            .map(|&id| mutations.get(id).fitness_factor())
            .product()
    }

    /// Parent of `id`, `None` for a founder
    pub fn parent(&self, id: GenotypeId) -> Option<GenotypeId> {
        self.nodes[id.0 as usize].parent
    }

    /// Number of ancestors above `id`
    pub fn depth(&self, id: GenotypeId) -> u32 {
        self.nodes[id.0 as usize].depth
    }

    /// Multiplicative birth-rate factor accumulated along the ancestry of `id`
    pub fn fitness_factor(&self, id: GenotypeId) -> f64 {
        self.nodes[id.0 as usize].fitness_factor
    }

    /// Mutations minted when `id` was created
    pub fn original_mutations(&self, id: GenotypeId) -> &[MutationId] {
        &self.nodes[id.0 as usize].original
    }

    /// Iterate over `id` and its ancestors, youngest first
    pub fn ancestry(&self, id: GenotypeId) -> impl Iterator<Item = GenotypeId> + '_ {
        let mut current = Some(id);
        std::iter::from_fn(move || {
            let this = current?;
            current = self.parent(this);
            Some(this)
        })
    }

    /// All mutations along the ancestry of `id`, oldest first
    pub fn accumulated_mutations(&self, id: GenotypeId) -> Vec<MutationId> {
        let chain: Vec<GenotypeId> = self.ancestry(id).collect();
        let mut accumulated = Vec::new();
        for &node in chain.iter().rev() {
            accumulated.extend_from_slice(self.original_mutations(node));
        }
        accumulated
    }

    /// Mutations inherited by `id`: the accumulated set of its parent
    pub fn inherited_mutations(&self, id: GenotypeId) -> Vec<MutationId> {
        match self.parent(id) {
            Some(parent) => self.accumulated_mutations(parent),
            None => Vec::new(),
        }
    }

    /// Per-kind counts of the accumulated mutations of `id`
    pub fn kind_counts(&self, id: GenotypeId, mutations: &MutationArena) -> KindCounts {
        let mut counts = KindCounts::default();
        for node in self.ancestry(id) {
            for &m in self.original_mutations(node) {
                match mutations.kind(m) {
                    MutationKind::Scalar => counts.scalar += 1,
                    MutationKind::Neutral => counts.neutral += 1,
                    MutationKind::Neoantigen => counts.neoantigen += 1,
                }
            }
        }
        counts
    }

    /// Whether any accumulated mutation of `id` is of `kind`
    pub fn carries_kind(&self, id: GenotypeId, kind: MutationKind, mutations: &MutationArena) -> bool {
        self.ancestry(id).any(|node| {
            self.original_mutations(node)
                .iter()
                .any(|&m| mutations.kind(m) == kind)
        })
    }

    /// Most recent common ancestor of the given genotypes
    ///
    /// Returns the deepest genotype whose accumulated set is contained in every
    /// input's accumulated set, or `None` when the inputs share no ancestor.
    /// `ancestor(&[g])` and `ancestor(&[g, g])` both return `g`.
    pub fn ancestor(&self, genotypes: &[GenotypeId]) -> Option<GenotypeId> {
        let (&first, rest) = genotypes.split_first()?;
        let mut mrca = first;

        for &other in rest {
            mrca = self.ancestor_pair(mrca, other)?;
        }

        Some(mrca)
    }

    /// Most recent common ancestor of two genotypes
    fn ancestor_pair(&self, a: GenotypeId, b: GenotypeId) -> Option<GenotypeId> {
        let mut a = a;
        let mut b = b;

        // Walk the deeper chain up until the depths agree, then walk in step.
        while self.depth(a) > self.depth(b) {
            a = self.parent(a)?;
        }
        while self.depth(b) > self.depth(a) {
            b = self.parent(b)?;
        }
        while a != b {
            a = self.parent(a)?;
            b = self.parent(b)?;
        }

        Some(a)
    }

    /// Tally `weight` cells onto every accumulated mutation of `id`
    ///
    /// Used by bulk-sample VAF computation; one chain walk per distinct
    /// genotype in the sample.
    pub fn tally_accumulated(
        &self,
        id: GenotypeId,
        weight: u64,
        tally: &mut HashMap<MutationId, u64>,
    ) {
        for node in self.ancestry(id) {
            for &m in self.original_mutations(node) {
                *tally.entry(m).or_insert(0) += weight;
            }
        }
    }
}

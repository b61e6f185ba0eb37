use rand::SeedableRng;
use rand_pcg::Pcg64;

use tumor_core::cfg::{CoeffType, MutationConfig, RateType};
use tumor_core::sim::component::{AdvanceCtx, Component, LocalEnv};
use tumor_core::sim::genotype::GenotypeArena;
use tumor_core::sim::growth::GrowthRate;
use tumor_core::sim::mutation::{
    CappedMutationGenerator, MutationArena, MutationGenerator,
};

struct Scope {
    generator: CappedMutationGenerator,
    genotypes: GenotypeArena,
    mutations: MutationArena,
}

impl Scope {
    fn silent() -> Self {
        Self {
            generator: CappedMutationGenerator::new(MutationGenerator::silent(), None, None),
            genotypes: GenotypeArena::new(),
            mutations: MutationArena::new(),
        }
    }

    fn neutral(rate: f64) -> Self {
        let cfg = MutationConfig {
            neutral_rate_type: RateType::Poisson,
            neutral_mean_rate: rate,
            selective_rate_type: RateType::Poisson,
            selective_mean_rate: 0.0,
            selection_coeff: 0.0,
            selection_coeff_type: CoeffType::Delta,
            neoantigen_rate_type: RateType::Poisson,
            neoantigen_mean_rate: 0.0,
            max_mutation_count: None,
            max_generation_step: None,
        };
        Self {
            generator: CappedMutationGenerator::from_config(&cfg),
            genotypes: GenotypeArena::new(),
            mutations: MutationArena::new(),
        }
    }

    fn ctx(&mut self) -> AdvanceCtx<'_> {
        AdvanceCtx {
            generator: &mut self.generator,
            genotypes: &mut self.genotypes,
            mutations: &mut self.mutations,
            time_step: 1,
            sampling_limit: 10,
        }
    }
}

fn env(birth: f64, death: f64, capacity: u64) -> LocalEnv {
    LocalEnv {
        growth_capacity: capacity,
        growth_rate: GrowthRate::new(birth, death).unwrap(),
    }
}

#[test]
fn a_cell_divides_only_with_capacity() {
    let mut scope = Scope::silent();
    let genotype = scope.genotypes.founder(Vec::new(), &scope.mutations);
    let mut rng = Pcg64::seed_from_u64(3);

    let mut cell = Component::founder_cell(genotype);
    let advancement = cell.advance(&env(1.0, 0.0, 1), &mut scope.ctx(), &mut rng);
    assert_eq!(advancement.count.births, 1);
    assert_eq!(advancement.daughters.len(), 1);
    assert_eq!(advancement.daughters[0].cell_count(), 1);
    // Without new mutations the daughter shares the parent genotype.
    assert_eq!(
        advancement.daughters[0].genotype_groups(),
        vec![(genotype, 1)]
    );

    let advancement = cell.advance(&env(1.0, 0.0, 0), &mut scope.ctx(), &mut rng);
    assert_eq!(advancement.count.births, 0);
    assert!(advancement.daughters.is_empty());
    assert!(!cell.is_dead());
}

#[test]
fn a_dying_cell_empties_itself() {
    let mut scope = Scope::silent();
    let genotype = scope.genotypes.founder(Vec::new(), &scope.mutations);
    let mut rng = Pcg64::seed_from_u64(5);

    let mut cell = Component::founder_cell(genotype);
    let advancement = cell.advance(&env(0.0, 1.0, 10), &mut scope.ctx(), &mut rng);

    assert_eq!(advancement.count.deaths, 1);
    assert!(cell.is_dead());
    assert_eq!(cell.cell_count(), 0);
}

#[test]
fn lineage_daughters_carry_one_cell_and_a_child_genotype() {
    let mut scope = Scope::neutral(0.5);
    let genotype = scope.genotypes.founder(Vec::new(), &scope.mutations);
    let mut rng = Pcg64::seed_from_u64(7);

    let mut lineage = Component::founder_lineage(genotype, 1_000);
    let advancement = lineage.advance(&env(1.0, 0.0, 2_000), &mut scope.ctx(), &mut rng);

    assert_eq!(advancement.count.births, 1_000);
    assert!(!advancement.daughters.is_empty());

    let daughter_cells: u64 = advancement
        .daughters
        .iter()
        .map(Component::cell_count)
        .sum();
    assert!(advancement.daughters.iter().all(|d| d.cell_count() == 1));
    assert_eq!(lineage.cell_count() + daughter_cells, 2_000);

    for daughter in &advancement.daughters {
        let groups = daughter.genotype_groups();
        let (child, _) = groups[0];
        assert_eq!(scope.genotypes.parent(child), Some(genotype));
        assert_eq!(scope.genotypes.original_mutations(child).len(), 1);
    }
}

#[test]
fn lineage_growth_respects_the_capacity_cap() {
    let mut scope = Scope::silent();
    let genotype = scope.genotypes.founder(Vec::new(), &scope.mutations);
    let mut rng = Pcg64::seed_from_u64(11);

    let mut lineage = Component::founder_lineage(genotype, 1_000);
    let advancement = lineage.advance(&env(1.0, 0.0, 300), &mut scope.ctx(), &mut rng);

    assert_eq!(advancement.count.births, 300);
    assert_eq!(lineage.cell_count(), 1_300);
}

#[test]
fn demes_never_emit_daughters() {
    let mut scope = Scope::neutral(0.1);
    let genotype = scope.genotypes.founder(Vec::new(), &scope.mutations);
    let mut rng = Pcg64::seed_from_u64(13);

    let mut deme = Component::founder_deme(genotype, 500);
    for _ in 0..5 {
        let advancement = deme.advance(&env(0.4, 0.2, 10_000), &mut scope.ctx(), &mut rng);
        assert!(advancement.daughters.is_empty());
    }

    // Mutations created new internal members instead of daughters.
    if scope.mutations.len() > 0 {
        assert!(deme.genotype_groups().len() > 1);
    }
    let total: u64 = deme.genotype_groups().iter().map(|&(_, n)| n).sum();
    assert_eq!(total, deme.cell_count());
}

#[test]
fn deme_split_honors_both_bounds() {
    for &(min, max, seed) in &[(1u64, 1u64, 17u64), (100, 300, 19), (50, 50, 23)] {
        let mut scope = Scope::neutral(0.2);
        let genotype = scope.genotypes.founder(Vec::new(), &scope.mutations);
        let mut rng = Pcg64::seed_from_u64(seed);

        // Grow a heterogeneous deme first.
        let mut component = Component::founder_deme(genotype, 800);
        for _ in 0..3 {
            component.advance(&env(0.5, 0.0, 100_000), &mut scope.ctx(), &mut rng);
        }

        let Component::Deme(mut deme) = component else {
            unreachable!()
        };

        let total = deme.cell_count();
        let clone = deme.split(min, max, &mut rng);
        let moved = clone.cell_count();

        assert!(moved >= min && moved <= max);
        assert_eq!(deme.cell_count() + moved, total);
        assert!(deme.cell_count() >= 1);

        let clone_total: u64 = clone.members().iter().map(|m| m.cell_count).sum();
        assert_eq!(clone_total, moved);
    }
}

use approx::assert_relative_eq;
use hashbrown::HashSet;

use tumor_core::sim::genotype::GenotypeArena;
use tumor_core::sim::mutation::{MutationArena, MutationId, MutationKind};
use tumor_core::sim::sample::MutationalDistance;

/// Mint `count` mutations of one kind
fn mint(arena: &mut MutationArena, kind: MutationKind, s: f64, count: usize) -> Vec<MutationId> {
    (0..count).map(|_| arena.mint(kind, s, 0)).collect()
}

#[test]
fn mutation_indices_increase_strictly() {
    let mut mutations = MutationArena::new();
    let ids = mint(&mut mutations, MutationKind::Neutral, 0.0, 50);

    for pair in ids.windows(2) {
        assert!(pair[0].index() < pair[1].index());
    }
    assert_eq!(mutations.len(), 50);
    assert_eq!(mutations.count_of(MutationKind::Neutral), 50);
    assert_eq!(mutations.count_of(MutationKind::Scalar), 0);
}

#[test]
fn accumulated_sets_nest_along_the_ancestry() {
    let mut mutations = MutationArena::new();
    let mut genotypes = GenotypeArena::new();

    let founder_muts = mint(&mut mutations, MutationKind::Neutral, 0.0, 3);
    let founder = genotypes.founder(founder_muts.clone(), &mutations);

    let child_muts = mint(&mut mutations, MutationKind::Neoantigen, 0.0, 2);
    let child = genotypes.for_daughter(founder, child_muts.clone(), &mutations);

    let founder_acc: HashSet<_> = genotypes.accumulated_mutations(founder).into_iter().collect();
    let child_acc: HashSet<_> = genotypes.accumulated_mutations(child).into_iter().collect();
    let child_orig: HashSet<_> = genotypes.original_mutations(child).iter().copied().collect();
    let child_inherited: HashSet<_> =
        genotypes.inherited_mutations(child).into_iter().collect();

    // accumulated(child) contains accumulated(parent)
    assert!(child_acc.is_superset(&founder_acc));
    // original(child) is disjoint from accumulated(parent)
    assert!(child_orig.is_disjoint(&founder_acc));
    // accumulated = inherited union original
    assert_eq!(child_inherited, founder_acc);
    assert_eq!(
        child_acc,
        child_inherited
            .union(&child_orig)
            .copied()
            .collect::<HashSet<_>>()
    );

    assert_eq!(genotypes.depth(founder), 0);
    assert_eq!(genotypes.depth(child), 1);
}

#[test]
fn fitness_factor_multiplies_scalar_coefficients() {
    let mut mutations = MutationArena::new();
    let mut genotypes = GenotypeArena::new();

    let founder = genotypes.founder(Vec::new(), &mutations);
    assert_relative_eq!(genotypes.fitness_factor(founder), 1.0);

    let s1 = mutations.mint(MutationKind::Scalar, 0.1, 1);
    let s2 = mutations.mint(MutationKind::Scalar, 0.2, 2);
    let neutral = mutations.mint(MutationKind::Neutral, 0.0, 2);

    let child = genotypes.for_daughter(founder, vec![s1], &mutations);
    let grandchild = genotypes.for_daughter(child, vec![s2, neutral], &mutations);

    assert_relative_eq!(genotypes.fitness_factor(child), 1.1);
    assert_relative_eq!(genotypes.fitness_factor(grandchild), 1.1 * 1.2);

    let counts = genotypes.kind_counts(grandchild, &mutations);
    assert_eq!(counts.scalar, 2);
    assert_eq!(counts.neutral, 1);
    assert_eq!(counts.neoantigen, 0);
    assert_eq!(counts.total(), 3);
}

#[test]
fn ancestor_finds_the_most_recent_common_node() {
    let mut mutations = MutationArena::new();
    let mut genotypes = GenotypeArena::new();

    let founder = genotypes.founder(mint(&mut mutations, MutationKind::Neutral, 0.0, 2), &mutations);

    // Two private chains of depth three off the founder.
    let mut left = founder;
    let mut right = founder;
    for _ in 0..3 {
        let lm = mutations.mint(MutationKind::Neutral, 0.0, 1);
        let rm = mutations.mint(MutationKind::Neutral, 0.0, 1);
        left = genotypes.for_daughter(left, vec![lm], &mutations);
        right = genotypes.for_daughter(right, vec![rm], &mutations);
    }

    assert_eq!(genotypes.ancestor(&[left, right]), Some(founder));
    assert_eq!(genotypes.ancestor(&[left, left]), Some(left));
    assert_eq!(genotypes.ancestor(&[founder, left]), Some(founder));
    assert_eq!(genotypes.ancestor(&[left, right, founder]), Some(founder));
    assert_eq!(genotypes.ancestor(&[]), None);

    // Unrelated founders share no ancestor.
    let other = genotypes.founder(Vec::new(), &mutations);
    assert_eq!(genotypes.ancestor(&[left, other]), None);
}

#[test]
fn diverged_lineages_have_the_expected_mutational_distance() {
    let mut mutations = MutationArena::new();
    let mut genotypes = GenotypeArena::new();

    let founder_count = 3;
    let founder = genotypes.founder(
        mint(&mut mutations, MutationKind::Neutral, 0.0, founder_count),
        &mutations,
    );

    // Each branch accumulates five private mutations.
    let mut left = founder;
    let mut right = founder;
    for _ in 0..5 {
        let lm = mutations.mint(MutationKind::Neutral, 0.0, 1);
        left = genotypes.for_daughter(left, vec![lm], &mutations);
        let rm = mutations.mint(MutationKind::Neutral, 0.0, 1);
        right = genotypes.for_daughter(right, vec![rm], &mutations);
    }

    let left_set: HashSet<_> = genotypes.accumulated_mutations(left).into_iter().collect();
    let right_set: HashSet<_> = genotypes.accumulated_mutations(right).into_iter().collect();

    let distance = MutationalDistance::between(&left_set, &right_set);
    assert_eq!(distance.shared, founder_count as u64);
    assert_eq!(distance.int_distance, 10);
    assert_relative_eq!(distance.frac_distance, 10.0 / 16.0);

    // Symmetry and identity.
    let reverse = MutationalDistance::between(&right_set, &left_set);
    assert_eq!(distance, reverse);
    let same = MutationalDistance::between(&left_set, &left_set);
    assert_eq!(same.int_distance, 0);
    assert_relative_eq!(same.frac_distance, 0.0);
}

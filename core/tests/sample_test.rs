use tumor_core::cfg::{PropertySet, SimConfig};
use tumor_core::sim::geometry;
use tumor_core::sim::lattice::Coord;
use tumor_core::sim::sample::BulkSample;
use tumor_core::sim::TrialHandler;

fn sim_config(overrides: &[(&str, &str)]) -> SimConfig {
    let mut props = PropertySet::new();
    props.set("tumor.driver.componentType", "CELL");
    props.set("tumor.driver.spatialType", "POINT");
    props.set("tumor.driver.initialSize", "1");
    props.set("tumor.driver.maxStepCount", "100");
    props.set("tumor.driver.maxTumorSize", "1000000");
    props.set("tumor.driver.randomSeed", "20260801");
    props.set("tumor.growth.birthRate", "0.55");
    props.set("tumor.growth.deathRate", "0.45");

    for (key, value) in overrides {
        props.set(key, value);
    }

    SimConfig::from_properties(&props).expect("test configuration must validate")
}

fn run_trial(cfg: SimConfig) -> TrialHandler {
    let mut handler = TrialHandler::new(cfg).expect("founders must seed");
    loop {
        handler.step();
        if !handler.should_continue() {
            break;
        }
    }
    handler
}

#[test]
fn point_sample_without_mutations_is_empty() {
    let cfg = sim_config(&[
        ("tumor.driver.initialSize", "2"),
        ("tumor.driver.maxStepCount", "1"),
        ("tumor.growth.birthRate", "0"),
        ("tumor.growth.deathRate", "0"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    let sample = BulkSample::collect(tumor, Coord::origin(), 10);
    assert_eq!(sample.total_cell_count(), 2);
    assert_eq!(sample.component_count(), 2);

    let vaf = sample.vaf(tumor.genotypes());
    assert!(vaf.distinct_mutations().is_empty());
    assert!(vaf.clonal_mutations().is_empty());
    assert!(vaf.summary().is_none());

    // All sampled cells descend from the single founder genotype.
    assert!(sample.ancestor_genotype(tumor.genotypes()).is_some());
}

#[test]
fn bulk_sample_freezes_a_consistent_snapshot() {
    let cfg = sim_config(&[
        ("tumor.driver.spatialType", "LATTICE"),
        ("tumor.driver.maxStepCount", "300"),
        ("tumor.driver.maxTumorSize", "1500"),
        ("tumor.growth.birthRate", "0.55"),
        ("tumor.growth.deathRate", "0"),
        ("tumor.capacity.siteCapacity", "1"),
        ("tumor.lattice.periodLength", "64"),
        ("tumor.mutation.neutralMeanRate", "0.05"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();
    assert!(tumor.total_cell_count() >= 1_500);

    let weights = tumor.occupied_site_weights();
    let dimension = geometry::measure(&weights).unwrap();

    let sample = BulkSample::collect_radial(
        tumor,
        dimension.center_of_mass,
        [1.0, 0.0, 0.0],
        100,
        3,
    )
    .expect("a grown tumor has a surface in every direction");

    assert!(sample.total_cell_count() >= 100);
    assert!(tumor.cells_at(sample.center()) > 0);

    let group_total: u64 = sample.groups().iter().map(|g| g.cell_count).sum();
    assert_eq!(group_total, sample.total_cell_count());
    assert!(!sample.site_components().is_empty());

    let vaf = sample.vaf(tumor.genotypes());
    let distinct = vaf.distinct_mutations();
    let clonal = vaf.clonal_mutations();

    for &m in &distinct {
        let f = vaf.frequency(m);
        assert!(f > 0.0 && f <= 1.0);
    }
    assert!(clonal.iter().all(|m| distinct.contains(m)));

    if let Some(summary) = vaf.summary() {
        assert!(summary.min <= summary.q1);
        assert!(summary.q1 <= summary.median);
        assert!(summary.median <= summary.q3);
        assert!(summary.q3 <= summary.max);
        assert!(summary.mean >= summary.min && summary.mean <= summary.max);
        assert_eq!(summary.distinct_count, distinct.len() as u64);
    }

    // Everything in the sample shares the founder as a common ancestor.
    assert!(sample.ancestor_genotype(tumor.genotypes()).is_some());
}

#[test]
fn sample_bfs_stops_once_the_target_is_reached() {
    let cfg = sim_config(&[
        ("tumor.driver.spatialType", "LATTICE"),
        ("tumor.driver.maxStepCount", "300"),
        ("tumor.driver.maxTumorSize", "1000"),
        ("tumor.growth.birthRate", "0.55"),
        ("tumor.growth.deathRate", "0"),
        ("tumor.capacity.siteCapacity", "1"),
        ("tumor.lattice.periodLength", "64"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    let small = BulkSample::collect(tumor, Coord::origin(), 30);
    let large = BulkSample::collect(tumor, Coord::origin(), 400);

    assert!(small.total_cell_count() >= 30);
    // One breadth-first shell of single cells cannot overshoot by much.
    assert!(small.total_cell_count() <= 30 + 27);
    assert!(large.total_cell_count() >= 400);
    assert!(large.total_cell_count() > small.total_cell_count());
}

use hashbrown::HashMap;

use rand::SeedableRng;
use rand_pcg::Pcg64;

use tumor_core::cfg::{PropertySet, SimConfig};
use tumor_core::sim::lattice::Coord;
use tumor_core::sim::{TrialHandler, Tumor};

/// Build a validated `SimConfig` from defaults plus `overrides`
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

/// Drive a trial to termination, returning the handler
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

/// Per-site cell totals keyed by image coordinate must respect capacity and
/// match the cache
fn assert_capacity_invariant(tumor: &Tumor, capacity: u64) {
    let mut by_image: HashMap<Coord, u64> = HashMap::new();
    for (coord, cells) in tumor.occupied_site_weights() {
        *by_image
            .entry(coord.image(tumor.lattice().period() as i64))
            .or_insert(0) += cells;
    }

    for (&image, &cells) in &by_image {
        assert!(cells <= capacity, "site {:?} holds {} cells", image, cells);
        assert_eq!(cells, tumor.cells_at(image));
    }

    let total: u64 = by_image.values().sum();
    assert_eq!(total, tumor.total_cell_count());
}

/// Every live component is locatable and listed among its site's occupants
fn assert_lattice_invariant(tumor: &Tumor) {
    for (id, component) in tumor.components() {
        assert!(component.cell_count() >= 1);
        let coord = tumor.lattice().locate(id).expect("live component located");
        assert!(tumor.lattice().occupants(coord).contains(&id));
    }
}

#[test]
fn trivial_point_trial_holds_steady() {
    let cfg = sim_config(&[
        ("tumor.driver.initialSize", "10"),
        ("tumor.driver.maxStepCount", "1"),
        ("tumor.driver.maxTumorSize", "10"),
        ("tumor.growth.birthRate", "0"),
        ("tumor.growth.deathRate", "0"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    assert_eq!(tumor.time_step(), 1);
    assert_eq!(tumor.total_cell_count(), 10);
    assert_eq!(tumor.component_count(), 10);
    assert_eq!(tumor.cumulative_growth_count().births, 0);
    assert_eq!(tumor.cumulative_growth_count().deaths, 0);
}

#[test]
fn pure_growth_lineage_doubles_exactly() {
    let cfg = sim_config(&[
        ("tumor.driver.componentType", "LINEAGE"),
        ("tumor.driver.maxStepCount", "10"),
        ("tumor.growth.birthRate", "1"),
        ("tumor.growth.deathRate", "0"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    // Both the explicit and the semi-stochastic regime are exact for b = 1.
    assert_eq!(tumor.time_step(), 10);
    assert_eq!(tumor.total_cell_count(), 1 << 10);
    assert_eq!(tumor.cumulative_growth_count().births, (1 << 10) - 1);
    assert_eq!(tumor.component_count(), 1);
}

#[test]
fn pure_death_lineage_goes_extinct() {
    let cfg = sim_config(&[
        ("tumor.driver.componentType", "LINEAGE"),
        ("tumor.driver.initialSize", "100"),
        ("tumor.driver.maxStepCount", "10000"),
        ("tumor.growth.birthRate", "0"),
        ("tumor.growth.deathRate", "0.5"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    // The trial must end through the extinction branch, well before the
    // step bound.
    assert_eq!(tumor.total_cell_count(), 0);
    assert_eq!(tumor.component_count(), 0);
    assert!(tumor.time_step() < 10_000);
}

#[test]
fn size_bound_terminates_the_trial() {
    let cfg = sim_config(&[
        ("tumor.driver.componentType", "LINEAGE"),
        ("tumor.driver.maxStepCount", "10000"),
        ("tumor.driver.maxTumorSize", "10000"),
        ("tumor.growth.birthRate", "1"),
        ("tumor.growth.deathRate", "0"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    // Doubling from one cell crosses 10^4 on the fourteenth step.
    assert_eq!(tumor.time_step(), 14);
    assert!(tumor.total_cell_count() >= 10_000);
}

#[test]
fn founder_cells_spread_over_distinct_sites() {
    let cfg = sim_config(&[
        ("tumor.driver.spatialType", "LATTICE"),
        ("tumor.driver.initialSize", "5"),
        ("tumor.driver.maxTumorSize", "100"),
        ("tumor.capacity.siteCapacity", "1"),
        ("tumor.lattice.periodLength", "32"),
    ]);
    let mut rng = Pcg64::seed_from_u64(1);
    let tumor = Tumor::seed(&cfg, &mut rng).unwrap();

    assert_eq!(tumor.component_count(), 5);
    assert_eq!(tumor.total_cell_count(), 5);

    let sites: Vec<Coord> = tumor
        .components()
        .map(|(id, _)| tumor.lattice().locate(id).unwrap())
        .collect();
    let mut deduped = sites.clone();
    deduped.sort_unstable();
    deduped.dedup();
    assert_eq!(deduped.len(), 5);

    // The founder chain stays near the origin.
    for site in sites {
        assert!(site.x.abs() <= 4 && site.y.abs() <= 4 && site.z.abs() <= 4);
    }
    assert_lattice_invariant(&tumor);
}

#[test]
fn cell_lattice_growth_keeps_single_occupancy() {
    let cfg = sim_config(&[
        ("tumor.driver.spatialType", "LATTICE"),
        ("tumor.driver.maxStepCount", "200"),
        ("tumor.driver.maxTumorSize", "2000"),
        ("tumor.growth.birthRate", "0.55"),
        ("tumor.growth.deathRate", "0"),
        ("tumor.capacity.siteCapacity", "1"),
        ("tumor.lattice.periodLength", "64"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    assert!(tumor.total_cell_count() >= 2_000);
    assert_capacity_invariant(tumor, 1);
    assert_lattice_invariant(tumor);
}

#[test]
fn lineage_lattice_growth_respects_site_capacity() {
    let cfg = sim_config(&[
        ("tumor.driver.componentType", "LINEAGE"),
        ("tumor.driver.spatialType", "LATTICE"),
        ("tumor.driver.initialSize", "10"),
        ("tumor.driver.maxStepCount", "300"),
        ("tumor.driver.maxTumorSize", "20000"),
        ("tumor.growth.birthRate", "0.55"),
        ("tumor.growth.deathRate", "0.1"),
        ("tumor.capacity.siteCapacity", "100"),
        ("tumor.lattice.periodLength", "32"),
        ("tumor.mutation.neutralMeanRate", "0.01"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    assert!(tumor.total_cell_count() > 0);
    assert_capacity_invariant(tumor, 100);
    assert_lattice_invariant(tumor);
    assert!(tumor.mutations().len() > 0);
}

#[test]
fn deme_at_capacity_splits_across_two_sites() {
    let cfg = sim_config(&[
        ("tumor.driver.componentType", "DEME"),
        ("tumor.driver.spatialType", "LATTICE"),
        ("tumor.driver.initialSize", "1000"),
        ("tumor.driver.maxStepCount", "1"),
        ("tumor.driver.maxTumorSize", "2001"),
        ("tumor.growth.birthRate", "1"),
        ("tumor.growth.deathRate", "0"),
        ("tumor.capacity.siteCapacity", "1000"),
        ("tumor.lattice.periodLength", "16"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    // One doubling fills the site twice over; the deme must have divided
    // between its own site and one Moore neighbor.
    assert_eq!(tumor.component_count(), 2);
    assert_eq!(tumor.total_cell_count(), 2_000);

    let mut counts = Vec::new();
    let mut sites = Vec::new();
    for (id, component) in tumor.components() {
        counts.push(component.cell_count());
        sites.push(tumor.lattice().locate(id).unwrap());
    }
    assert!(counts.iter().all(|&c| c >= 1));
    assert_eq!(counts.iter().sum::<u64>(), 2_000);

    let delta = Coord::new(
        sites[0].x - sites[1].x,
        sites[0].y - sites[1].y,
        sites[0].z - sites[1].z,
    );
    assert!(delta.x.abs() <= 1 && delta.y.abs() <= 1 && delta.z.abs() <= 1);
    assert!(delta != Coord::origin());

    assert_capacity_invariant(tumor, 1_000);
}

#[test]
fn small_period_saturates_without_capacity_overrun() {
    // Saturation of the whole torus cannot pass the driver's radius check,
    // so the configuration is built directly.
    let mut cfg = sim_config(&[
        ("tumor.driver.spatialType", "LATTICE"),
        ("tumor.driver.maxStepCount", "2000"),
        ("tumor.driver.maxTumorSize", "1000"),
        ("tumor.growth.birthRate", "0.55"),
        ("tumor.growth.deathRate", "0"),
        ("tumor.capacity.siteCapacity", "1"),
        ("tumor.lattice.periodLength", "64"),
    ]);
    cfg.lattice.period_length = 10;

    let mut rng = Pcg64::seed_from_u64(42);
    let mut tumor = Tumor::seed(&cfg, &mut rng).unwrap();

    for _ in 0..2_000 {
        tumor.advance(&mut rng);
        if tumor.total_cell_count() >= 1_000 {
            break;
        }
    }

    // Every one of the 10^3 sites is filled and none is over capacity.
    assert_eq!(tumor.total_cell_count(), 1_000);
    assert_capacity_invariant(&tumor, 1);
    assert_lattice_invariant(&tumor);
}

#[test]
fn random_migration_preserves_the_lattice_invariants() {
    let cfg = sim_config(&[
        ("tumor.driver.spatialType", "LATTICE"),
        ("tumor.driver.maxStepCount", "50"),
        ("tumor.driver.maxTumorSize", "500"),
        ("tumor.growth.birthRate", "0.5"),
        ("tumor.growth.deathRate", "0.1"),
        ("tumor.capacity.siteCapacity", "1"),
        ("tumor.lattice.periodLength", "32"),
        ("tumor.migrate.modelType", "RANDOM"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    assert_capacity_invariant(tumor, 1);
    assert_lattice_invariant(tumor);
}

#[test]
fn spherical_expansion_selector_grows_cleanly() {
    let cfg = sim_config(&[
        ("tumor.driver.componentType", "LINEAGE"),
        ("tumor.driver.spatialType", "LATTICE"),
        ("tumor.driver.maxStepCount", "150"),
        ("tumor.driver.maxTumorSize", "5000"),
        ("tumor.growth.birthRate", "0.55"),
        ("tumor.growth.deathRate", "0"),
        ("tumor.capacity.siteCapacity", "50"),
        ("tumor.lattice.periodLength", "32"),
        ("tumor.lattice.expansionSelector", "SPHERICAL"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    assert!(tumor.total_cell_count() >= 5_000);
    assert_capacity_invariant(tumor, 50);
    assert_lattice_invariant(tumor);
}

#[test]
fn neutral_mutations_accumulate_in_point_tumors() {
    let cfg = sim_config(&[
        ("tumor.driver.initialSize", "100"),
        ("tumor.driver.maxStepCount", "50"),
        ("tumor.mutation.neutralMeanRate", "0.05"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    let mutations = tumor.mutations();
    assert!(mutations.len() > 0);
    assert_eq!(mutations.len(), mutations.count_of(tumor_core::sim::mutation::MutationKind::Neutral));

    // Component and ancestry ledgers stay aligned: one record per component
    // ever created, indices strictly increasing.
    let records = tumor.ancestry_records();
    for pair in records.windows(2) {
        assert!(pair[0].component < pair[1].component);
    }
    assert!(records.len() >= tumor.component_count());
}

#[test]
fn mutation_cutoff_trips_and_is_recorded() {
    let cfg = sim_config(&[
        ("tumor.driver.componentType", "LINEAGE"),
        ("tumor.driver.maxStepCount", "60"),
        ("tumor.growth.birthRate", "0.6"),
        ("tumor.growth.deathRate", "0"),
        ("tumor.mutation.neutralMeanRate", "0.2"),
        ("tumor.mutation.maxMutationCount", "20"),
    ]);
    let handler = run_trial(cfg);
    let tumor = handler.tumor();

    assert!(tumor.mutations().len() >= 20);
    let tripped = tumor.mutation_cutoff_step().expect("cutoff must trip");
    assert!(tripped <= 60);
}

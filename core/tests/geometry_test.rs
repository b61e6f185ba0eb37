use approx::{assert_abs_diff_eq, assert_relative_eq};
use hashbrown::HashMap;

use tumor_core::cfg::{PropertySet, SimConfig};
use tumor_core::sim::geometry;
use tumor_core::sim::lattice::Coord;
use tumor_core::sim::{SimRng, TrialHandler};

use rand::SeedableRng;

fn weights(sites: &[(i64, i64, i64, u64)]) -> HashMap<Coord, u64> {
    sites
        .iter()
        .map(|&(x, y, z, w)| (Coord::new(x, y, z), w))
        .collect()
}

#[test]
fn a_single_site_has_no_extent() {
    let dimension = geometry::measure(&weights(&[(2, -3, 5, 7)])).unwrap();

    assert_abs_diff_eq!(dimension.center_of_mass[0], 2.0);
    assert_abs_diff_eq!(dimension.center_of_mass[1], -3.0);
    assert_abs_diff_eq!(dimension.center_of_mass[2], 5.0);
    assert_abs_diff_eq!(dimension.radius_of_gyration, 0.0);
    assert_abs_diff_eq!(dimension.anisotropy, 0.0);

    assert!(geometry::measure(&HashMap::new()).is_none());
}

#[test]
fn a_unit_cube_is_perfectly_isotropic() {
    let mut sites = Vec::new();
    for x in 0..2 {
        for y in 0..2 {
            for z in 0..2 {
                sites.push((x, y, z, 1));
            }
        }
    }
    let dimension = geometry::measure(&weights(&sites)).unwrap();

    for axis in 0..3 {
        assert_abs_diff_eq!(dimension.center_of_mass[axis], 0.5);
        assert_relative_eq!(dimension.principal_moments[axis], 0.25, epsilon = 1e-12);
    }
    assert_relative_eq!(dimension.radius_of_gyration, 0.75f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(dimension.asphericity, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(dimension.acylindricity, 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(dimension.anisotropy, 0.0, epsilon = 1e-12);
}

#[test]
fn a_line_is_maximally_anisotropic() {
    let sites: Vec<_> = (0..6).map(|x| (x, 0, 0, 1)).collect();
    let dimension = geometry::measure(&weights(&sites)).unwrap();

    let variance = (0..6)
        .map(|x| (x as f64 - 2.5).powi(2))
        .sum::<f64>()
        / 6.0;

    assert_abs_diff_eq!(dimension.center_of_mass[0], 2.5);
    assert_relative_eq!(dimension.principal_moments[0], variance, epsilon = 1e-12);
    assert_abs_diff_eq!(dimension.principal_moments[1], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(dimension.principal_moments[2], 0.0, epsilon = 1e-12);
    assert_relative_eq!(dimension.asphericity, variance, epsilon = 1e-12);
    assert_relative_eq!(dimension.anisotropy, 1.0, epsilon = 1e-12);
}

#[test]
fn cell_counts_weight_the_center_of_mass() {
    let dimension =
        geometry::measure(&weights(&[(0, 0, 0, 1), (4, 0, 0, 3)])).unwrap();
    assert_abs_diff_eq!(dimension.center_of_mass[0], 3.0);

    let max = geometry::max_radial_distance(
        &weights(&[(0, 0, 0, 1), (4, 0, 0, 3)]),
        dimension.center_of_mass,
    );
    assert_abs_diff_eq!(max, 3.0);
}

#[test]
fn surface_walks_end_on_occupied_boundary_sites() {
    let mut props = PropertySet::new();
    props.set("tumor.driver.componentType", "CELL");
    props.set("tumor.driver.spatialType", "LATTICE");
    props.set("tumor.driver.initialSize", "1");
    props.set("tumor.driver.maxStepCount", "300");
    props.set("tumor.driver.maxTumorSize", "1000");
    props.set("tumor.driver.randomSeed", "20260801");
    props.set("tumor.growth.birthRate", "0.55");
    props.set("tumor.growth.deathRate", "0");
    props.set("tumor.capacity.siteCapacity", "1");
    props.set("tumor.lattice.periodLength", "64");
    let cfg = SimConfig::from_properties(&props).unwrap();

    let mut handler = TrialHandler::new(cfg).unwrap();
    loop {
        handler.step();
        if !handler.should_continue() {
            break;
        }
    }
    let tumor = handler.tumor();

    let site_weights = tumor.occupied_site_weights();
    let dimension = geometry::measure(&site_weights).unwrap();
    let max_radius = geometry::max_radial_distance(&site_weights, dimension.center_of_mass);

    for direction in [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.5, 0.5, -0.7]] {
        let site = geometry::surface_site(tumor, dimension.center_of_mass, direction, 3)
            .expect("a grown tumor has a surface in every direction");
        assert!(tumor.cells_at(site) > 0);
        assert!(site.distance_to(dimension.center_of_mass) <= max_radius + 1.0);
    }

    let mut rng = SimRng::seed_from_u64(5);
    for _ in 0..20 {
        let site =
            geometry::select_surface_site(tumor, dimension.center_of_mass, 3, &mut rng)
                .expect("random surface walks also land on the tumor");
        assert!(tumor.cells_at(site) > 0);
    }
}

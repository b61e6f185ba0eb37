//! Spatial moments of the tumor and surface-site searches

use hashbrown::HashMap;
use rand::prelude::*;
use rand_distr::UnitSphere;

use crate::sim::lattice::Coord;
use crate::sim::tumor::Tumor;

/// Spatial moments of an occupied-site configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TumorDimension {
    /// Cell-count-weighted center of mass
    pub center_of_mass: [f64; 3],
    /// Principal moments of the gyration tensor, descending
    pub principal_moments: [f64; 3],
    /// Radius of gyration, the root of the gyration-tensor trace
    pub radius_of_gyration: f64,
    /// Asphericity `b = l1 - (l2 + l3) / 2`
    pub asphericity: f64,
    /// Acylindricity `c = l2 - l3`
    pub acylindricity: f64,
    /// Relative shape anisotropy `(b^2 + 3 c^2 / 4) / Rg^4`
    pub anisotropy: f64,
}

/// Compute the spatial moments of cell-count-weighted occupied sites
///
/// Returns `None` when no site carries any weight.
pub fn measure(weights: &HashMap<Coord, u64>) -> Option<TumorDimension> {
    let total: u64 = weights.values().sum();
    if total == 0 {
        return None;
    }
    let total = total as f64;

    let mut center_of_mass = [0.0; 3];
    for (coord, &w) in weights {
        let point = coord.as_f64();
        for axis in 0..3 {
            center_of_mass[axis] += w as f64 * point[axis];
        }
    }
    for axis in &mut center_of_mass {
        *axis /= total;
    }

    // Symmetric gyration tensor, upper triangle
    let mut s = [[0.0f64; 3]; 3];
    for (coord, &w) in weights {
        let point = coord.as_f64();
        let d = [
            point[0] - center_of_mass[0],
            point[1] - center_of_mass[1],
            point[2] - center_of_mass[2],
        ];
        for a in 0..3 {
            for b in a..3 {
                s[a][b] += w as f64 * d[a] * d[b];
            }
        }
    }
    for a in 0..3 {
        for b in a..3 {
            s[a][b] /= total;
            s[b][a] = s[a][b];
        }
    }

    let principal_moments = symmetric_eigenvalues(&s);
    let trace = principal_moments.iter().sum::<f64>().max(0.0);
    let radius_of_gyration = trace.sqrt();

    let [l1, l2, l3] = principal_moments;
    let asphericity = l1 - (l2 + l3) / 2.0;
    let acylindricity = l2 - l3;
    let anisotropy = if trace > 0.0 {
        (asphericity.powi(2) + 0.75 * acylindricity.powi(2)) / trace.powi(2)
    } else {
        0.0
    };

    Some(TumorDimension {
        center_of_mass,
        principal_moments,
        radius_of_gyration,
        asphericity,
        acylindricity,
        anisotropy,
    })
}

/// Eigenvalues of a symmetric 3x3 matrix, descending
///
/// Closed-form trigonometric method; exact for diagonal input.
fn symmetric_eigenvalues(s: &[[f64; 3]; 3]) -> [f64; 3] {
    let off = s[0][1].powi(2) + s[0][2].powi(2) + s[1][2].powi(2);

    let mut eigs = if off == 0.0 {
        [s[0][0], s[1][1], s[2][2]]
    } else {
        let q = (s[0][0] + s[1][1] + s[2][2]) / 3.0;
        let p2 = (s[0][0] - q).powi(2) + (s[1][1] - q).powi(2) + (s[2][2] - q).powi(2) + 2.0 * off;
        let p = (p2 / 6.0).sqrt();

        let mut b = [[0.0f64; 3]; 3];
        for a in 0..3 {
            for c in 0..3 {
                b[a][c] = (s[a][c] - if a == c { q } else { 0.0 }) / p;
            }
        }
        let r = (det3(&b) / 2.0).clamp(-1.0, 1.0);
        let phi = r.acos() / 3.0;

        let l1 = q + 2.0 * p * phi.cos();
        let l3 = q + 2.0 * p * (phi + 2.0 * std::f64::consts::PI / 3.0).cos();
        [l1, 3.0 * q - l1 - l3, l3]
    };

    eigs.sort_unstable_by(|a, b| b.partial_cmp(a).unwrap());
    eigs
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Largest distance from `point` to any weighted site
pub fn max_radial_distance(weights: &HashMap<Coord, u64>, point: [f64; 3]) -> f64 {
    weights
        .keys()
        .map(|coord| coord.distance_to(point))
        .fold(0.0, f64::max)
}

/// Walk outward from `center_of_mass` along `direction` and return the last
/// occupied site before a run of `empty_shell` consecutive empty ray sites
///
/// Returns `None` if the ray never meets an occupied site.
pub fn surface_site(
    tumor: &Tumor,
    center_of_mass: [f64; 3],
    direction: [f64; 3],
    empty_shell: u64,
) -> Option<Coord> {
    let norm = direction.iter().map(|d| d * d).sum::<f64>().sqrt();
    assert!(norm > 0.0, "surface walk needs a nonzero direction");
    let unit = [direction[0] / norm, direction[1] / norm, direction[2] / norm];

    let limit = 2.0 * tumor.lattice().period() as f64 + 8.0 * empty_shell as f64;
    let mut last_site: Option<Coord> = None;
    let mut last_occupied: Option<Coord> = None;
    let mut empty_run = 0u64;

    let mut t = 0.0;
    while t <= limit {
        let site = Coord::new(
            (center_of_mass[0] + t * unit[0]).round() as i64,
            (center_of_mass[1] + t * unit[1]).round() as i64,
            (center_of_mass[2] + t * unit[2]).round() as i64,
        );
        // Half steps guarantee no ray site is skipped; dedupe repeats.
        t += 0.5;
        if last_site == Some(site) {
            continue;
        }
        last_site = Some(site);

        if tumor.cells_at(site) > 0 {
            last_occupied = Some(site);
            empty_run = 0;
        } else {
            empty_run += 1;
            if last_occupied.is_some() && empty_run >= empty_shell {
                return last_occupied;
            }
        }
    }

    last_occupied
}

/// A surface site in a uniformly random direction from the center of mass
pub fn select_surface_site<R: Rng>(
    tumor: &Tumor,
    center_of_mass: [f64; 3],
    empty_shell: u64,
    rng: &mut R,
) -> Option<Coord> {
    let direction: [f64; 3] = UnitSphere.sample(rng);
    surface_site(tumor, center_of_mass, direction, empty_shell)
}

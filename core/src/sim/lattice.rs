//! The periodic cubic lattice and its site-occupancy bookkeeping
//!
//! Coordinates are unbounded integers; the periodic image (`mod P` per axis)
//! keys site storage, so site identity is torus identity while components keep
//! their true coordinates for geometry. Two site-store realizations sit behind
//! one API: single-occupancy (at most one component per site, used for demes)
//! and multi-occupancy (a small bucket per site, used for cells and lineages).

use hashbrown::HashMap;
use rand::Rng;

use crate::cfg::NeighborhoodType;
use crate::sim::component::ComponentId;
use crate::sim::distr;

/// An integer lattice coordinate
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    /// x component
    pub x: i64,
    /// y component
    pub y: i64,
    /// z component
    pub z: i64,
}

impl Coord {
    /// The coordinate `(x, y, z)`
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The origin `(0, 0, 0)`
    pub fn origin() -> Self {
        Self::new(0, 0, 0)
    }

    /// Component-wise sum
    pub fn plus(self, other: Coord) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// The coordinate as a float vector
    pub fn as_f64(self) -> [f64; 3] {
        [self.x as f64, self.y as f64, self.z as f64]
    }

    /// Euclidean distance to a float point
    pub fn distance_to(self, point: [f64; 3]) -> f64 {
        let [x, y, z] = self.as_f64();
        ((x - point[0]).powi(2) + (y - point[1]).powi(2) + (z - point[2]).powi(2)).sqrt()
    }

    /// Periodic image with every component wrapped into `[0, period)`
    pub fn image(self, period: i64) -> Self {
        Self::new(
            self.x.rem_euclid(period),
            self.y.rem_euclid(period),
            self.z.rem_euclid(period),
        )
    }
}

/// The 26 Moore neighbor offsets
pub static MOORE_OFFSETS: [Coord; 26] = [
    Coord { x: -1, y: -1, z: -1 },
    Coord { x: -1, y: -1, z: 0 },
    Coord { x: -1, y: -1, z: 1 },
    Coord { x: -1, y: 0, z: -1 },
    Coord { x: -1, y: 0, z: 0 },
    Coord { x: -1, y: 0, z: 1 },
    Coord { x: -1, y: 1, z: -1 },
    Coord { x: -1, y: 1, z: 0 },
    Coord { x: -1, y: 1, z: 1 },
    Coord { x: 0, y: -1, z: -1 },
    Coord { x: 0, y: -1, z: 0 },
    Coord { x: 0, y: -1, z: 1 },
    Coord { x: 0, y: 0, z: -1 },
    Coord { x: 0, y: 0, z: 1 },
    Coord { x: 0, y: 1, z: -1 },
    Coord { x: 0, y: 1, z: 0 },
    Coord { x: 0, y: 1, z: 1 },
    Coord { x: 1, y: -1, z: -1 },
    Coord { x: 1, y: -1, z: 0 },
    Coord { x: 1, y: -1, z: 1 },
    Coord { x: 1, y: 0, z: -1 },
    Coord { x: 1, y: 0, z: 0 },
    Coord { x: 1, y: 0, z: 1 },
    Coord { x: 1, y: 1, z: -1 },
    Coord { x: 1, y: 1, z: 0 },
    Coord { x: 1, y: 1, z: 1 },
];

/// The 6 von Neumann (face-adjacent) neighbor offsets
pub static VON_NEUMANN_OFFSETS: [Coord; 6] = [
    Coord { x: -1, y: 0, z: 0 },
    Coord { x: 1, y: 0, z: 0 },
    Coord { x: 0, y: -1, z: 0 },
    Coord { x: 0, y: 1, z: 0 },
    Coord { x: 0, y: 0, z: -1 },
    Coord { x: 0, y: 0, z: 1 },
];

impl NeighborhoodType {
    /// The neighbor offsets of this neighborhood
    pub fn offsets(self) -> &'static [Coord] {
        match self {
            Self::Moore => &MOORE_OFFSETS,
            Self::VonNeumann => &VON_NEUMANN_OFFSETS,
        }
    }

    /// The neighbors of `coord`, in offset order
    pub fn neighbors(self, coord: Coord) -> impl Iterator<Item = Coord> {
        self.offsets().iter().map(move |&o| coord.plus(o))
    }

    /// One uniformly random neighbor of `coord`
    pub fn random_neighbor<R: Rng>(self, coord: Coord, rng: &mut R) -> Coord {
        let offsets = self.offsets();
        let index = distr::uniform_int(0, offsets.len() as i64 - 1, rng) as usize;
        coord.plus(offsets[index])
    }
}

/// Which site-store realization a lattice uses
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Occupancy {
    /// At most one component per site
    Single,
    /// A bucket of components per site
    Multi,
}

/// Site storage, keyed by periodic image coordinates
#[derive(Debug)]
enum SiteStore {
    Single(HashMap<Coord, ComponentId>),
    Multi(HashMap<Coord, Vec<ComponentId>>),
}

/// A periodic cubic lattice mapping sites to components and back
#[derive(Debug)]
pub struct Lattice {
    period: i64,
    store: SiteStore,
    positions: HashMap<ComponentId, Coord>,
}

impl Lattice {
    /// Create an empty lattice of side `period` with the given occupancy
    pub fn new(period: u64, occupancy: Occupancy) -> Self {
        assert!(period > 0, "lattice period must be positive");
        Self {
            period: period as i64,
            store: match occupancy {
                Occupancy::Single => SiteStore::Single(HashMap::new()),
                Occupancy::Multi => SiteStore::Multi(HashMap::new()),
            },
            positions: HashMap::new(),
        }
    }

    /// Lattice side length
    pub fn period(&self) -> u64 {
        self.period as u64
    }

    /// Periodic image of `coord` on this lattice
    pub fn image(&self, coord: Coord) -> Coord {
        coord.image(self.period)
    }

    /// Number of components on the lattice
    pub fn component_count(&self) -> usize {
        self.positions.len()
    }

    /// Place `id` at `coord`
    ///
    /// # Panics
    /// Panics if `id` is already placed, or if the site is taken on a
    /// single-occupancy lattice.
    pub fn occupy(&mut self, id: ComponentId, coord: Coord) {
        let previous = self.positions.insert(id, coord);
        assert!(previous.is_none(), "component {:?} is already placed", id);

        let image = coord.image(self.period);
        match &mut self.store {
            SiteStore::Single(map) => {
                let evicted = map.insert(image, id);
                assert!(
                    evicted.is_none(),
                    "single-occupancy site {:?} is already taken",
                    image
                );
            }
            SiteStore::Multi(map) => map.entry(image).or_default().push(id),
        }
    }

    /// Remove `id` from the lattice and return the coordinate it held
    ///
    /// # Panics
    /// Panics if `id` is not on the lattice.
    pub fn vacate(&mut self, id: ComponentId) -> Coord {
        let coord = self
            .positions
            .remove(&id)
            .expect("vacating a component that is not on the lattice");

        let image = coord.image(self.period);
        match &mut self.store {
            SiteStore::Single(map) => {
                let removed = map.remove(&image);
                assert_eq!(removed, Some(id), "reverse index out of sync");
            }
            SiteStore::Multi(map) => {
                let bucket = map.get_mut(&image).expect("reverse index out of sync");
                let slot = bucket
                    .iter()
                    .position(|&c| c == id)
                    .expect("reverse index out of sync");
                bucket.swap_remove(slot);
                if bucket.is_empty() {
                    map.remove(&image);
                }
            }
        }

        coord
    }

    /// Move `id` to `coord`
    pub fn relocate(&mut self, id: ComponentId, coord: Coord) {
        self.vacate(id);
        self.occupy(id, coord);
    }

    /// True coordinate of `id`, if it is on the lattice
    pub fn locate(&self, id: ComponentId) -> Option<Coord> {
        self.positions.get(&id).copied()
    }

    /// The components occupying the site of `coord`
    pub fn occupants(&self, coord: Coord) -> Vec<ComponentId> {
        let image = coord.image(self.period);
        match &self.store {
            SiteStore::Single(map) => map.get(&image).copied().into_iter().collect(),
            SiteStore::Multi(map) => map.get(&image).cloned().unwrap_or_default(),
        }
    }

    /// The sole occupant of the site of `coord`, if exactly one
    pub fn sole_occupant(&self, coord: Coord) -> Option<ComponentId> {
        let image = coord.image(self.period);
        match &self.store {
            SiteStore::Single(map) => map.get(&image).copied(),
            SiteStore::Multi(map) => match map.get(&image).map(Vec::as_slice) {
                Some([only]) => Some(*only),
                _ => None,
            },
        }
    }

    /// Whether the site of `coord` has no occupants
    pub fn is_empty(&self, coord: Coord) -> bool {
        self.count_occupants(coord) == 0
    }

    /// Number of components at the site of `coord`
    pub fn count_occupants(&self, coord: Coord) -> usize {
        let image = coord.image(self.period);
        match &self.store {
            SiteStore::Single(map) => usize::from(map.contains_key(&image)),
            SiteStore::Multi(map) => map.get(&image).map_or(0, Vec::len),
        }
    }

    /// Iterate over every `(component, true coordinate)` pair
    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, Coord)> + '_ {
        self.positions.iter().map(|(&id, &coord)| (id, coord))
    }
}

//! Site-capacity models

use crate::cfg::{SimConfig, SpatialType};
use crate::sim::lattice::Coord;

/// Capacity assigned to sites of an effectively unbounded model
///
/// Large enough that no tumor reaches it, small enough that capacity
/// arithmetic cannot overflow.
pub const UNBOUNDED_CAPACITY: u64 = u64::MAX >> 3;

/// A function from site coordinate to cell capacity
///
/// Policies may depend only on the coordinate, never on current occupancy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CapacityModel {
    /// The same capacity at every site
    Uniform(u64),
    /// No effective bound, used for single-site (`POINT`) tumors
    Unbounded,
}

impl CapacityModel {
    /// Build the capacity model selected by the configuration
    pub fn from_config(cfg: &SimConfig) -> Self {
        match cfg.spatial_type {
            SpatialType::Lattice => Self::Uniform(cfg.capacity.site_capacity),
            SpatialType::Point => Self::Unbounded,
        }
    }

    /// Cell capacity of the site at `coord`
    pub fn capacity(&self, _coord: Coord) -> u64 {
        match *self {
            Self::Uniform(k) => k,
            Self::Unbounded => UNBOUNDED_CAPACITY,
        }
    }

    /// Mean capacity over all sites
    pub fn mean_capacity(&self) -> f64 {
        match *self {
            Self::Uniform(k) => k as f64,
            Self::Unbounded => f64::INFINITY,
        }
    }
}

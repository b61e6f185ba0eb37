//! A spatially resolved, agent-based simulation of tumor growth and evolution
//!
//! Replicating components (cells, lineages, or demes) advance through discrete
//! time on a periodic cubic lattice with bounded per-site capacity, accumulating
//! heritable mutations whose variant allele frequencies can be read out through
//! bulk surface samples.

#![warn(missing_docs)]
#![deny(clippy::wildcard_imports)]

pub mod cfg;
pub mod io;
pub mod sim;

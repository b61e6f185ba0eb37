//! The simulation engine: components, lattice, scheduler, sampling, and the
//! per-trial driver

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::cfg::SimConfig;

pub mod capacity;
pub mod component;
pub mod distr;
pub mod genotype;
pub mod geometry;
pub mod growth;
pub mod lattice;
pub mod mutation;
pub mod sample;
pub mod tumor;

pub use tumor::{SeedError, Tumor};

/// RNG used for the simulations
/// Will be a type that implements the `Rng` trait from `rand`
pub type SimRng = Pcg64;

/// Offset mixed into the base seed to derive the report RNG stream
const REPORT_STREAM_SALT: u64 = 0x9E37_79B9_7F4A_7C15;

/// The context handed to report observers on every hook invocation
///
/// Reports read the tumor through this value and draw their sampling
/// randomness from a stream independent of the simulation stream.
pub struct StepContext<'a> {
    /// Resolved trial configuration
    pub cfg: &'a SimConfig,
    /// The tumor, read-only
    pub tumor: &'a Tumor,
    /// Report-side RNG stream
    pub rng: &'a mut SimRng,
}

impl StepContext<'_> {
    /// Trial index stamped on output rows
    pub fn trial_index(&self) -> u32 {
        self.cfg.trial_index
    }

    /// Current time step
    pub fn time_step(&self) -> u32 {
        self.tumor.time_step()
    }
}

/// Handler running one trial: founder seeding, stepping, and termination
///
/// The caller owns the output loop: call [`TrialHandler::step`] repeatedly
/// while [`TrialHandler::should_continue`] holds, invoking report hooks with
/// [`TrialHandler::step_context`] between steps.
pub struct TrialHandler {
    cfg: SimConfig,
    tumor: Tumor,
    rng: SimRng,
    report_rng: SimRng,
}

impl TrialHandler {
    /// Seed the founder population and prepare a trial
    pub fn new(cfg: SimConfig) -> Result<Self, SeedError> {
        // Seed from entropy when the configuration gives no seed, but always
        // derive the report stream deterministically from the base seed.
        let base_seed = cfg.random_seed.unwrap_or_else(|| rand::rngs::OsRng.gen());
        let mut rng = SimRng::seed_from_u64(base_seed);
        let report_rng = SimRng::seed_from_u64(base_seed ^ REPORT_STREAM_SALT);

        let tumor = Tumor::seed(&cfg, &mut rng)?;

        Ok(Self {
            cfg,
            tumor,
            rng,
            report_rng,
        })
    }

    /// The resolved trial configuration
    pub fn cfg(&self) -> &SimConfig {
        &self.cfg
    }

    /// The tumor, read-only
    pub fn tumor(&self) -> &Tumor {
        &self.tumor
    }

    /// Advance the tumor through one time step
    pub fn step(&mut self) {
        self.tumor.advance(&mut self.rng);
    }

    /// Whether another step should run
    ///
    /// The trial continues while the step bound has not been reached and the
    /// tumor is neither extinct nor past its size bound.
    pub fn should_continue(&self) -> bool {
        let cells = self.tumor.total_cell_count();

        self.tumor.time_step() < self.cfg.max_step_count
            && cells > 0
            && cells < self.cfg.max_tumor_size
    }

    /// Build the observer context for report hooks
    pub fn step_context(&mut self) -> StepContext<'_> {
        StepContext {
            cfg: &self.cfg,
            tumor: &self.tumor,
            rng: &mut self.report_rng,
        }
    }
}

//! The report observer trait, the broadcasting group, and CSV plumbing
//!
//! Reports observe the trial through [`StepContext`] hooks; none of them holds
//! a handle to the driver. Each report owns a buffered CSV writer and decides
//! on every step whether it is a sampling step for its own schedule.

use std::io::Write;

use anyhow::Result;
use derive_builder::Builder;

use crate::cfg::ReportConfig;
use crate::sim::StepContext;

mod ancestry_reports;
mod report_impls;
mod sampling_reports;

pub use ancestry_reports::{
    AccumulatedMutationsReport, ComponentAncestryReport, OriginalMutationsReport,
    ScalarMutationsReport,
};
pub use report_impls::{
    CellCountTrajReport, ComponentCoordReport, GrowthCountReport, MutGenThresholdReport,
    MutationCountReport, TumorDimensionReport,
};
pub use sampling_reports::{
    BulkMutDistReport, BulkSampleSiteReport, BulkVafSummaryReport, MetMutDistReport,
    SiteMutationTypeCountReport, SiteSelection, VariegationReport,
};

/// Canonical report names, as used in configuration keys and file names
pub mod names {
    /// Cell and component counts per sampled step
    pub const CELL_COUNT_TRAJ: &str = "cell-count-traj";
    /// Cumulative birth and death counts per sampled step
    pub const GROWTH_COUNT: &str = "growth-count";
    /// Center of mass, gyration moments, and shape descriptors
    pub const TUMOR_DIMENSION: &str = "tumor-dimension";
    /// Coordinates of every live component per sampled step
    pub const COMPONENT_COORD: &str = "component-coord";
    /// Parent index of every component ever created
    pub const COMPONENT_ANCESTRY: &str = "component-ancestry";
    /// Original mutation indices per live component
    pub const ORIGINAL_MUTATIONS: &str = "original-mutations";
    /// Accumulated mutation indices per live component
    pub const ACCUMULATED_MUTATIONS: &str = "accumulated-mutations";
    /// Selection coefficients of all scalar mutations
    pub const SCALAR_MUTATIONS: &str = "scalar-mutations";
    /// Arena-wide mutation counts per kind
    pub const MUTATION_COUNT: &str = "mutation-count";
    /// Order statistics of bulk-sample variant allele frequencies
    pub const BULK_VAF_SUMMARY: &str = "bulk-vaf-summary";
    /// Pairwise mutational distances between bulk samples
    pub const BULK_MUT_DIST: &str = "bulk-mut-dist";
    /// Center sites and sizes of collected bulk samples
    pub const BULK_SAMPLE_SITE: &str = "bulk-sample-site";
    /// Mutational distance between a surface seed and bulk samples
    pub const MET_MUT_DIST: &str = "met-mut-dist";
    /// Per-cell mutation-kind counts at random occupied sites
    pub const BULK_SITE_MUTATION_TYPE_COUNT: &str = "bulk-site-mutation-type-count";
    /// Per-cell mutation-kind counts at surface sites
    pub const SURFACE_SITE_MUTATION_TYPE_COUNT: &str = "surface-site-mutation-type-count";
    /// Step at which the mutation-generation cutoff tripped
    pub const MUT_GEN_THRESHOLD: &str = "mut-gen-threshold";
    /// Spatial mixing of neoantigen-positive cells on the surface
    pub const VARIEGATION: &str = "variegation";
}

/// An observer of the trial lifecycle
///
/// Simulation-scope hooks exist for symmetry with multi-trial launchers; the
/// engine itself runs one trial per process.
pub trait Report {
    /// Called once before any trial runs
    fn initialize_simulation(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called once after the founder population is seeded
    fn initialize_trial(&mut self, _ctx: &mut StepContext) -> Result<()> {
        Ok(())
    }

    /// Called after every completed time step
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()>;

    /// Called once after the trial terminates
    fn finalize_trial(&mut self, _ctx: &mut StepContext) -> Result<()> {
        Ok(())
    }

    /// Called once after all trials have finalized
    fn finalize_simulation(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A handler which broadcasts lifecycle hooks to a group of reports
#[allow(missing_docs)] // Builder will not have doc comment
#[derive(Builder)]
#[builder(pattern = "owned")]
pub struct ReportGroup {
    /// The managed reports
    #[builder(setter(each(name = "report")), default)]
    reports: Vec<Box<dyn Report>>,
}

impl ReportGroup {
    /// Number of managed reports
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether the group manages no report
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Broadcast `initialize_simulation`
    pub fn initialize_simulation(&mut self) -> Result<()> {
        for report in &mut self.reports {
            report.initialize_simulation()?;
        }
        Ok(())
    }

    /// Broadcast `initialize_trial`
    pub fn initialize_trial(&mut self, ctx: &mut StepContext) -> Result<()> {
        for report in &mut self.reports {
            report.initialize_trial(ctx)?;
        }
        Ok(())
    }

    /// Broadcast `process_step`
    pub fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        for report in &mut self.reports {
            report.process_step(ctx)?;
        }
        Ok(())
    }

    /// Broadcast `finalize_trial`
    pub fn finalize_trial(&mut self, ctx: &mut StepContext) -> Result<()> {
        for report in &mut self.reports {
            report.finalize_trial(ctx)?;
        }
        Ok(())
    }

    /// Broadcast `finalize_simulation`
    pub fn finalize_simulation(&mut self) -> Result<()> {
        for report in &mut self.reports {
            report.finalize_simulation()?;
        }
        Ok(())
    }
}

/// Decides which steps are sampling steps for one report
///
/// A step samples when it is a multiple of the fixed interval, or when the
/// tumor size first crosses one of the listed thresholds.
#[derive(Debug, Clone)]
pub struct SampleSchedule {
    interval: u32,
    sizes: Vec<u64>,
    next_size: usize,
}

impl SampleSchedule {
    /// Build the schedule of a report configuration
    pub fn new(cfg: &ReportConfig) -> Self {
        Self {
            interval: cfg.sample_interval,
            sizes: cfg.sample_sizes.clone(),
            next_size: 0,
        }
    }

    /// Whether the current step is a sampling step
    ///
    /// Size crossings are consumed; each listed size fires at most once.
    pub fn is_sample_step(&mut self, time_step: u32, cell_count: u64) -> bool {
        let mut sample = time_step % self.interval == 0;

        while self.next_size < self.sizes.len() && cell_count >= self.sizes[self.next_size] {
            self.next_size += 1;
            sample = true;
        }

        sample
    }
}

/// A shared `(trialIndex, timeStep)` stamp reused across all record types
#[derive(Debug, Copy, Clone)]
pub struct RecordHeader {
    /// Trial index
    pub trial_index: u32,
    /// Time step
    pub time_step: u32,
}

impl RecordHeader {
    /// The header of the current step
    pub fn of(ctx: &StepContext) -> Self {
        Self {
            trial_index: ctx.trial_index(),
            time_step: ctx.time_step(),
        }
    }
}

/// Buffer capacity to use for CSV writers
///
/// Set at 128 KB
const CSV_BUFFER_CAPACITY: usize = 128 * (1 << 10);

/// Build a buffered CSV writer with the given field delimiter
fn csv_writer(writer: Box<dyn Write>, delimiter: u8) -> csv::Writer<Box<dyn Write>> {
    csv::WriterBuilder::new()
        .buffer_capacity(CSV_BUFFER_CAPACITY)
        .delimiter(delimiter)
        .from_writer(writer)
}

/// Build a comma-delimited buffered CSV writer and emit its header row
fn csv_writer_with_header(
    writer: Box<dyn Write>,
    header: &[&str],
) -> Result<csv::Writer<Box<dyn Write>>> {
    let mut writer = csv_writer(writer, b',');
    writer.write_record(header)?;
    Ok(writer)
}

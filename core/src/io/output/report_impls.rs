//! Trajectory-style reports: per-step counts, coordinates, and dimensions

use std::io::Write;

use anyhow::Result;

use crate::cfg::ReportConfig;
use crate::sim::geometry;
use crate::sim::mutation::MutationKind;
use crate::sim::StepContext;

use crate::io::output::{csv_writer_with_header, RecordHeader, Report, SampleSchedule};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// CellCountTrajReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records total cell and component counts on sampling steps
pub struct CellCountTrajReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
}

impl CellCountTrajReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &["trialIndex", "timeStep", "cellCount", "componentCount"],
            )?,
            schedule: SampleSchedule::new(cfg),
        })
    }
}

impl Report for CellCountTrajReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        let tumor = ctx.tumor;
        if !self
            .schedule
            .is_sample_step(tumor.time_step(), tumor.total_cell_count())
        {
            return Ok(());
        }

        let header = RecordHeader::of(ctx);
        self.writer.serialize((
            header.trial_index,
            header.time_step,
            tumor.total_cell_count(),
            tumor.component_count(),
        ))?;

        Ok(())
    }

    fn finalize_trial(&mut self, _ctx: &mut StepContext) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// GrowthCountReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records cumulative birth and death counts on sampling steps
pub struct GrowthCountReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
}

impl GrowthCountReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &["trialIndex", "timeStep", "cellCount", "birthCount", "deathCount"],
            )?,
            schedule: SampleSchedule::new(cfg),
        })
    }
}

impl Report for GrowthCountReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        let tumor = ctx.tumor;
        if !self
            .schedule
            .is_sample_step(tumor.time_step(), tumor.total_cell_count())
        {
            return Ok(());
        }

        let header = RecordHeader::of(ctx);
        let count = tumor.cumulative_growth_count();
        self.writer.serialize((
            header.trial_index,
            header.time_step,
            tumor.total_cell_count(),
            count.births,
            count.deaths,
        ))?;

        Ok(())
    }

    fn finalize_trial(&mut self, _ctx: &mut StepContext) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// TumorDimensionReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records center of mass, gyration moments, and shape descriptors
pub struct TumorDimensionReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
}

impl TumorDimensionReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &[
                    "trialIndex",
                    "timeStep",
                    "cellCount",
                    "componentCount",
                    "cmX",
                    "cmY",
                    "cmZ",
                    "RG",
                    "pmX",
                    "pmY",
                    "pmZ",
                    "asphericity",
                    "acylindricity",
                    "anisotropy",
                ],
            )?,
            schedule: SampleSchedule::new(cfg),
        })
    }
}

impl Report for TumorDimensionReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        let tumor = ctx.tumor;
        if !self
            .schedule
            .is_sample_step(tumor.time_step(), tumor.total_cell_count())
        {
            return Ok(());
        }

        let weights = tumor.occupied_site_weights();
        let Some(dimension) = geometry::measure(&weights) else {
            return Ok(());
        };

        let header = RecordHeader::of(ctx);
        self.writer.serialize((
            header.trial_index,
            header.time_step,
            tumor.total_cell_count(),
            tumor.component_count(),
            dimension.center_of_mass[0],
            dimension.center_of_mass[1],
            dimension.center_of_mass[2],
            dimension.radius_of_gyration,
            dimension.principal_moments[0],
            dimension.principal_moments[1],
            dimension.principal_moments[2],
            dimension.asphericity,
            dimension.acylindricity,
            dimension.anisotropy,
        ))?;

        Ok(())
    }

    fn finalize_trial(&mut self, _ctx: &mut StepContext) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// ComponentCoordReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records the coordinate and size of every live component on sampling steps
pub struct ComponentCoordReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
}

impl ComponentCoordReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &[
                    "trialIndex",
                    "timeStep",
                    "componentIndex",
                    "cellCount",
                    "coordX",
                    "coordY",
                    "coordZ",
                ],
            )?,
            schedule: SampleSchedule::new(cfg),
        })
    }
}

impl Report for ComponentCoordReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        let tumor = ctx.tumor;
        if !self
            .schedule
            .is_sample_step(tumor.time_step(), tumor.total_cell_count())
        {
            return Ok(());
        }

        let header = RecordHeader::of(ctx);
        let mut rows: Vec<_> = tumor
            .components()
            .map(|(id, component)| {
                let coord = tumor
                    .lattice()
                    .locate(id)
                    .expect("live component is not on the lattice");
                (id.index(), component.cell_count(), coord)
            })
            .collect();
        rows.sort_unstable_by_key(|&(index, _, _)| index);

        for (index, cell_count, coord) in rows {
            self.writer.serialize((
                header.trial_index,
                header.time_step,
                index,
                cell_count,
                coord.x,
                coord.y,
                coord.z,
            ))?;
        }

        Ok(())
    }

    fn finalize_trial(&mut self, _ctx: &mut StepContext) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// MutationCountReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records arena-wide mutation counts per kind on sampling steps
pub struct MutationCountReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
}

impl MutationCountReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &[
                    "trialIndex",
                    "timeStep",
                    "cellCount",
                    "mutationCount",
                    "scalarCount",
                    "neutralCount",
                    "neoantigenCount",
                ],
            )?,
            schedule: SampleSchedule::new(cfg),
        })
    }
}

impl Report for MutationCountReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        let tumor = ctx.tumor;
        if !self
            .schedule
            .is_sample_step(tumor.time_step(), tumor.total_cell_count())
        {
            return Ok(());
        }

        let header = RecordHeader::of(ctx);
        let mutations = tumor.mutations();
        self.writer.serialize((
            header.trial_index,
            header.time_step,
            tumor.total_cell_count(),
            mutations.len(),
            mutations.count_of(MutationKind::Scalar),
            mutations.count_of(MutationKind::Neutral),
            mutations.count_of(MutationKind::Neoantigen),
        ))?;

        Ok(())
    }

    fn finalize_trial(&mut self, _ctx: &mut StepContext) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// MutGenThresholdReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records the step at which the mutation-generation cutoff tripped
///
/// Writes at most one row per trial; none if the cutoff never engaged.
pub struct MutGenThresholdReport {
    writer: csv::Writer<Box<dyn Write>>,
}

impl MutGenThresholdReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &["trialIndex", "timeStep", "mutationCount"],
            )?,
        })
    }
}

impl Report for MutGenThresholdReport {
    fn process_step(&mut self, _ctx: &mut StepContext) -> Result<()> {
        Ok(())
    }

    fn finalize_trial(&mut self, ctx: &mut StepContext) -> Result<()> {
        if let Some(step) = ctx.tumor.mutation_cutoff_step() {
            self.writer.serialize((
                ctx.trial_index(),
                step,
                ctx.tumor.mutations().len(),
            ))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

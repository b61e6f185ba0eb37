//! Reports built on bulk surface samples and sampled lattice sites

use std::io::Write;

use anyhow::Result;
use rand::prelude::*;
use rand_distr::UnitSphere;

use crate::cfg::ReportConfig;
use crate::sim::genotype::KindCounts;
use crate::sim::geometry;
use crate::sim::lattice::Coord;
use crate::sim::mutation::MutationKind;
use crate::sim::sample::{BulkSample, MutationalDistance};
use crate::sim::tumor::Tumor;
use crate::sim::StepContext;

use crate::io::output::{csv_writer_with_header, RecordHeader, Report, SampleSchedule};

/// Collect `count` bulk samples along independent random directions
fn collect_bulk_samples(ctx: &mut StepContext, count: u32, target_size: u64) -> Vec<BulkSample> {
    let tumor = ctx.tumor;
    let weights = tumor.occupied_site_weights();
    let Some(dimension) = geometry::measure(&weights) else {
        return Vec::new();
    };

    let mut samples = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let direction: [f64; 3] = UnitSphere.sample(ctx.rng);
        if let Some(sample) = BulkSample::collect_radial(
            tumor,
            dimension.center_of_mass,
            direction,
            target_size,
            ctx.cfg.empty_shell_distance,
        ) {
            samples.push(sample);
        }
    }

    samples
}

/// Accumulated mutation-kind counts over all cells at one site
fn site_kind_counts(tumor: &Tumor, site: Coord) -> (u64, KindCounts) {
    let mut cells = 0u64;
    let mut counts = KindCounts::default();

    for id in tumor.lattice().occupants(site) {
        let component = tumor
            .component(id)
            .expect("lattice occupant is not a live component");
        for (genotype, cell_count) in component.genotype_groups() {
            let per_cell = tumor.genotypes().kind_counts(genotype, tumor.mutations());
            cells += cell_count;
            counts.scalar += per_cell.scalar * cell_count;
            counts.neutral += per_cell.neutral * cell_count;
            counts.neoantigen += per_cell.neoantigen * cell_count;
        }
    }

    (cells, counts)
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// BulkVafSummaryReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records order statistics of bulk-sample variant allele frequencies
pub struct BulkVafSummaryReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
    sample_count: u32,
    target_size: u64,
}

impl BulkVafSummaryReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &[
                    "trialIndex",
                    "timeStep",
                    "sampleIndex",
                    "siteCoordX",
                    "siteCoordY",
                    "siteCoordZ",
                    "sampleCellCount",
                    "distinctCount",
                    "clonalCount",
                    "minFreq",
                    "q1Freq",
                    "medianFreq",
                    "meanFreq",
                    "q3Freq",
                    "maxFreq",
                ],
            )?,
            schedule: SampleSchedule::new(cfg),
            sample_count: cfg.sample_count,
            target_size: cfg.target_size,
        })
    }
}

impl Report for BulkVafSummaryReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        let tumor = ctx.tumor;
        if !self
            .schedule
            .is_sample_step(tumor.time_step(), tumor.total_cell_count())
        {
            return Ok(());
        }

        let header = RecordHeader::of(ctx);
        let samples = collect_bulk_samples(ctx, self.sample_count, self.target_size);

        for (index, sample) in samples.iter().enumerate() {
            let vaf = sample.vaf(ctx.tumor.genotypes());
            let clonal_count = vaf.clonal_mutations().len() as u64;
            let center = sample.center();

            // A sample without mutations still yields a row; its frequency
            // statistics are all zero.
            let summary = vaf.summary();
            let stat = |f: fn(&crate::sim::sample::VafSummary) -> f64| {
                summary.as_ref().map_or(0.0, f)
            };

            self.writer.serialize((
                header.trial_index,
                header.time_step,
                index as u32,
                center.x,
                center.y,
                center.z,
                sample.total_cell_count(),
                summary.as_ref().map_or(0, |s| s.distinct_count),
                clonal_count,
                stat(|s| s.min),
                stat(|s| s.q1),
                stat(|s| s.median),
                stat(|s| s.mean),
                stat(|s| s.q3),
                stat(|s| s.max),
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
// BulkMutDistReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records pairwise mutational distances between bulk-sample clonal sets
pub struct BulkMutDistReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
    sample_count: u32,
    target_size: u64,
}

impl BulkMutDistReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &[
                    "trialIndex",
                    "timeStep",
                    "sampleIndex1",
                    "sampleIndex2",
                    "sharedCount",
                    "intDistance",
                    "fracDistance",
                ],
            )?,
            schedule: SampleSchedule::new(cfg),
            sample_count: cfg.sample_count,
            target_size: cfg.target_size,
        })
    }
}

impl Report for BulkMutDistReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        let tumor = ctx.tumor;
        if !self
            .schedule
            .is_sample_step(tumor.time_step(), tumor.total_cell_count())
        {
            return Ok(());
        }

        let header = RecordHeader::of(ctx);
        let samples = collect_bulk_samples(ctx, self.sample_count, self.target_size);
        let clonal_sets: Vec<_> = samples
            .iter()
            .map(|s| s.vaf(ctx.tumor.genotypes()).clonal_set())
            .collect();

        for i in 0..clonal_sets.len() {
            for j in (i + 1)..clonal_sets.len() {
                let distance = MutationalDistance::between(&clonal_sets[i], &clonal_sets[j]);
                self.writer.serialize((
                    header.trial_index,
                    header.time_step,
                    i as u32,
                    j as u32,
                    distance.shared,
                    distance.int_distance,
                    distance.frac_distance,
                ))?;
            }
        }

        Ok(())
    }

    fn finalize_trial(&mut self, _ctx: &mut StepContext) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// BulkSampleSiteReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records the center site and size of every collected bulk sample
pub struct BulkSampleSiteReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
    sample_count: u32,
    target_size: u64,
}

impl BulkSampleSiteReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &[
                    "trialIndex",
                    "timeStep",
                    "sampleIndex",
                    "siteCoordX",
                    "siteCoordY",
                    "siteCoordZ",
                    "sampleCellCount",
                    "componentCount",
                ],
            )?,
            schedule: SampleSchedule::new(cfg),
            sample_count: cfg.sample_count,
            target_size: cfg.target_size,
        })
    }
}

impl Report for BulkSampleSiteReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        let tumor = ctx.tumor;
        if !self
            .schedule
            .is_sample_step(tumor.time_step(), tumor.total_cell_count())
        {
            return Ok(());
        }

        let header = RecordHeader::of(ctx);
        let samples = collect_bulk_samples(ctx, self.sample_count, self.target_size);

        for (index, sample) in samples.iter().enumerate() {
            let center = sample.center();
            self.writer.serialize((
                header.trial_index,
                header.time_step,
                index as u32,
                center.x,
                center.y,
                center.z,
                sample.total_cell_count(),
                sample.component_count(),
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
// MetMutDistReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records mutational distances between a surface seed component and bulk
/// samples
///
/// One surface component is drawn per sampling step as the metastasis seed;
/// its accumulated mutation set is compared against the clonal set of each
/// bulk sample.
pub struct MetMutDistReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
    sample_count: u32,
    target_size: u64,
}

impl MetMutDistReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &[
                    "trialIndex",
                    "timeStep",
                    "sampleIndex",
                    "seedComponentIndex",
                    "sharedCount",
                    "intDistance",
                    "fracDistance",
                ],
            )?,
            schedule: SampleSchedule::new(cfg),
            sample_count: cfg.sample_count,
            target_size: cfg.target_size,
        })
    }
}

impl Report for MetMutDistReport {
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

        // The metastasis seed: a component drawn from a random surface site.
        let Some(seed_site) = geometry::select_surface_site(
            tumor,
            dimension.center_of_mass,
            ctx.cfg.empty_shell_distance,
            ctx.rng,
        ) else {
            return Ok(());
        };
        let occupants = tumor.lattice().occupants(seed_site);
        let Some(&seed_id) = occupants.choose(ctx.rng) else {
            return Ok(());
        };
        let seed = tumor
            .component(seed_id)
            .expect("lattice occupant is not a live component");

        let mut seed_set = hashbrown::HashSet::new();
        for (genotype, _) in seed.genotype_groups() {
            seed_set.extend(tumor.genotypes().accumulated_mutations(genotype));
        }

        let header = RecordHeader::of(ctx);
        let samples = collect_bulk_samples(ctx, self.sample_count, self.target_size);

        for (index, sample) in samples.iter().enumerate() {
            let clonal = sample.vaf(ctx.tumor.genotypes()).clonal_set();
            let distance = MutationalDistance::between(&seed_set, &clonal);
            self.writer.serialize((
                header.trial_index,
                header.time_step,
                index as u32,
                seed_id.index(),
                distance.shared,
                distance.int_distance,
                distance.frac_distance,
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
// SiteMutationTypeCountReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// How sites are chosen for a [`SiteMutationTypeCountReport`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SiteSelection {
    /// Uniformly random occupied sites
    Bulk,
    /// Surface sites in uniformly random directions
    Surface,
}

/// Records per-cell accumulated mutation-kind counts at sampled sites
pub struct SiteMutationTypeCountReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
    selection: SiteSelection,
    sample_count: u32,
}

impl SiteMutationTypeCountReport {
    /// Create the report, writing the header row
    pub fn new(
        writer: Box<dyn Write>,
        cfg: &ReportConfig,
        selection: SiteSelection,
    ) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &[
                    "trialIndex",
                    "timeStep",
                    "tumorCellCount",
                    "normRadialDist",
                    "siteCoordX",
                    "siteCoordY",
                    "siteCoordZ",
                    "NEOANTIGEN.count",
                    "SCALAR.count",
                ],
            )?,
            schedule: SampleSchedule::new(cfg),
            selection,
            sample_count: cfg.sample_count,
        })
    }

    fn select_sites(&self, ctx: &mut StepContext, center_of_mass: [f64; 3]) -> Vec<Coord> {
        match self.selection {
            SiteSelection::Bulk => {
                let mut occupied: Vec<Coord> =
                    ctx.tumor.occupied_site_weights().keys().copied().collect();
                occupied.sort_unstable();

                (0..self.sample_count)
                    .filter_map(|_| occupied.choose(ctx.rng).copied())
                    .collect()
            }
            SiteSelection::Surface => (0..self.sample_count)
                .filter_map(|_| {
                    geometry::select_surface_site(
                        ctx.tumor,
                        center_of_mass,
                        ctx.cfg.empty_shell_distance,
                        ctx.rng,
                    )
                })
                .collect(),
        }
    }
}

impl Report for SiteMutationTypeCountReport {
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
        let max_radius = geometry::max_radial_distance(&weights, dimension.center_of_mass);

        let header = RecordHeader::of(ctx);
        for site in self.select_sites(ctx, dimension.center_of_mass) {
            let (_, counts) = site_kind_counts(ctx.tumor, site);
            let norm_radial_dist = if max_radius > 0.0 {
                site.distance_to(dimension.center_of_mass) / max_radius
            } else {
                0.0
            };

            self.writer.serialize((
                header.trial_index,
                header.time_step,
                ctx.tumor.total_cell_count(),
                norm_radial_dist,
                site.x,
                site.y,
                site.z,
                counts.neoantigen,
                counts.scalar,
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
// VariegationReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Records the spatial mixing of neoantigen-positive cells on the surface
///
/// Per sampling step, the per-site fraction of cells carrying at least one
/// neoantigen is measured over sampled surface sites; the row holds the mean
/// and population standard deviation of those fractions.
pub struct VariegationReport {
    writer: csv::Writer<Box<dyn Write>>,
    schedule: SampleSchedule,
    sample_count: u32,
}

impl VariegationReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>, cfg: &ReportConfig) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &[
                    "trialIndex",
                    "timeStep",
                    "cellCount",
                    "siteCount",
                    "meanNeoFraction",
                    "stdevNeoFraction",
                ],
            )?,
            schedule: SampleSchedule::new(cfg),
            sample_count: cfg.sample_count,
        })
    }

    /// Fraction of cells at `site` carrying at least one neoantigen
    fn neo_fraction(tumor: &Tumor, site: Coord) -> Option<f64> {
        let mut cells = 0u64;
        let mut positive = 0u64;

        for id in tumor.lattice().occupants(site) {
            let component = tumor
                .component(id)
                .expect("lattice occupant is not a live component");
            for (genotype, cell_count) in component.genotype_groups() {
                cells += cell_count;
                if tumor
                    .genotypes()
                    .carries_kind(genotype, MutationKind::Neoantigen, tumor.mutations())
                {
                    positive += cell_count;
                }
            }
        }

        (cells > 0).then(|| positive as f64 / cells as f64)
    }
}

impl Report for VariegationReport {
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

        let fractions: Vec<f64> = (0..self.sample_count)
            .filter_map(|_| {
                let site = geometry::select_surface_site(
                    ctx.tumor,
                    dimension.center_of_mass,
                    ctx.cfg.empty_shell_distance,
                    ctx.rng,
                )?;
                Self::neo_fraction(ctx.tumor, site)
            })
            .collect();

        if fractions.is_empty() {
            return Ok(());
        }

        let n = fractions.len() as f64;
        let mean = fractions.iter().sum::<f64>() / n;
        let stdev = (fractions.iter().map(|f| (f - mean).powi(2)).sum::<f64>() / n).sqrt();

        let header = RecordHeader::of(ctx);
        self.writer.serialize((
            header.trial_index,
            header.time_step,
            ctx.tumor.total_cell_count(),
            fractions.len() as u32,
            mean,
            stdev,
        ))?;

        Ok(())
    }

    fn finalize_trial(&mut self, _ctx: &mut StepContext) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

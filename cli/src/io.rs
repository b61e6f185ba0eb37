//! IO helpers specifically for the CLI portion of the simulator

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;

use tumor_core::cfg::SimConfig;
use tumor_core::io::output::names;
use tumor_core::io::output::{
    AccumulatedMutationsReport, BulkMutDistReport, BulkSampleSiteReport, BulkVafSummaryReport,
    CellCountTrajReport, ComponentAncestryReport, ComponentCoordReport, GrowthCountReport,
    MetMutDistReport, MutGenThresholdReport, MutationCountReport, OriginalMutationsReport,
    ScalarMutationsReport, SiteMutationTypeCountReport, SiteSelection, TumorDimensionReport,
    VariegationReport,
};
use tumor_core::io::{ReportGroup, ReportGroupBuilder, RunManifest};

/// The trial directory `S<sel>/NR<rate>/Trial<NN>` under the report directory
pub fn trial_dir(cfg: &SimConfig) -> PathBuf {
    cfg.report_dir
        .join(format!("S{}", cfg.mutation.selection_coeff))
        .join(format!("NR{}", cfg.mutation.neoantigen_mean_rate))
        .join(format!("Trial{:02}", cfg.trial_index))
}

/// Persist the resolved configuration next to the report files
pub fn write_manifest(dir: &Path, cfg: &SimConfig) -> Result<()> {
    let path = dir.join("tumor-config.json");
    let file = File::create(&path)
        .with_context(|| format!("cannot create manifest {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &RunManifest::new(cfg))?;
    Ok(())
}

/// Get a `ReportGroup` writing every enabled report into `dir`
pub fn report_group_for_cli(cfg: &SimConfig, dir: &Path) -> Result<ReportGroup> {
    fs::create_dir_all(dir)
        .with_context(|| format!("cannot create report directory {}", dir.display()))?;

    let mut builder = ReportGroupBuilder::default();
    let reports = &cfg.reports;

    if reports.is_enabled(names::CELL_COUNT_TRAJ) {
        builder = builder.report(Box::new(CellCountTrajReport::new(
            plain_file(dir, names::CELL_COUNT_TRAJ)?,
            &reports.entry(names::CELL_COUNT_TRAJ),
        )?));
    }
    if reports.is_enabled(names::GROWTH_COUNT) {
        builder = builder.report(Box::new(GrowthCountReport::new(
            plain_file(dir, names::GROWTH_COUNT)?,
            &reports.entry(names::GROWTH_COUNT),
        )?));
    }
    if reports.is_enabled(names::TUMOR_DIMENSION) {
        builder = builder.report(Box::new(TumorDimensionReport::new(
            plain_file(dir, names::TUMOR_DIMENSION)?,
            &reports.entry(names::TUMOR_DIMENSION),
        )?));
    }
    if reports.is_enabled(names::COMPONENT_COORD) {
        builder = builder.report(Box::new(ComponentCoordReport::new(
            plain_file(dir, names::COMPONENT_COORD)?,
            &reports.entry(names::COMPONENT_COORD),
        )?));
    }
    if reports.is_enabled(names::MUTATION_COUNT) {
        builder = builder.report(Box::new(MutationCountReport::new(
            plain_file(dir, names::MUTATION_COUNT)?,
            &reports.entry(names::MUTATION_COUNT),
        )?));
    }
    if reports.is_enabled(names::MUT_GEN_THRESHOLD) {
        builder = builder.report(Box::new(MutGenThresholdReport::new(plain_file(
            dir,
            names::MUT_GEN_THRESHOLD,
        )?)?));
    }
    if reports.is_enabled(names::COMPONENT_ANCESTRY) {
        builder = builder.report(Box::new(ComponentAncestryReport::new(gz_file(
            dir,
            names::COMPONENT_ANCESTRY,
        )?)?));
    }
    if reports.is_enabled(names::ORIGINAL_MUTATIONS) {
        builder = builder.report(Box::new(OriginalMutationsReport::new(gz_file(
            dir,
            names::ORIGINAL_MUTATIONS,
        )?)?));
    }
    if reports.is_enabled(names::ACCUMULATED_MUTATIONS) {
        builder = builder.report(Box::new(AccumulatedMutationsReport::new(gz_file(
            dir,
            names::ACCUMULATED_MUTATIONS,
        )?)?));
    }
    if reports.is_enabled(names::SCALAR_MUTATIONS) {
        builder = builder.report(Box::new(ScalarMutationsReport::new(gz_file(
            dir,
            names::SCALAR_MUTATIONS,
        )?)?));
    }
    if reports.is_enabled(names::BULK_VAF_SUMMARY) {
        builder = builder.report(Box::new(BulkVafSummaryReport::new(
            plain_file(dir, names::BULK_VAF_SUMMARY)?,
            &reports.entry(names::BULK_VAF_SUMMARY),
        )?));
    }
    if reports.is_enabled(names::BULK_MUT_DIST) {
        builder = builder.report(Box::new(BulkMutDistReport::new(
            plain_file(dir, names::BULK_MUT_DIST)?,
            &reports.entry(names::BULK_MUT_DIST),
        )?));
    }
    if reports.is_enabled(names::BULK_SAMPLE_SITE) {
        builder = builder.report(Box::new(BulkSampleSiteReport::new(
            plain_file(dir, names::BULK_SAMPLE_SITE)?,
            &reports.entry(names::BULK_SAMPLE_SITE),
        )?));
    }
    if reports.is_enabled(names::MET_MUT_DIST) {
        builder = builder.report(Box::new(MetMutDistReport::new(
            plain_file(dir, names::MET_MUT_DIST)?,
            &reports.entry(names::MET_MUT_DIST),
        )?));
    }
    if reports.is_enabled(names::BULK_SITE_MUTATION_TYPE_COUNT) {
        builder = builder.report(Box::new(SiteMutationTypeCountReport::new(
            named_file(dir, "bulk-cell-mutation-type-count.csv")?,
            &reports.entry(names::BULK_SITE_MUTATION_TYPE_COUNT),
            SiteSelection::Bulk,
        )?));
    }
    if reports.is_enabled(names::SURFACE_SITE_MUTATION_TYPE_COUNT) {
        builder = builder.report(Box::new(SiteMutationTypeCountReport::new(
            named_file(dir, "surface-cell-mutation-type-count.csv")?,
            &reports.entry(names::SURFACE_SITE_MUTATION_TYPE_COUNT),
            SiteSelection::Surface,
        )?));
    }
    if reports.is_enabled(names::VARIEGATION) {
        builder = builder.report(Box::new(VariegationReport::new(
            plain_file(dir, names::VARIEGATION)?,
            &reports.entry(names::VARIEGATION),
        )?));
    }

    Ok(builder.build()?)
}

/// Buffer capacity to use for files
/// Set at 8 MB
const FILE_BUFFER_CAPACITY: usize = 8 * (1 << 20);

/// Create `<name>.csv` in `dir` as a buffered writer
fn plain_file(dir: &Path, name: &str) -> Result<Box<dyn Write>> {
    named_file(dir, &format!("{}.csv", name))
}

/// Create `<name>.csv.gz` in `dir` as a gzip-compressed buffered writer
fn gz_file(dir: &Path, name: &str) -> Result<Box<dyn Write>> {
    let path = dir.join(format!("{}.csv.gz", name));
    let file = File::create(&path)
        .with_context(|| format!("cannot create report file {}", path.display()))?;
    Ok(Box::new(GzEncoder::new(
        BufWriter::with_capacity(FILE_BUFFER_CAPACITY, file),
        Compression::default(),
    )))
}

/// Create an exactly named file in `dir` as a buffered writer
fn named_file(dir: &Path, file_name: &str) -> Result<Box<dyn Write>> {
    let path = dir.join(file_name);
    let file = File::create(&path)
        .with_context(|| format!("cannot create report file {}", path.display()))?;
    Ok(Box::new(BufWriter::with_capacity(
        FILE_BUFFER_CAPACITY,
        file,
    )))
}

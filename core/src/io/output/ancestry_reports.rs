//! Terminal ledger reports: ancestry and per-component mutation lists
//!
//! These reports write nothing during the trial; the full ledgers are dumped
//! once at finalization. The ancestry and mutation-list files are
//! semicolon-delimited so the embedded comma-separated index lists need no
//! quoting.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::Result;
use itertools::Itertools;

use crate::sim::component::Component;
use crate::sim::genotype::GenotypeArena;
use crate::sim::mutation::{MutationId, MutationKind};
use crate::sim::StepContext;

use crate::io::output::{csv_writer, csv_writer_with_header, Report};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// ComponentAncestryReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Dumps the parent index of every component ever created
pub struct ComponentAncestryReport {
    writer: csv::Writer<Box<dyn Write>>,
}

impl ComponentAncestryReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>) -> Result<Self> {
        let mut writer = csv_writer(writer, b';');
        writer.write_record(["trialIndex", "componentIndex", "parentIndex"])?;
        Ok(Self { writer })
    }
}

impl Report for ComponentAncestryReport {
    fn process_step(&mut self, _ctx: &mut StepContext) -> Result<()> {
        Ok(())
    }

    fn finalize_trial(&mut self, ctx: &mut StepContext) -> Result<()> {
        let trial_index = ctx.trial_index();
        for record in ctx.tumor.ancestry_records() {
            self.writer
                .serialize((trial_index, record.component, record.parent))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Mutation-list reports
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Which mutation list a [`MutationListReport`] writes
enum MutationListKind {
    Original,
    Accumulated,
}

/// Dumps a comma-separated mutation index list per live component
struct MutationListReport {
    writer: csv::Writer<Box<dyn Write>>,
    kind: MutationListKind,
}

impl MutationListReport {
    fn new(writer: Box<dyn Write>, kind: MutationListKind) -> Result<Self> {
        let mut writer = csv_writer(writer, b';');
        writer.write_record(["trialIndex", "componentIndex", "indexList"])?;
        Ok(Self { writer, kind })
    }

    /// The mutation set of `component`, as sorted indices
    ///
    /// For a deme this is the union over its member genotypes.
    fn mutation_set(&self, component: &Component, genotypes: &GenotypeArena) -> BTreeSet<u32> {
        let mut set = BTreeSet::new();
        for (genotype, _) in component.genotype_groups() {
            let ids: Vec<MutationId> = match self.kind {
                MutationListKind::Original => genotypes.original_mutations(genotype).to_vec(),
                MutationListKind::Accumulated => genotypes.accumulated_mutations(genotype),
            };
            set.extend(ids.into_iter().map(MutationId::index));
        }
        set
    }
}

impl Report for MutationListReport {
    fn process_step(&mut self, _ctx: &mut StepContext) -> Result<()> {
        Ok(())
    }

    fn finalize_trial(&mut self, ctx: &mut StepContext) -> Result<()> {
        let trial_index = ctx.trial_index();
        let genotypes = ctx.tumor.genotypes();

        let mut rows: Vec<_> = ctx
            .tumor
            .components()
            .map(|(id, component)| (id.index(), self.mutation_set(component, genotypes)))
            .collect();
        rows.sort_unstable_by_key(|&(index, _)| index);

        for (index, set) in rows {
            let index_list = set.iter().join(",");
            self.writer.serialize((trial_index, index, index_list))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Dumps the original mutation indices of every live component
pub struct OriginalMutationsReport(MutationListReport);

impl OriginalMutationsReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>) -> Result<Self> {
        Ok(Self(MutationListReport::new(
            writer,
            MutationListKind::Original,
        )?))
    }
}

impl Report for OriginalMutationsReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        self.0.process_step(ctx)
    }

    fn finalize_trial(&mut self, ctx: &mut StepContext) -> Result<()> {
        self.0.finalize_trial(ctx)
    }
}

/// Dumps the accumulated mutation indices of every live component
pub struct AccumulatedMutationsReport(MutationListReport);

impl AccumulatedMutationsReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>) -> Result<Self> {
        Ok(Self(MutationListReport::new(
            writer,
            MutationListKind::Accumulated,
        )?))
    }
}

impl Report for AccumulatedMutationsReport {
    fn process_step(&mut self, ctx: &mut StepContext) -> Result<()> {
        self.0.process_step(ctx)
    }

    fn finalize_trial(&mut self, ctx: &mut StepContext) -> Result<()> {
        self.0.finalize_trial(ctx)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// ScalarMutationsReport
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Dumps the selection coefficient of every scalar mutation minted
pub struct ScalarMutationsReport {
    writer: csv::Writer<Box<dyn Write>>,
}

impl ScalarMutationsReport {
    /// Create the report, writing the header row
    pub fn new(writer: Box<dyn Write>) -> Result<Self> {
        Ok(Self {
            writer: csv_writer_with_header(
                writer,
                &["trialIndex", "mutationIndex", "selectionCoeff"],
            )?,
        })
    }
}

impl Report for ScalarMutationsReport {
    fn process_step(&mut self, _ctx: &mut StepContext) -> Result<()> {
        Ok(())
    }

    fn finalize_trial(&mut self, ctx: &mut StepContext) -> Result<()> {
        let trial_index = ctx.trial_index();
        for (id, record) in ctx.tumor.mutations().iter() {
            if record.kind == MutationKind::Scalar {
                self.writer
                    .serialize((trial_index, id.index(), record.selection_coeff))?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

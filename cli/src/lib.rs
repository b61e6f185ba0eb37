//! Library for concerns and functions specific to the tumor CLI, rather than
//! the simulation library
//!
//! This is kept separate to "dogfood" the library interface by making the CLI
//! use it, and to keep CLI concerns out of the public simulation interface.

use std::time;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use tumor_core::cfg::{PropertySet, SimConfig};
use tumor_core::sim::TrialHandler;

use io::{report_group_for_cli, trial_dir, write_manifest};

mod cfg;
mod io;

pub use cfg::CliConfig;

/// Run the CLI as specified by some `CliConfig`
pub fn run_cli_config(cli_cfg: CliConfig) -> Result<()> {
    let mut props = PropertySet::load(&cli_cfg.property_file).with_context(|| {
        format!(
            "cannot load property file {}",
            cli_cfg.property_file.display()
        )
    })?;
    for pair in &cli_cfg.defines {
        props.set_pair(pair)?;
    }

    let sim_cfg = SimConfig::from_properties(&props)?;
    run_trial(sim_cfg, cli_cfg.quiet)
}

/// Run one trial, wiring reports to the trial handler
fn run_trial(sim_cfg: SimConfig, quiet: bool) -> Result<()> {
    let dir = trial_dir(&sim_cfg);
    let mut reports = report_group_for_cli(&sim_cfg, &dir)?;
    write_manifest(&dir, &sim_cfg)?;

    log::info!(
        "trial {} writing {} report(s) into {}",
        sim_cfg.trial_index,
        reports.len(),
        dir.display()
    );

    let bar = step_progress_bar(sim_cfg.max_step_count, quiet);
    let mut handler = TrialHandler::new(sim_cfg)?;

    reports.initialize_simulation()?;
    reports.initialize_trial(&mut handler.step_context())?;

    const BAR_UPDATE_INTERVAL: time::Duration = time::Duration::from_millis(500);
    let mut last_update = time::Instant::now();

    loop {
        handler.step();
        reports.process_step(&mut handler.step_context())?;

        if last_update.elapsed() >= BAR_UPDATE_INTERVAL {
            bar.set_position(handler.tumor().time_step() as u64);
            last_update = time::Instant::now();
        }

        if !handler.should_continue() {
            break;
        }
    }

    reports.finalize_trial(&mut handler.step_context())?;
    reports.finalize_simulation()?;
    bar.finish_and_clear();

    let tumor = handler.tumor();
    log::info!(
        "trial finished at step {}: {} cells, {} components, {} mutations",
        tumor.time_step(),
        tumor.total_cell_count(),
        tumor.component_count(),
        tumor.mutations().len()
    );

    Ok(())
}

/// Get a `ProgressBar` over time steps, hidden when `quiet` is set
fn step_progress_bar(max_step_count: u32, quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::with_draw_target(
        max_step_count as u64,
        ProgressDrawTarget::stderr_nohz(),
    )
    .with_style(ProgressStyle::default_bar().template("{prefix} {wide_bar} [{pos}/{len}]"));
    bar.set_prefix("Step:");

    bar
}
